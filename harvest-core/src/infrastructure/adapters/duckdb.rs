// harvest-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::types::Value as SqlValue;
use duckdb::{Config, Connection, params, params_from_iter};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

use crate::application::AuditEntry;
use crate::domain::error::DomainError;
use crate::domain::ports::VersionRepository;
use crate::domain::rules::RuleDocument;
use crate::domain::sql::UniversalQuoter;
use crate::domain::versioning::VersionedRuleDocument;
use crate::error::HarvestError;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use crate::ports::{ColumnSchema, DurableWriter, SchemaIntrospector, TableOp, WriteError, WriteSummary};

const VERSIONS_TABLE: &str = "harvest_rule_versions";
const AUDIT_TABLE: &str = "harvest_apply_audit";

/// DuckDB-backed store: live schema, row commits, version log and apply audit.
/// Its own bookkeeping tables are hidden from schema introspection.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    #[instrument]
    pub fn open(db_path: &str) -> Result<Self, InfrastructureError> {
        let config = Config::default();
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory_with_flags(config)?
        } else {
            Connection::open_with_flags(db_path, config)?
        };

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {VERSIONS_TABLE} (
                version_id BIGINT PRIMARY KEY,
                hash VARCHAR NOT NULL,
                created_at VARCHAR NOT NULL,
                document VARCHAR NOT NULL
            );
            CREATE TABLE IF NOT EXISTS {AUDIT_TABLE} (
                rules_hash VARCHAR NOT NULL,
                applied_at VARCHAR NOT NULL,
                rows_by_table VARCHAR NOT NULL,
                rows_written BIGINT NOT NULL
            );"
        ))?;
        debug!("Bookkeeping tables ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, InfrastructureError> {
        self.conn
            .lock()
            .map_err(|_| InfrastructureError::Database(DatabaseError::Poisoned))
    }

    fn user_tables(&self) -> Result<Vec<String>, InfrastructureError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT table_name FROM information_schema.tables
             WHERE table_schema = 'main' AND table_name NOT IN (?, ?)
             ORDER BY table_name",
        )?;
        let tables = stmt
            .query_map([VERSIONS_TABLE, AUDIT_TABLE], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    fn columns_of(&self, table: &str) -> Result<Vec<ColumnSchema>, InfrastructureError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT column_name, data_type FROM information_schema.columns
             WHERE table_schema = 'main' AND lower(table_name) = lower(?)
             ORDER BY ordinal_position",
        )?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnSchema::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Runs additive DDL in one transaction. Every statement is parsed back
    /// first; nothing runs if one is rejected.
    #[instrument(skip_all, fields(statements = statements.len()))]
    pub fn execute_migration(&self, statements: &[String]) -> Result<usize, InfrastructureError> {
        for sql in statements {
            UniversalQuoter::check(sql).map_err(|e| InfrastructureError::InvalidSql(e.to_string()))?;
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for sql in statements {
            tx.execute_batch(sql)?;
        }
        tx.commit()?;

        info!(statements = statements.len(), "Migration executed");
        Ok(statements.len())
    }

    pub fn record_audit(&self, entry: &AuditEntry) -> Result<(), InfrastructureError> {
        let rows_by_table = serde_json::to_string(&entry.rows_by_table)?;
        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO {AUDIT_TABLE} VALUES (?, ?, ?, ?)"),
            params![
                entry.rules_hash,
                entry.applied_at.to_rfc3339(),
                rows_by_table,
                i64::try_from(entry.rows_written).unwrap_or(i64::MAX),
            ],
        )?;
        Ok(())
    }

    /// Recorded applies, oldest first.
    pub fn audit_log(&self) -> Result<Vec<AuditEntry>, InfrastructureError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT rules_hash, applied_at, rows_by_table, rows_written FROM {AUDIT_TABLE} ORDER BY applied_at"
        ))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(rules_hash, applied_at, rows_by_table, rows_written)| -> Result<AuditEntry, InfrastructureError> {
                let rows_by_table: IndexMap<String, usize> = serde_json::from_str(&rows_by_table)?;
                Ok(AuditEntry {
                    rules_hash,
                    applied_at: parse_timestamp(&applied_at)?,
                    rows_by_table,
                    rows_written: usize::try_from(rows_written).unwrap_or_default(),
                })
            })
            .collect()
    }

    fn load_versions(&self) -> Result<Vec<VersionedRuleDocument>, InfrastructureError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT version_id, hash, created_at, document FROM {VERSIONS_TABLE} ORDER BY version_id"
        ))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(version_id, hash, created_at, document)| -> Result<VersionedRuleDocument, InfrastructureError> {
                let document = RuleDocument::parse(&document).map_err(|e| {
                    InfrastructureError::ConfigError(format!("stored version {version_id}: {e}"))
                })?;
                Ok(VersionedRuleDocument {
                    version_id: u64::try_from(version_id).unwrap_or_default(),
                    hash,
                    created_at: parse_timestamp(&created_at)?,
                    document,
                })
            })
            .collect()
    }

    fn insert_version(&self, version: &VersionedRuleDocument) -> Result<(), InfrastructureError> {
        let document = serde_json::to_string(&version.document)?;
        let version_id = i64::try_from(version.version_id)
            .map_err(|e| InfrastructureError::ConfigError(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO {VERSIONS_TABLE} VALUES (?, ?, ?, ?)"),
            params![
                version_id,
                version.hash,
                version.created_at.to_rfc3339(),
                document
            ],
        )?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, InfrastructureError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| InfrastructureError::ConfigError(format!("bad timestamp '{raw}': {e}")))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::BigInt(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Double),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

#[async_trait]
impl SchemaIntrospector for DuckDbStore {
    async fn list_tables(&self) -> Result<Vec<String>, HarvestError> {
        Ok(self.user_tables()?)
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnSchema>, HarvestError> {
        Ok(self.columns_of(table)?)
    }
}

#[async_trait]
impl DurableWriter for DuckDbStore {
    #[instrument(skip_all, fields(ops = ops.len()))]
    async fn commit(&self, ops: Vec<TableOp>) -> Result<WriteSummary, WriteError> {
        let mut conn = self.lock().map_err(|e| WriteError::new(None, e.to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| WriteError::new(None, e.to_string()))?;

        let mut summary = WriteSummary::default();
        for op in &ops {
            let fail = |e: duckdb::Error| WriteError::new(Some(&op.table), e.to_string());
            let mut stmt = tx
                .prepare(&UniversalQuoter::insert(&op.table, &op.columns))
                .map_err(fail)?;
            for row in &op.rows {
                stmt.execute(params_from_iter(row.iter().map(to_sql)))
                    .map_err(fail)?;
            }
            *summary.tables.entry(op.table.clone()).or_insert(0) += op.rows.len();
            summary.rows_written += op.rows.len();
        }

        // Dropping `tx` on an early return rolls everything back.
        tx.commit().map_err(|e| WriteError::new(None, e.to_string()))?;
        info!(rows = summary.rows_written, "Rows committed");
        Ok(summary)
    }
}

impl VersionRepository for DuckDbStore {
    fn load_all(&self) -> Result<Vec<VersionedRuleDocument>, DomainError> {
        self.load_versions()
            .map_err(|e| DomainError::Repository(e.to_string()))
    }

    fn append(&self, version: &VersionedRuleDocument) -> Result<(), DomainError> {
        self.insert_version(version)
            .map_err(|e| DomainError::Repository(e.to_string()))
    }
}
