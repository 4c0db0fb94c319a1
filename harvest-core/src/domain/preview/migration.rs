// harvest-core/src/domain/preview/migration.rs

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, instrument};

use super::types::{ColumnType, TwoBucketInference, TypeInference, bucket_of_declared};
use crate::domain::rules::{RuleDocument, resolve_targets};
use crate::domain::sql::UniversalQuoter;
use crate::error::HarvestError;
use crate::ports::{ColumnSchema, SchemaIntrospector};

/// Snapshot of the tables and columns a live store declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSchema {
    tables: IndexMap<String, Vec<ColumnSchema>>,
}

impl LiveSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        self.tables.insert(name.into(), columns);
        self
    }

    #[instrument(skip_all)]
    pub async fn introspect(store: &dyn SchemaIntrospector) -> Result<Self, HarvestError> {
        let mut schema = Self::new();
        for table in store.list_tables().await? {
            let columns = store.table_columns(&table).await?;
            schema.tables.insert(table, columns);
        }
        debug!(tables = schema.tables.len(), "Live schema introspected");
        Ok(schema)
    }

    /// Table lookup ignores case, like most SQL engines.
    pub fn table(&self, name: &str) -> Option<&[ColumnSchema]> {
        self.tables
            .iter()
            .find(|(table, _)| table.eq_ignore_ascii_case(name))
            .map(|(_, columns)| columns.as_slice())
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// One additive schema change, or a note about a type the store disagrees on.
/// Descriptive only; nothing here is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationAction {
    CreateTable {
        table: String,
        columns: Vec<ColumnSpec>,
    },
    AddColumn {
        table: String,
        column: String,
        #[serde(rename = "type")]
        column_type: ColumnType,
    },
    TypeNote {
        table: String,
        column: String,
        /// What the live store declares.
        declared_type: String,
        /// What the rules imply.
        observed_type: ColumnType,
    },
}

impl MigrationAction {
    pub fn table(&self) -> &str {
        match self {
            MigrationAction::CreateTable { table, .. }
            | MigrationAction::AddColumn { table, .. }
            | MigrationAction::TypeNote { table, .. } => table,
        }
    }

    /// Statement a user could run for this action. Notes have none.
    pub fn suggested_sql(&self) -> Option<String> {
        match self {
            MigrationAction::CreateTable { table, columns } => Some(UniversalQuoter::create_table(
                table,
                columns
                    .iter()
                    .map(|c| (c.name.as_str(), c.column_type.as_sql())),
            )),
            MigrationAction::AddColumn {
                table,
                column,
                column_type,
            } => Some(UniversalQuoter::add_column(table, column, column_type.as_sql())),
            MigrationAction::TypeNote { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationPreview {
    pub actions: Vec<MigrationAction>,
}

impl MigrationPreview {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Suggested statements, in action order.
    pub fn statements(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(MigrationAction::suggested_sql)
            .collect()
    }
}

pub fn generate_migration_preview(doc: &RuleDocument, live: &LiveSchema) -> MigrationPreview {
    generate_migration_preview_with(doc, live, &TwoBucketInference)
}

/// Diffs the schema the rules imply against `live`, in declaration order.
pub fn generate_migration_preview_with(
    doc: &RuleDocument,
    live: &LiveSchema,
    inference: &dyn TypeInference,
) -> MigrationPreview {
    let mut actions = Vec::new();

    for target in resolve_targets(doc) {
        let expected: Vec<ColumnSpec> = target
            .columns
            .iter()
            .map(|c| ColumnSpec {
                name: c.column.clone(),
                column_type: inference.infer(doc, &c.resource, &c.field),
            })
            .collect();

        let Some(live_columns) = live.table(&target.name) else {
            actions.push(MigrationAction::CreateTable {
                table: target.name,
                columns: expected,
            });
            continue;
        };

        for spec in expected {
            let existing = live_columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&spec.name));
            match existing {
                None => actions.push(MigrationAction::AddColumn {
                    table: target.name.clone(),
                    column: spec.name,
                    column_type: spec.column_type,
                }),
                Some(column) if type_differs(&column.data_type, spec.column_type) => {
                    actions.push(MigrationAction::TypeNote {
                        table: target.name.clone(),
                        column: spec.name,
                        declared_type: column.data_type.clone(),
                        observed_type: spec.column_type,
                    });
                }
                Some(_) => {}
            }
        }
    }

    MigrationPreview { actions }
}

fn type_differs(declared: &str, expected: ColumnType) -> bool {
    match bucket_of_declared(declared) {
        Some(bucket) => bucket != expected,
        None => !declared.trim().eq_ignore_ascii_case(expected.as_sql()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn standings() -> Result<RuleDocument> {
        Ok(RuleDocument::from_value(json!({
            "resources": {
                "standings": {"kind": "table", "selector": "table", "columns": ["name", "points"]}
            },
            "mapping": {"standings.name": "teams.name", "standings.points": "teams.points"},
            "transforms": {"standings.points": "number"}
        }))?)
    }

    #[test]
    fn test_missing_table_yields_one_create() -> Result<()> {
        let preview = generate_migration_preview(&standings()?, &LiveSchema::new());

        assert_eq!(
            preview.actions,
            vec![MigrationAction::CreateTable {
                table: "teams".into(),
                columns: vec![
                    ColumnSpec { name: "name".into(), column_type: ColumnType::Text },
                    ColumnSpec { name: "points".into(), column_type: ColumnType::Real },
                ],
            }]
        );
        insta::assert_snapshot!(
            preview.statements().join("\n"),
            @r#"CREATE TABLE "teams" ("name" TEXT, "points" REAL);"#
        );
        Ok(())
    }

    #[test]
    fn test_matching_table_yields_nothing() -> Result<()> {
        let live = LiveSchema::new().with_table(
            "TEAMS",
            vec![
                ColumnSchema::new("name", "VARCHAR"),
                ColumnSchema::new("points", "DOUBLE"),
            ],
        );
        assert!(generate_migration_preview(&standings()?, &live).is_empty());
        Ok(())
    }

    #[test]
    fn test_add_column_and_type_note() -> Result<()> {
        let live = LiveSchema::new().with_table("teams", vec![ColumnSchema::new("name", "INTEGER")]);
        let preview = generate_migration_preview(&standings()?, &live);

        assert_eq!(preview.actions.len(), 2);
        assert!(matches!(
            &preview.actions[0],
            MigrationAction::TypeNote { declared_type, observed_type: ColumnType::Text, .. } if declared_type == "INTEGER"
        ));
        assert_eq!(
            preview.actions[1].suggested_sql().unwrap(),
            r#"ALTER TABLE "teams" ADD COLUMN "points" REAL;"#
        );
        assert!(preview.actions[0].suggested_sql().is_none());
        Ok(())
    }

    #[test]
    fn test_preview_is_deterministic() -> Result<()> {
        let doc = standings()?;
        let live = LiveSchema::new().with_table("teams", vec![ColumnSchema::new("name", "DATE")]);
        let a = serde_json::to_string(&generate_migration_preview(&doc, &live))?;
        let b = serde_json::to_string(&generate_migration_preview(&doc, &live))?;
        assert_eq!(a, b);
        assert!(a.contains(r#""kind":"type_note""#));
        Ok(())
    }

    #[test]
    fn test_custom_inference_is_swappable() -> Result<()> {
        struct AllText;
        impl TypeInference for AllText {
            fn infer(&self, _: &RuleDocument, _: &str, _: &str) -> ColumnType {
                ColumnType::Text
            }
        }
        let preview = generate_migration_preview_with(&standings()?, &LiveSchema::new(), &AllText);
        let MigrationAction::CreateTable { columns, .. } = &preview.actions[0] else {
            panic!("expected create_table");
        };
        assert!(columns.iter().all(|c| c.column_type == ColumnType::Text));
        Ok(())
    }

    // --- introspection through the port ---

    struct MockIntrospector {
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SchemaIntrospector for MockIntrospector {
        async fn list_tables(&self) -> Result<Vec<String>, HarvestError> {
            self.calls.lock().unwrap().push("list_tables".into());
            Ok(vec!["teams".into()])
        }

        async fn table_columns(&self, table: &str) -> Result<Vec<ColumnSchema>, HarvestError> {
            self.calls.lock().unwrap().push(format!("table_columns:{table}"));
            Ok(vec![ColumnSchema::new("name", "VARCHAR")])
        }
    }

    #[tokio::test]
    async fn test_introspect_snapshots_every_table() -> Result<()> {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let store = MockIntrospector { calls: calls.clone() };

        let live = LiveSchema::introspect(&store).await?;
        assert_eq!(live.table("teams").unwrap().len(), 1);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["list_tables".to_string(), "table_columns:teams".to_string()]
        );

        let preview = generate_migration_preview(&standings()?, &live);
        assert_eq!(preview.statements(), vec![r#"ALTER TABLE "teams" ADD COLUMN "points" REAL;"#]);
        Ok(())
    }
}
