// harvest-core/src/ports/storage.rs

// What the engine needs from a relational store, without knowing which one.
// Schema introspection feeds the migration preview; the writer receives the
// rows once the guard has cleared a simulation.

use crate::error::HarvestError;
use async_trait::async_trait;
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A column as the live store declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>, HarvestError>;

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnSchema>, HarvestError>;
}

/// Rows destined for one table, coming from one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableOp {
    pub resource: String,
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Rows written per table, in commit order.
    pub tables: IndexMap<String, usize>,
    pub rows_written: usize,
}

/// Failure reported by the store. The guard surfaces it unchanged.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("Write failed: {message}")]
#[diagnostic(
    code(harvest::ports::write),
    help("Nothing was committed; the store rolled back the whole batch.")
)]
pub struct WriteError {
    pub table: Option<String>,
    pub message: String,
}

impl WriteError {
    pub fn new(table: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            table: table.map(str::to_string),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait DurableWriter: Send + Sync {
    /// Writes every op or none of them.
    async fn commit(&self, ops: Vec<TableOp>) -> Result<WriteSummary, WriteError>;
}
