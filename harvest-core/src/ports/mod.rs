// harvest-core/src/ports/mod.rs

pub mod storage;

pub use storage::{ColumnSchema, DurableWriter, SchemaIntrospector, TableOp, WriteError, WriteSummary};
