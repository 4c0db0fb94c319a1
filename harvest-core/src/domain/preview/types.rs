// harvest-core/src/domain/preview/types.rs

use serde::Serialize;
use std::fmt;

use crate::domain::rules::RuleDocument;

/// The two storage types the engine reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Real,
    Text,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

const REAL_FAMILY: [&str; 16] = [
    "REAL", "DOUBLE", "FLOAT", "FLOAT4", "FLOAT8", "NUMERIC", "DECIMAL", "INTEGER", "INT",
    "INT4", "INT8", "BIGINT", "SMALLINT", "TINYINT", "HUGEINT", "DOUBLE PRECISION",
];
const TEXT_FAMILY: [&str; 6] = ["TEXT", "VARCHAR", "CHAR", "STRING", "BPCHAR", "CHARACTER VARYING"];

/// Bucket of a type name declared by a live store, if it has one.
///
/// Length and precision suffixes are ignored: `DECIMAL(10,2)` is REAL.
pub fn bucket_of_declared(declared: &str) -> Option<ColumnType> {
    let upper = declared.trim().to_ascii_uppercase();
    let base = upper.split('(').next().unwrap_or_default().trim();

    if REAL_FAMILY.contains(&base) {
        Some(ColumnType::Real)
    } else if TEXT_FAMILY.contains(&base) {
        Some(ColumnType::Text)
    } else {
        None
    }
}

/// Decides the storage type of one extracted field.
pub trait TypeInference: Send + Sync {
    fn infer(&self, doc: &RuleDocument, resource: &str, field: &str) -> ColumnType;
}

const NUMERIC_HINTS: [&str; 5] = ["number", "real", "to_number", "integer", "float"];

/// REAL when the field's chain parses numbers or its hint names a numeric
/// type; TEXT for everything else, dates included.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoBucketInference;

impl TypeInference for TwoBucketInference {
    fn infer(&self, doc: &RuleDocument, resource: &str, field: &str) -> ColumnType {
        let Some(rule) = doc.resource(resource) else {
            return ColumnType::Text;
        };
        let numeric_chain = rule.chain(field).iter().any(|s| s.operation == "to_number");
        let numeric_hint = doc
            .hint(resource, field)
            .is_some_and(|h| NUMERIC_HINTS.contains(&h.trim().to_ascii_lowercase().as_str()));

        if numeric_chain || numeric_hint {
            ColumnType::Real
        } else {
            ColumnType::Text
        }
    }
}
