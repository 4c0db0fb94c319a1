// harvest-core/src/domain/extraction/result.rs

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::rules::ResourceKind;
use crate::domain::transform::TransformError;

/// One extracted row: field name to value, in field declaration order.
pub type Record = serde_json::Map<String, Value>;

/// Non-fatal problems met while extracting. Never abort a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    #[error("selector '{selector}' matched nothing")]
    NoMatch { selector: String },

    #[error("selector '{selector}' is invalid: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("field '{field}' in record {record_index}: {error}")]
    Transform {
        field: String,
        record_index: usize,
        error: TransformError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSummary {
    pub resource: String,
    pub kind: ResourceKind,
    pub record_count: usize,
    pub warnings: Vec<ExtractionWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceExtraction {
    pub kind: ResourceKind,
    pub records: Vec<Record>,
    pub summary: ResourceSummary,
    /// Selector to match count, in evaluation order.
    pub match_spans: IndexMap<String, usize>,
}

/// Extraction output for a whole rule document, in resource declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub resources: IndexMap<String, ResourceExtraction>,
}

impl ExtractionResult {
    pub fn records(&self, resource: &str) -> &[Record] {
        self.resources
            .get(resource)
            .map(|r| r.records.as_slice())
            .unwrap_or(&[])
    }

    pub fn row_counts(&self) -> IndexMap<String, usize> {
        self.resources
            .iter()
            .map(|(name, r)| (name.clone(), r.records.len()))
            .collect()
    }

    pub fn total_rows(&self) -> usize {
        self.resources.values().map(|r| r.records.len()).sum()
    }
}

/// True when the value carries content: not null, not blank text.
pub fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Identity of a row for comparison and de-duplication. Field order does not
/// matter.
pub fn row_key(record: &Record) -> String {
    let sorted: BTreeMap<&String, &Value> = record.iter().collect();
    serde_json::to_string(&sorted).unwrap_or_default()
}
