// harvest-core/src/domain/rules/document.rs

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Wire-format version written into every serialized document.
pub const RULESET_VERSION: u32 = 1;

/// A validated rule document. Immutable once built by [`RuleDocument::parse`].
///
/// Resource declaration order is preserved and drives every ordered output
/// (migration actions, table ops, summaries).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDocument {
    pub version: u32,
    pub resources: IndexMap<String, ResourceRule>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub mapping: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub quality_gates: IndexMap<String, QualityGate>,
    /// Advisory hints keyed by `resource.field`. Never executed.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub transforms: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRule {
    #[serde(skip)]
    pub name: String,
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(flatten)]
    pub shape: ResourceShape,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceShape {
    List {
        #[serde(skip_serializing_if = "Option::is_none")]
        item_selector: Option<String>,
        fields: IndexMap<String, FieldRule>,
    },
    Table {
        columns: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    List,
    Table,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::List => "list",
            ResourceKind::Table => "table",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "list" => Some(ResourceKind::List),
            "table" => Some(ResourceKind::Table),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRule {
    pub selector: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformStep>,
}

impl FieldRule {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            transforms: Vec::new(),
        }
    }
}

/// One named operation in a transform chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformStep {
    pub operation: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl TransformStep {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            config: Map::new(),
        }
    }

    pub fn with_config(operation: impl Into<String>, config: Map<String, Value>) -> Self {
        Self {
            operation: operation.into(),
            config,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityGate {
    /// Minimum share of rows with a non-empty value, in `[0, 1]`.
    pub min_non_null: f64,
}

impl ResourceRule {
    pub fn kind(&self) -> ResourceKind {
        match self.shape {
            ResourceShape::List { .. } => ResourceKind::List,
            ResourceShape::Table { .. } => ResourceKind::Table,
        }
    }

    /// Field names for lists, column names for tables, in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        match &self.shape {
            ResourceShape::List { fields, .. } => fields.keys().map(String::as_str).collect(),
            ResourceShape::Table { columns } => columns.iter().map(String::as_str).collect(),
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        match &self.shape {
            ResourceShape::List { fields, .. } => fields.contains_key(field),
            ResourceShape::Table { columns } => columns.iter().any(|c| c == field),
        }
    }

    /// Transform chain of a list field. Table columns have none.
    pub fn chain(&self, field: &str) -> &[TransformStep] {
        match &self.shape {
            ResourceShape::List { fields, .. } => fields
                .get(field)
                .map(|f| f.transforms.as_slice())
                .unwrap_or(&[]),
            ResourceShape::Table { .. } => &[],
        }
    }
}

impl RuleDocument {
    pub fn resource(&self, name: &str) -> Option<&ResourceRule> {
        self.resources.get(name)
    }

    /// Resources of one kind, in declaration order.
    pub fn resources_of(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceRule> {
        self.resources.values().filter(move |r| r.kind() == kind)
    }

    /// Advisory hint attached to `resource.field`, if it is a string.
    pub fn hint(&self, resource: &str, field: &str) -> Option<&str> {
        self.transforms
            .get(&format!("{resource}.{field}"))
            .and_then(Value::as_str)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// SHA-256 of the canonical serialization. Key order is significant.
    pub fn fingerprint(&self) -> String {
        // Serializing string-keyed maps of plain values cannot fail.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    }
}

/// Splits `resource.field` (or `table.column`) at the first dot.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('.')
        .filter(|(left, right)| !left.is_empty() && !right.is_empty())
}

impl<'de> Deserialize<'de> for RuleDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RuleDocument::from_value(value).map_err(|e| {
            let details: Vec<String> = e.issues.iter().map(ToString::to_string).collect();
            serde::de::Error::custom(format!("{e}: {}", details.join("; ")))
        })
    }
}
