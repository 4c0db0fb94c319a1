// harvest-core/src/domain/transform/registry.rs

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::ops::{CollapseWhitespace, DateNormalize, NumberParse, Trim};

/// A named, pure operation over one JSON value.
///
/// Operations never see anything but the value and their own config, so a
/// rule document can only compose them, not script them.
pub trait TransformOperation: Send + Sync {
    fn name(&self) -> &str;

    /// Checked when a rule document is parsed.
    fn validate_config(&self, _config: &Map<String, Value>) -> Result<(), String> {
        Ok(())
    }

    fn apply(&self, value: &Value, config: &Map<String, Value>) -> Result<Value, String>;
}

/// Operations available to rule documents, looked up by name.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    operations: HashMap<String, Arc<dyn TransformOperation>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `trim`, `collapse_ws`, `to_number`, `parse_date`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Trim));
        registry.register(Arc::new(CollapseWhitespace));
        registry.register(Arc::new(NumberParse));
        registry.register(Arc::new(DateNormalize));
        registry
    }

    /// Adds an operation, replacing any existing one with the same name.
    pub fn register(&mut self, operation: Arc<dyn TransformOperation>) {
        let name = operation.name().to_string();
        debug!(operation = %name, "registered transform operation");
        self.operations.insert(name, operation);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn TransformOperation>> {
        self.operations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("operations", &self.names())
            .finish()
    }
}
