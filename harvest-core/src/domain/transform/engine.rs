// harvest-core/src/domain/transform/engine.rs

use miette::Diagnostic;
use serde::Serialize;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use super::registry::TransformRegistry;
use crate::domain::rules::TransformStep;

/// A failed step: which operation, and why.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq, Serialize)]
#[error("{operation}: {message}")]
#[diagnostic(code(harvest::domain::transform))]
pub struct TransformError {
    pub operation: String,
    pub message: String,
}

/// Runs transform chains. Shares its registry, so clones are cheap.
#[derive(Debug, Clone)]
pub struct TransformEngine {
    registry: Arc<TransformRegistry>,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new(Arc::new(TransformRegistry::builtin()))
    }
}

impl TransformEngine {
    pub fn new(registry: Arc<TransformRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Applies each step in order and stops at the first failure.
    ///
    /// A panicking operation is reported as an error for this value only.
    pub fn apply_chain(&self, raw: &Value, chain: &[TransformStep]) -> Result<Value, TransformError> {
        let mut current = raw.clone();

        for step in chain {
            let Some(operation) = self.registry.get(&step.operation) else {
                return Err(TransformError {
                    operation: step.operation.clone(),
                    message: "operation is not registered".to_string(),
                });
            };

            let outcome = catch_unwind(AssertUnwindSafe(|| operation.apply(&current, &step.config)));
            current = match outcome {
                Ok(Ok(value)) => value,
                Ok(Err(message)) => {
                    return Err(TransformError {
                        operation: step.operation.clone(),
                        message,
                    });
                }
                Err(_) => {
                    warn!(operation = %step.operation, "transform operation panicked");
                    return Err(TransformError {
                        operation: step.operation.clone(),
                        message: "operation panicked".to_string(),
                    });
                }
            };
        }

        Ok(current)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::transform::TransformOperation;
    use serde_json::{Map, json};

    struct Explode;

    impl TransformOperation for Explode {
        fn name(&self) -> &str {
            "explode"
        }

        fn apply(&self, _value: &Value, _config: &Map<String, Value>) -> Result<Value, String> {
            panic!("boom")
        }
    }

    fn steps(names: &[&str]) -> Vec<TransformStep> {
        names.iter().map(|n| TransformStep::new(*n)).collect()
    }

    #[test]
    fn test_chain_runs_in_order() {
        let engine = TransformEngine::default();
        let out = engine
            .apply_chain(&json!("  1 234  "), &steps(&["collapse_ws", "to_number"]))
            .unwrap();
        assert_eq!(out, json!(1234));
    }

    #[test]
    fn test_chain_halts_at_first_failure() {
        let engine = TransformEngine::default();
        let err = engine
            .apply_chain(&json!("abc"), &steps(&["to_number", "parse_date"]))
            .unwrap_err();
        assert_eq!(err.operation, "to_number");
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let engine = TransformEngine::default();
        assert_eq!(engine.apply_chain(&json!(" x "), &[]).unwrap(), json!(" x "));
    }

    #[test]
    fn test_panics_become_errors() {
        let mut registry = TransformRegistry::builtin();
        registry.register(Arc::new(Explode));
        let engine = TransformEngine::new(Arc::new(registry));

        let err = engine
            .apply_chain(&json!("x"), &steps(&["trim", "explode"]))
            .unwrap_err();
        assert_eq!(
            err,
            TransformError {
                operation: "explode".into(),
                message: "operation panicked".into()
            }
        );
    }
}
