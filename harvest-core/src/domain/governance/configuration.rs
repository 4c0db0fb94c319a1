// harvest-core/src/domain/governance/configuration.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Substrings that mark dynamic-code constructs in a rule payload.
/// Dunder access is matched by name so BEM selectors like `.card__title` pass.
pub const DEFAULT_FORBIDDEN_PATTERNS: [&str; 13] = [
    "__class",
    "__import",
    "__builtins",
    "__globals",
    "__subclasses",
    "eval(",
    "exec(",
    "import ",
    "lambda",
    "subprocess",
    "os.system",
    "<script",
    "javascript:",
];

#[derive(Debug, Deserialize, Serialize, Validate, Clone, PartialEq)]
pub struct SafetySettings {
    #[serde(default = "default_true")]
    pub reject_dynamic_code: bool,

    #[validate(custom(function = "validate_patterns"))]
    #[serde(default = "default_patterns")]
    pub forbidden_patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_patterns() -> Vec<String> {
    DEFAULT_FORBIDDEN_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn validate_patterns(patterns: &[String]) -> Result<(), validator::ValidationError> {
    if patterns.iter().any(|p| p.is_empty()) {
        return Err(validator::ValidationError::new("empty_forbidden_pattern"));
    }
    Ok(())
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            reject_dynamic_code: true,
            forbidden_patterns: default_patterns(),
        }
    }
}
