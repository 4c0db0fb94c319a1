// harvest-core/src/domain/error.rs

use miette::Diagnostic;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::domain::versioning::VersionError;

/// One structural problem found in a rule document.
/// `path` points into the JSON payload (`/resources/roster/fields/name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every problem found while validating a rule document, reported at once.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("Rule document rejected with {count} problem(s)", count = .issues.len())]
#[diagnostic(
    code(harvest::domain::validation),
    help("Fix every listed problem; nothing was extracted or applied.")
)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![ValidationIssue::new(path, message)],
        }
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Version(#[from] VersionError),

    #[error("Safety configuration error: {0}")]
    #[diagnostic(
        code(harvest::domain::safety),
        help("Check 'safety.forbidden_patterns' in harvest.yaml.")
    )]
    SafetyConfig(String),

    #[error("Serialization Error: {0}")]
    #[diagnostic(code(harvest::domain::serialization))]
    Serialization(String),

    #[error("Version repository error: {0}")]
    #[diagnostic(code(harvest::domain::repository))]
    Repository(String),
}
