// harvest-core/src/error.rs

use crate::application::guard::GuardError;
use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum HarvestError {
    // --- DOMAIN ERRORS (validation, versioning, repository) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),

    // --- INFRASTRUCTURE ERRORS (IO, DuckDB, config) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- SIMULATE / APPLY ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Guard(#[from] GuardError),

    #[error("Unsafe path traversal detected: {0}")]
    UnsafePath(String),
}

// Manual implementation to avoid duplicate enum variant but keep ergonomics
impl From<std::io::Error> for HarvestError {
    fn from(err: std::io::Error) -> Self {
        HarvestError::Infrastructure(InfrastructureError::Io(err))
    }
}
