// harvest-core/src/domain/mod.rs

pub mod error;
pub mod extraction;
pub mod governance;
pub mod ports;
pub mod preview;
pub mod project;
pub mod rules;
pub mod sql;
pub mod transform;
pub mod versioning;

// Handy re-exports to keep imports short elsewhere
pub use error::{DomainError, ValidationError, ValidationIssue};
