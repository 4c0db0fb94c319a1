// harvest-core/src/lib.rs

// 1. Documentation is not enforced yet
#![allow(missing_docs)]
// 2. Memory safety
#![deny(unsafe_code)]
// 3. Robustness
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
// 4. Performance
#![warn(clippy::perf)]

// --- HEXAGONAL MODULES ---

// 1. Ports (async storage contracts)
// Live schema introspection and durable writes.
pub mod ports;

// 2. Domain (rule engine core)
// Rule documents, extraction, transforms, previews, versioning.
// Depends on nothing but its own ports.
pub mod domain;

// 3. Infrastructure (Adapters)
// HTML document trees, DuckDB store, YAML config, draft files.
pub mod infrastructure;

// 4. Application (Use Cases)
// Multi-document extraction and the simulate-before-commit guard.
pub mod application;

// --- GLOBAL ERROR HANDLING ---
pub mod error;

// --- RE-EXPORTS (FACADE) ---
pub use domain::rules::RuleDocument;
pub use error::HarvestError;
