// harvest-core/src/domain/versioning/mod.rs

pub mod store;

pub use store::{VersionError, VersionStore, VersionedRuleDocument};
