// harvest-core/src/domain/ports/mod.rs

pub mod document;
pub mod versions;

pub use document::{DocumentTree, SelectorError};
pub use versions::VersionRepository;
