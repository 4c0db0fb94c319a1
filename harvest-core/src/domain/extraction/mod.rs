// harvest-core/src/domain/extraction/mod.rs

pub mod adapter;
pub mod result;

pub use adapter::{RawRows, extract};
pub use result::{
    ExtractionResult, ExtractionWarning, Record, ResourceExtraction, ResourceSummary,
};
