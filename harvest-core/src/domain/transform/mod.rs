// harvest-core/src/domain/transform/mod.rs

pub mod engine;
pub mod ops;
pub mod registry;

pub use engine::{TransformEngine, TransformError};
pub use registry::{TransformOperation, TransformRegistry};
