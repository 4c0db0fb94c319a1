// harvest-core/src/domain/governance/mod.rs

pub mod configuration;
pub mod quality;
pub mod safety;

// Re-exports
pub use configuration::SafetySettings;
pub use quality::{GateResult, QualityGateReport, evaluate_quality_gates};
pub use safety::{SafetyFinding, SafetyScanner};
