// harvest-core/src/application/mod.rs

pub mod adapter;
pub mod commit;
pub mod guard;

// --- RE-EXPORTS ---
// The CLI reaches the orchestration layer through these names only.

pub use adapter::adapt_over_documents;
pub use commit::build_table_ops;
pub use guard::{
    ApplyReceipt, AuditEntry, GuardError, GuardPhase, GuardSettings, SafeApplyGuard,
    SimulationReport,
};
