// harvest-core/src/domain/preview/mod.rs

// Read-only analyses over a rule document and sample data. None of them
// touch storage; each call builds a fresh result.

pub mod coercion;
pub mod constraints;
pub mod coverage;
pub mod diff;
pub mod migration;
pub mod parse;
pub mod types;

pub use coercion::{CoercionFieldStat, CoercionPreview, RawSamples, generate_coercion_preview, raw_samples};
pub use constraints::{ConstraintIssue, SampleRows, simulate_constraints};
pub use coverage::{CoverageReport, FieldCoverage, ResourceCoverage, compute_field_coverage};
pub use diff::{ResourceDiff, RuleDiff, diff_rule_documents};
pub use migration::{
    ColumnSpec, LiveSchema, MigrationAction, MigrationPreview, generate_migration_preview,
    generate_migration_preview_with,
};
pub use parse::{ParsePreview, generate_parse_preview};
pub use types::{ColumnType, TwoBucketInference, TypeInference};
