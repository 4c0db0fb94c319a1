// harvest-core/src/domain/rules/mod.rs

pub mod document;
pub mod mapping;
mod parse;

pub use document::{
    FieldRule, QualityGate, RULESET_VERSION, ResourceKind, ResourceRule, ResourceShape,
    RuleDocument, TransformStep, split_key,
};
pub use mapping::{OrphanField, TargetColumn, TargetTable, compute_orphan_fields, resolve_targets};
