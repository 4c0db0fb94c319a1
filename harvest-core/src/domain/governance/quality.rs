// harvest-core/src/domain/governance/quality.rs

use serde::Serialize;

use crate::domain::preview::CoverageReport;
use crate::domain::rules::{RuleDocument, split_key};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateResult {
    pub key: String,
    pub resource: String,
    pub field: String,
    pub threshold: f64,
    pub ratio: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityGateReport {
    pub results: Vec<GateResult>,
}

impl QualityGateReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> Vec<GateResult> {
        self.results.iter().filter(|r| !r.passed).cloned().collect()
    }
}

/// Checks each gate against measured coverage. A field with no coverage
/// entry, or on a resource that produced no rows, counts as fully empty.
pub fn evaluate_quality_gates(doc: &RuleDocument, coverage: &CoverageReport) -> QualityGateReport {
    let results = doc
        .quality_gates
        .iter()
        .filter_map(|(key, gate)| {
            let (resource, field) = split_key(key)?;
            let ratio = coverage.ratio(resource, field).unwrap_or(0.0);
            Some(GateResult {
                key: key.clone(),
                resource: resource.to_string(),
                field: field.to_string(),
                threshold: gate.min_non_null,
                ratio,
                passed: ratio >= gate.min_non_null,
            })
        })
        .collect();

    QualityGateReport { results }
}
