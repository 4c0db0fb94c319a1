// harvest-core/src/application/guard.rs

// Simulation gates every write. `apply` only goes through for the exact
// document the last simulation cleared, and at most one apply runs at a time.
// The state lock is never held across the writer's await.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::adapter::adapt_over_documents;
use super::commit::build_table_ops;
use crate::domain::error::DomainError;
use crate::domain::extraction::ExtractionResult;
use crate::domain::governance::{
    GateResult, QualityGateReport, SafetyFinding, SafetyScanner, SafetySettings,
    evaluate_quality_gates,
};
use crate::domain::ports::DocumentTree;
use crate::domain::preview::{
    CoercionPreview, ConstraintIssue, CoverageReport, SampleRows, compute_field_coverage,
    generate_coercion_preview, raw_samples, simulate_constraints,
};
use crate::domain::project::ProjectConfig;
use crate::domain::rules::{ResourceKind, RuleDocument};
use crate::domain::transform::TransformEngine;
use crate::ports::{DurableWriter, WriteError, WriteSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPhase {
    Idle,
    Simulating,
    Blocked,
    Ready,
    Applying,
    Applied,
    Failed,
}

impl fmt::Display for GuardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GuardPhase::Idle => "idle",
            GuardPhase::Simulating => "simulating",
            GuardPhase::Blocked => "blocked",
            GuardPhase::Ready => "ready",
            GuardPhase::Applying => "applying",
            GuardPhase::Applied => "applied",
            GuardPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardSettings {
    pub safety: SafetySettings,
    /// Rows per resource sampled for the coercion and constraint checks.
    pub sample_limit: usize,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            safety: SafetySettings::default(),
            sample_limit: 200,
        }
    }
}

impl From<&ProjectConfig> for GuardSettings {
    fn from(config: &ProjectConfig) -> Self {
        Self {
            safety: config.safety.clone(),
            sample_limit: config.preview.sample_limit,
        }
    }
}

/// What a passing simulation found. `extraction` is what `apply` writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub rules_hash: String,
    pub rows_by_resource: IndexMap<String, usize>,
    pub coverage_overall: f64,
    pub coverage: CoverageReport,
    pub coercion: CoercionPreview,
    pub quality_gates: QualityGateReport,
    /// Advisory only.
    pub constraint_issues: Vec<ConstraintIssue>,
    #[serde(skip)]
    pub extraction: ExtractionResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub rules_hash: String,
    pub applied_at: DateTime<Utc>,
    pub rows_by_table: IndexMap<String, usize>,
    pub rows_written: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReceipt {
    pub audit: AuditEntry,
    pub summary: WriteSummary,
}

#[derive(Error, Debug, Diagnostic)]
pub enum GuardError {
    #[error("Rule document contains forbidden constructs ({count} finding(s))", count = .findings.len())]
    #[diagnostic(
        code(harvest::guard::unsafe_payload),
        help("Rules may only name registered transforms; remove the flagged keys or values.")
    )]
    UnsafePayload { findings: Vec<SafetyFinding> },

    #[error("{count} quality gate(s) failed", count = .failures.len())]
    #[diagnostic(code(harvest::guard::quality_gate))]
    QualityGateFailure { failures: Vec<GateResult> },

    #[error("Apply needs a passing simulation first (guard is {phase})")]
    #[diagnostic(code(harvest::guard::not_ready), help("Run a simulation and fix what blocks it."))]
    NotReady { phase: GuardPhase },

    #[error("Rules changed since the last simulation")]
    #[diagnostic(code(harvest::guard::stale), help("Simulate the current rules again."))]
    StaleSimulation { simulated: String, current: String },

    #[error("An apply is already in progress")]
    #[diagnostic(code(harvest::guard::busy))]
    ApplyInProgress,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug)]
struct GuardState {
    phase: GuardPhase,
    cleared_hash: Option<String>,
    audit: Vec<AuditEntry>,
}

/// Settles the guard to `Failed` unless the commit it covers finishes.
/// A dropped apply future must not leave the guard stuck in `Applying`.
struct InFlight<'g> {
    guard: &'g SafeApplyGuard,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.guard.settle(GuardPhase::Failed, None);
        }
    }
}

pub struct SafeApplyGuard {
    engine: TransformEngine,
    settings: GuardSettings,
    state: Mutex<GuardState>,
}

impl SafeApplyGuard {
    pub fn new(engine: TransformEngine, settings: GuardSettings) -> Self {
        Self {
            engine,
            settings,
            state: Mutex::new(GuardState {
                phase: GuardPhase::Idle,
                cleared_hash: None,
                audit: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, phase: GuardPhase, cleared_hash: Option<String>) {
        let mut state = self.state();
        state.phase = phase;
        state.cleared_hash = cleared_hash;
    }

    pub fn phase(&self) -> GuardPhase {
        self.state().phase
    }

    /// Successful applies, oldest first.
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.state().audit.clone()
    }

    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn simulate<'a, D: DocumentTree<'a>>(
        &self,
        doc: &RuleDocument,
        documents: &'a [D],
    ) -> Result<SimulationReport, GuardError> {
        {
            let mut state = self.state();
            if state.phase == GuardPhase::Applying {
                return Err(GuardError::ApplyInProgress);
            }
            state.phase = GuardPhase::Simulating;
            state.cleared_hash = None;
        }

        match self.run_simulation(doc, documents) {
            Ok(report) => {
                info!(hash = %report.rules_hash, rows = report.extraction.total_rows(), "Simulation passed");
                self.settle(GuardPhase::Ready, Some(report.rules_hash.clone()));
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Simulation blocked");
                self.settle(GuardPhase::Blocked, None);
                Err(e)
            }
        }
    }

    fn run_simulation<'a, D: DocumentTree<'a>>(
        &self,
        doc: &RuleDocument,
        documents: &'a [D],
    ) -> Result<SimulationReport, GuardError> {
        let scanner = SafetyScanner::new(&self.settings.safety)?;
        if scanner.enabled() {
            let payload = serde_json::to_value(doc)
                .map_err(|e| DomainError::Serialization(e.to_string()))?;
            let findings = scanner.scan(&payload);
            if !findings.is_empty() {
                return Err(GuardError::UnsafePayload { findings });
            }
        }

        let extraction = adapt_over_documents(doc, documents, &self.engine, true);
        let raw = adapt_over_documents(doc, documents, &self.engine, false);
        let coercion = generate_coercion_preview(
            doc,
            &self.engine,
            &raw_samples(&raw, self.settings.sample_limit),
        );

        let coverage = compute_field_coverage(doc, &extraction);
        let quality_gates = evaluate_quality_gates(doc, &coverage);
        if !quality_gates.passed() {
            return Err(GuardError::QualityGateFailure {
                failures: quality_gates.failures(),
            });
        }

        let samples: SampleRows = doc
            .resources_of(ResourceKind::Table)
            .map(|rule| {
                let rows = extraction
                    .records(&rule.name)
                    .iter()
                    .take(self.settings.sample_limit)
                    .cloned()
                    .collect();
                (rule.name.clone(), rows)
            })
            .collect();
        let constraint_issues = simulate_constraints(doc, &samples);
        if !constraint_issues.is_empty() {
            warn!(issues = constraint_issues.len(), "Constraint issues found in sample rows");
        }

        Ok(SimulationReport {
            rules_hash: doc.fingerprint(),
            rows_by_resource: extraction.row_counts(),
            coverage_overall: coverage.overall_ratio,
            coverage,
            coercion,
            quality_gates,
            constraint_issues,
            extraction,
        })
    }

    /// Writes `extraction` through `writer`, in one commit.
    #[instrument(skip_all)]
    pub async fn apply(
        &self,
        doc: &RuleDocument,
        extraction: &ExtractionResult,
        writer: &dyn DurableWriter,
    ) -> Result<ApplyReceipt, GuardError> {
        let rules_hash = doc.fingerprint();
        {
            let mut state = self.state();
            match state.phase {
                GuardPhase::Applying => return Err(GuardError::ApplyInProgress),
                GuardPhase::Ready => {}
                phase => return Err(GuardError::NotReady { phase }),
            }
            if let Some(simulated) = &state.cleared_hash
                && *simulated != rules_hash
            {
                return Err(GuardError::StaleSimulation {
                    simulated: simulated.clone(),
                    current: rules_hash,
                });
            }
            state.phase = GuardPhase::Applying;
        }
        let mut in_flight = InFlight {
            guard: self,
            finished: false,
        };

        let ops = build_table_ops(doc, extraction);
        info!(ops = ops.len(), "Committing extracted rows");

        let summary = match writer.commit(ops).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Commit failed");
                return Err(e.into());
            }
        };
        in_flight.finished = true;

        let audit = AuditEntry {
            rules_hash,
            applied_at: Utc::now(),
            rows_by_table: summary.tables.clone(),
            rows_written: summary.rows_written,
        };
        {
            let mut state = self.state();
            state.phase = GuardPhase::Applied;
            state.cleared_hash = None;
            state.audit.push(audit.clone());
        }
        info!(rows = audit.rows_written, "Apply finished");

        Ok(ApplyReceipt { audit, summary })
    }
}
