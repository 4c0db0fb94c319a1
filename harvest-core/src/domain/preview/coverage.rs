// harvest-core/src/domain/preview/coverage.rs

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::domain::extraction::ExtractionResult;
use crate::domain::extraction::result::is_filled;
use crate::domain::rules::{RuleDocument, resolve_targets};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCoverage {
    pub field: String,
    /// `table.column` the field is written to, if any.
    pub target_column: Option<String>,
    pub non_empty: usize,
    pub total_rows: usize,
    pub distinct: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceCoverage {
    pub resource: String,
    pub rows: usize,
    pub fields: Vec<FieldCoverage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    pub resources: Vec<ResourceCoverage>,
    /// Filled cells over all cells, across every resource.
    pub overall_ratio: f64,
}

impl CoverageReport {
    pub fn field(&self, resource: &str, field: &str) -> Option<&FieldCoverage> {
        self.resources
            .iter()
            .find(|r| r.resource == resource)
            .and_then(|r| r.fields.iter().find(|f| f.field == field))
    }

    pub fn ratio(&self, resource: &str, field: &str) -> Option<f64> {
        self.field(resource, field).map(|f| f.ratio)
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Non-empty share of every declared field. A resource without rows has a
/// ratio of 0 for all of its fields.
pub fn compute_field_coverage(doc: &RuleDocument, extraction: &ExtractionResult) -> CoverageReport {
    let targets: HashMap<(String, String), String> = resolve_targets(doc)
        .into_iter()
        .flat_map(|table| {
            table.columns.into_iter().map(move |c| {
                ((c.resource, c.field), format!("{}.{}", table.name, c.column))
            })
        })
        .collect();

    let mut filled_cells = 0;
    let mut total_cells = 0;
    let mut resources = Vec::with_capacity(doc.resources.len());

    for (name, rule) in &doc.resources {
        let records = extraction.records(name);
        let fields = rule
            .field_names()
            .into_iter()
            .map(|field| {
                let values: Vec<String> = records
                    .iter()
                    .filter_map(|r| r.get(field))
                    .filter(|v| is_filled(v))
                    .map(ToString::to_string)
                    .collect();
                let distinct = values.iter().collect::<HashSet<_>>().len();

                filled_cells += values.len();
                total_cells += records.len();
                FieldCoverage {
                    field: field.to_string(),
                    target_column: targets.get(&(name.clone(), field.to_string())).cloned(),
                    non_empty: values.len(),
                    total_rows: records.len(),
                    distinct,
                    ratio: ratio(values.len(), records.len()),
                }
            })
            .collect();

        resources.push(ResourceCoverage {
            resource: name.clone(),
            rows: records.len(),
            fields,
        });
    }

    CoverageReport {
        resources,
        overall_ratio: ratio(filled_cells, total_cells),
    }
}
