// harvest-core/src/domain/preview/diff.rs

// Quick comparison of two rule documents over the same page: what rows each
// one extracts, and how many they share.

use serde::Serialize;
use std::collections::HashSet;

use super::parse::generate_parse_preview;
use crate::domain::extraction::Record;
use crate::domain::extraction::result::row_key;
use crate::domain::ports::DocumentTree;
use crate::domain::rules::{ResourceKind, RuleDocument};
use crate::domain::transform::TransformEngine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDiff {
    pub resource: String,
    pub kind_a: Option<ResourceKind>,
    pub kind_b: Option<ResourceKind>,
    pub count_a: usize,
    pub count_b: usize,
    pub only_a: usize,
    pub only_b: usize,
    pub overlap: usize,
}

impl ResourceDiff {
    pub fn is_unchanged(&self) -> bool {
        self.kind_a == self.kind_b && self.only_a == 0 && self.only_b == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleDiff {
    pub resources: Vec<ResourceDiff>,
}

fn keys(rows: &[Record]) -> Vec<String> {
    rows.iter().map(row_key).collect()
}

pub fn diff_rule_documents<'a, D: DocumentTree<'a>>(
    a: &RuleDocument,
    b: &RuleDocument,
    tree: &'a D,
    engine: &TransformEngine,
) -> RuleDiff {
    let preview_a = generate_parse_preview(a, tree, engine, true);
    let preview_b = generate_parse_preview(b, tree, engine, true);

    let mut names: Vec<&String> = a.resources.keys().collect();
    names.extend(b.resources.keys().filter(|k| !a.resources.contains_key(*k)));

    let resources = names
        .into_iter()
        .map(|name| {
            let rows_a = keys(preview_a.extracted_records.get(name).map(Vec::as_slice).unwrap_or(&[]));
            let rows_b = keys(preview_b.extracted_records.get(name).map(Vec::as_slice).unwrap_or(&[]));
            let set_a: HashSet<&String> = rows_a.iter().collect();
            let set_b: HashSet<&String> = rows_b.iter().collect();

            let overlap = rows_a.iter().filter(|k| set_b.contains(k)).count();
            ResourceDiff {
                resource: name.clone(),
                kind_a: a.resource(name).map(|r| r.kind()),
                kind_b: b.resource(name).map(|r| r.kind()),
                count_a: rows_a.len(),
                count_b: rows_b.len(),
                only_a: rows_a.len() - overlap,
                only_b: rows_b.iter().filter(|k| !set_a.contains(k)).count(),
                overlap,
            }
        })
        .collect();

    RuleDiff { resources }
}
