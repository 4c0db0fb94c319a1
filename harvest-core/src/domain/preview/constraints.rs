// harvest-core/src/domain/preview/constraints.rs

// Naming heuristics only: `id` and `*_id` columns are unique candidates, and
// `team_id` points at a table resource named like `team`. Results are
// advisory and never block an apply.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::domain::extraction::Record;
use crate::domain::rules::{ResourceKind, ResourceRule, RuleDocument};

/// Sample rows per table resource.
pub type SampleRows = IndexMap<String, Vec<Record>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintIssue {
    UniqueViolation {
        table: String,
        column: String,
        value: String,
        row_indices: Vec<usize>,
    },
    FkOrphan {
        table: String,
        column: String,
        value: String,
        parent_table: String,
        row_index: usize,
    },
}

/// Comparison key for a cell. Numbers and numeric text share one form, so
/// `1`, `"1"` and `"1.0"` collide. Integers keep full precision. Null and
/// blank cells have no key.
fn value_key(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::Number(n) if n.is_i64() || n.is_u64() => return Some(n.to_string()),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        return None;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Some(int.to_string());
    }
    if let Ok(int) = text.parse::<u64>() {
        return Some(int.to_string());
    }
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 => {
            #[allow(clippy::cast_possible_truncation)]
            let int = n as i64;
            Some(int.to_string())
        }
        Ok(n) if n.is_finite() => Some(n.to_string()),
        _ => Some(text),
    }
}

fn is_unique_candidate(column: &str) -> bool {
    column == "id" || column.ends_with("_id")
}

/// Singular/plural spellings a parent table may use for `stem`.
fn parent_candidates(stem: &str) -> Vec<String> {
    let mut names = vec![stem.to_string(), format!("{stem}s")];
    if let Some(singular) = stem.strip_suffix("ies") {
        names.push(format!("{singular}y"));
    } else if let Some(singular) = stem.strip_suffix('s') {
        names.push(singular.to_string());
    }
    if let Some(base) = stem.strip_suffix('y') {
        names.push(format!("{base}ies"));
    }
    names
}

fn column_keys<'r>(rows: &'r [Record], column: &'r str) -> impl Iterator<Item = (usize, String)> + 'r {
    rows.iter()
        .enumerate()
        .filter_map(move |(i, row)| row.get(column).and_then(value_key).map(|k| (i, k)))
}

fn rows_of<'s>(samples: &'s SampleRows, resource: &str) -> &'s [Record] {
    samples.get(resource).map(Vec::as_slice).unwrap_or(&[])
}

/// Uniqueness and reference checks over sample rows of table resources.
pub fn simulate_constraints(doc: &RuleDocument, samples: &SampleRows) -> Vec<ConstraintIssue> {
    let tables: Vec<&ResourceRule> = doc.resources_of(ResourceKind::Table).collect();

    let id_sets: HashMap<&str, HashSet<String>> = tables
        .iter()
        .filter(|t| t.has_field("id"))
        .map(|t| {
            let ids = column_keys(rows_of(samples, &t.name), "id").map(|(_, k)| k).collect();
            (t.name.as_str(), ids)
        })
        .collect();

    let mut issues = Vec::new();
    for table in &tables {
        let rows = rows_of(samples, &table.name);
        let columns = table.field_names();

        for column in columns.iter().copied().filter(|c| is_unique_candidate(c)) {
            let mut seen: IndexMap<String, Vec<usize>> = IndexMap::new();
            for (i, key) in column_keys(rows, column) {
                seen.entry(key).or_default().push(i);
            }
            issues.extend(seen.into_iter().filter(|(_, rows)| rows.len() > 1).map(
                |(value, row_indices)| ConstraintIssue::UniqueViolation {
                    table: table.name.clone(),
                    column: column.to_string(),
                    value,
                    row_indices,
                },
            ));
        }

        for column in columns.iter().copied() {
            let Some(stem) = column.strip_suffix("_id").filter(|s| !s.is_empty()) else {
                continue;
            };
            let parent = parent_candidates(stem).into_iter().find_map(|candidate| {
                id_sets
                    .get_key_value(candidate.as_str())
                    .filter(|(name, ids)| **name != table.name && !ids.is_empty())
            });
            let Some((parent_table, ids)) = parent else {
                continue;
            };

            for (row_index, value) in column_keys(rows, column) {
                if !ids.contains(&value) {
                    issues.push(ConstraintIssue::FkOrphan {
                        table: table.name.clone(),
                        column: column.to_string(),
                        value,
                        parent_table: (*parent_table).to_string(),
                        row_index,
                    });
                }
            }
        }
    }
    issues
}
