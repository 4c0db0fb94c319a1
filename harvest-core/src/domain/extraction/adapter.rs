// harvest-core/src/domain/extraction/adapter.rs

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, instrument};

use super::result::{ExtractionWarning, Record, is_filled, row_key};
use crate::domain::ports::{DocumentTree, SelectorError};
use crate::domain::rules::{ResourceRule, ResourceShape};
use crate::domain::transform::TransformEngine;

const ROW_SELECTOR: &str = "tr";
const CELL_SELECTOR: &str = "th, td";

/// Rows pulled out of one document for one resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRows {
    pub records: Vec<Record>,
    pub warnings: Vec<ExtractionWarning>,
    /// Selector to match count. Every evaluated selector has an entry.
    pub match_spans: IndexMap<String, usize>,
}

impl RawRows {
    /// Counts the matches under `span`; an invalid selector is warned once.
    fn tally<N>(&mut self, span: &str, result: Result<Vec<N>, SelectorError>) -> Vec<N> {
        let count = self.match_spans.entry(span.to_string()).or_insert(0);
        match result {
            Ok(nodes) => {
                *count += nodes.len();
                nodes
            }
            Err(e) => {
                let seen = self.warnings.iter().any(|w| {
                    matches!(w, ExtractionWarning::InvalidSelector { selector, .. } if *selector == e.selector)
                });
                if !seen {
                    self.warnings.push(ExtractionWarning::InvalidSelector {
                        selector: e.selector,
                        message: e.message,
                    });
                }
                Vec::new()
            }
        }
    }

    /// Folds rows from another document into this one: spans are summed,
    /// rows already present are dropped and zero-match warnings are left for
    /// `flag_empty_spans` to recompute over the totals.
    pub(crate) fn absorb(&mut self, other: RawRows, seen: &mut HashSet<String>) {
        for (span, count) in other.match_spans {
            *self.match_spans.entry(span).or_insert(0) += count;
        }
        for warning in other.warnings {
            if matches!(warning, ExtractionWarning::NoMatch { .. }) || self.warnings.contains(&warning) {
                continue;
            }
            self.warnings.push(warning);
        }
        self.records.extend(
            other
                .records
                .into_iter()
                .filter(|record| seen.insert(row_key(record))),
        );
    }

    /// Turns zero-count spans into warnings, skipping selectors already flagged invalid.
    pub(crate) fn flag_empty_spans(&mut self) {
        let invalid: Vec<String> = self
            .warnings
            .iter()
            .filter_map(|w| match w {
                ExtractionWarning::InvalidSelector { selector, .. } => Some(selector.clone()),
                _ => None,
            })
            .collect();

        let empty: Vec<String> = self
            .match_spans
            .iter()
            .filter(|(span, count)| {
                **count == 0 && !invalid.iter().any(|s| span.ends_with(s.as_str()))
            })
            .map(|(span, _)| span.clone())
            .collect();

        self.warnings.extend(
            empty
                .into_iter()
                .map(|selector| ExtractionWarning::NoMatch { selector }),
        );
    }
}

fn text_value<'a, D: DocumentTree<'a>>(tree: &'a D, node: D::Node) -> Value {
    Value::String(tree.node_text(node).trim().to_string())
}

/// Evaluates one resource rule against one document. Never fails: problems
/// become warnings and the affected values become `null`.
#[instrument(skip_all, fields(resource = %rule.name))]
pub fn extract<'a, D: DocumentTree<'a>>(
    tree: &'a D,
    rule: &ResourceRule,
    engine: &TransformEngine,
    apply_transforms: bool,
) -> RawRows {
    let mut rows = RawRows::default();

    match &rule.shape {
        ResourceShape::Table { columns } => extract_table(tree, rule, columns, &mut rows),
        ResourceShape::List {
            item_selector,
            fields,
        } => {
            let items = list_items(tree, &rule.selector, item_selector.as_deref(), &mut rows);
            let scope = match item_selector {
                Some(item) => format!("{} -> {item}", rule.selector),
                None => rule.selector.clone(),
            };

            if !items.is_empty() {
                for field in fields.values() {
                    rows.match_spans
                        .entry(format!("{scope} -> {}", field.selector))
                        .or_insert(0);
                }
            }

            for item in items {
                let mut record = Record::new();
                for (name, field) in fields {
                    let span = format!("{scope} -> {}", field.selector);
                    let hits = rows.tally(&span, tree.query_within(item, &field.selector));
                    let raw = hits
                        .first()
                        .map(|node| text_value(tree, *node))
                        .unwrap_or(Value::Null);
                    record.insert(name.clone(), raw);
                }
                if !record.values().any(is_filled) {
                    continue;
                }

                if apply_transforms {
                    let record_index = rows.records.len();
                    for (name, field) in fields.iter().filter(|(_, f)| !f.transforms.is_empty()) {
                        let raw = record.get(name).cloned().unwrap_or(Value::Null);
                        let value = match engine.apply_chain(&raw, &field.transforms) {
                            Ok(value) => value,
                            Err(error) => {
                                rows.warnings.push(ExtractionWarning::Transform {
                                    field: name.clone(),
                                    record_index,
                                    error,
                                });
                                Value::Null
                            }
                        };
                        record.insert(name.clone(), value);
                    }
                }
                rows.records.push(record);
            }
        }
    }

    rows.flag_empty_spans();
    debug!(
        records = rows.records.len(),
        warnings = rows.warnings.len(),
        "Resource extracted"
    );
    rows
}

fn list_items<'a, D: DocumentTree<'a>>(
    tree: &'a D,
    selector: &str,
    item_selector: Option<&str>,
    rows: &mut RawRows,
) -> Vec<D::Node> {
    let roots = rows.tally(selector, tree.query(selector));
    let Some(item) = item_selector else {
        return roots;
    };
    if roots.is_empty() {
        return roots;
    }

    let span = format!("{selector} -> {item}");
    rows.match_spans.entry(span.clone()).or_insert(0);
    let mut items = Vec::new();
    for root in roots {
        items.extend(rows.tally(&span, tree.query_within(root, item)));
    }
    items
}

const TABLE_TAG: &str = "table";

/// True when `tr` is a row of `scope` itself rather than of a table nested in
/// one of its cells. `inner` holds every table below `scope`.
fn owns_row<'a, D: DocumentTree<'a>>(tree: &D, scope: D::Node, inner: &[D::Node], tr: D::Node) -> bool {
    match tree.nearest_ancestor(tr, TABLE_TAG) {
        Some(owner) if owner == scope => true,
        Some(owner) if inner.contains(&owner) => !tree
            .nearest_ancestor(owner, TABLE_TAG)
            .is_some_and(|parent| parent == scope || inner.contains(&parent)),
        _ => false,
    }
}

/// Header-only rows are labels, not data. Cell `i` fills column `i`.
/// Rows and cells of nested tables are skipped.
fn extract_table<'a, D: DocumentTree<'a>>(
    tree: &'a D,
    rule: &ResourceRule,
    columns: &[String],
    rows: &mut RawRows,
) {
    let tables = rows.tally(&rule.selector, tree.query(&rule.selector));
    if tables.is_empty() {
        return;
    }

    let span = format!("{} {ROW_SELECTOR}", rule.selector);
    rows.match_spans.entry(span.clone()).or_insert(0);

    for table in tables {
        let inner: Vec<D::Node> = tree
            .query_within(table, TABLE_TAG)
            .unwrap_or_default()
            .into_iter()
            .filter(|t| *t != table)
            .collect();
        let own_rows = tree.query_within(table, ROW_SELECTOR).map(|trs| {
            trs.into_iter()
                .filter(|tr| owns_row(tree, table, &inner, *tr))
                .collect::<Vec<_>>()
        });

        for tr in rows.tally(&span, own_rows) {
            let cells: Vec<D::Node> = tree
                .query_within(tr, CELL_SELECTOR)
                .unwrap_or_default()
                .into_iter()
                .filter(|cell| tree.nearest_ancestor(*cell, ROW_SELECTOR) == Some(tr))
                .collect();
            if cells.iter().all(|cell| tree.node_is_header_cell(*cell)) {
                continue;
            }

            let record: Record = columns
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    let value = cells
                        .get(i)
                        .map(|cell| text_value(tree, *cell))
                        .unwrap_or(Value::Null);
                    (column.clone(), value)
                })
                .collect();

            if record.values().any(is_filled) {
                rows.records.push(record);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::rules::RuleDocument;
    use crate::infrastructure::adapters::html::HtmlDocument;
    use anyhow::Result;
    use serde_json::json;

    const PAGE: &str = r#"
        <table id="standings">
          <tr><th>Team</th><th>Points</th></tr>
          <tr><td>Lions</td><td>12</td></tr>
          <tr><th>Tigers</th><td>9</td></tr>
          <tr><td>Bears</td></tr>
          <tr><td></td><td> </td></tr>
        </table>
        <ul class="players">
          <li><span class="name"> Ann </span><span class="pts">1.234,5</span></li>
          <li><span class="name">Bob</span><span class="pts">lots</span></li>
          <li><span class="name">Cid</span></li>
        </ul>"#;

    fn rules() -> Result<RuleDocument> {
        Ok(RuleDocument::from_value(json!({
            "resources": {
                "standings": {"kind": "table", "selector": "table#standings", "columns": ["team", "points"]},
                "players": {
                    "selector": "ul.players",
                    "item_selector": "li",
                    "fields": {
                        "name": ".name",
                        "points": {"selector": ".pts", "transforms": [{"operation": "to_number", "config": {"locale": "de"}}]}
                    }
                },
                "ghosts": {"selector": "div.nothing", "fields": {"x": "span"}}
            }
        }))?)
    }

    #[test]
    fn test_table_skips_header_only_rows() -> Result<()> {
        let doc = rules()?;
        let page = HtmlDocument::parse(PAGE);
        let rows = extract(&page, &doc.resources["standings"], &TransformEngine::default(), true);

        assert_eq!(
            rows.records,
            vec![
                json!({"team": "Lions", "points": "12"}).as_object().cloned().unwrap(),
                json!({"team": "Tigers", "points": "9"}).as_object().cloned().unwrap(),
                json!({"team": "Bears", "points": null}).as_object().cloned().unwrap(),
            ]
        );
        assert_eq!(rows.match_spans["table#standings"], 1);
        assert_eq!(rows.match_spans["table#standings tr"], 5);
        Ok(())
    }

    #[test]
    fn test_nested_table_rows_stay_out() -> Result<()> {
        let doc = RuleDocument::from_value(json!({
            "resources": {
                "outer": {"kind": "table", "selector": "table.outer", "columns": ["team", "detail"]},
                "wrapped": {"kind": "table", "selector": "div.wrap", "columns": ["team", "detail"]}
            }
        }))?;
        let page = HtmlDocument::parse(
            r#"<div class="wrap"><table class="outer">
                 <tr><td>Lions</td><td><table><tr><td>nested</td><td>row</td></tr></table></td></tr>
                 <tr><td>Tigers</td><td>9</td></tr>
               </table></div>"#,
        );
        let engine = TransformEngine::default();

        for resource in ["outer", "wrapped"] {
            let rows = extract(&page, &doc.resources[resource], &engine, false);
            let teams: Vec<_> = rows.records.iter().map(|r| r["team"].clone()).collect();
            assert_eq!(teams, vec![json!("Lions"), json!("Tigers")], "{resource}");
            assert_eq!(rows.records[0]["detail"], json!("nestedrow"));
        }
        Ok(())
    }

    #[test]
    fn test_list_without_transforms_keeps_raw_text() -> Result<()> {
        let doc = rules()?;
        let page = HtmlDocument::parse(PAGE);
        let rows = extract(&page, &doc.resources["players"], &TransformEngine::default(), false);

        assert_eq!(rows.records.len(), 3);
        assert_eq!(rows.records[0]["name"], json!("Ann"));
        assert_eq!(rows.records[0]["points"], json!("1.234,5"));
        assert_eq!(rows.records[2]["points"], Value::Null);
        assert!(rows.warnings.is_empty());
        assert_eq!(rows.match_spans["ul.players -> li"], 3);
        assert_eq!(rows.match_spans["ul.players -> li -> .pts"], 2);
        Ok(())
    }

    #[test]
    fn test_transform_failure_nulls_one_field_only() -> Result<()> {
        let doc = rules()?;
        let page = HtmlDocument::parse(PAGE);
        let rows = extract(&page, &doc.resources["players"], &TransformEngine::default(), true);

        assert_eq!(rows.records[0]["points"], json!(1234.5));
        assert_eq!(rows.records[1]["name"], json!("Bob"));
        assert_eq!(rows.records[1]["points"], Value::Null);
        assert_eq!(rows.warnings.len(), 1);
        assert!(matches!(
            &rows.warnings[0],
            ExtractionWarning::Transform { field, record_index: 1, .. } if field == "points"
        ));
        Ok(())
    }

    #[test]
    fn test_zero_matches_warn_but_keep_span() -> Result<()> {
        let doc = rules()?;
        let page = HtmlDocument::parse(PAGE);
        let rows = extract(&page, &doc.resources["ghosts"], &TransformEngine::default(), true);

        assert!(rows.records.is_empty());
        assert_eq!(rows.match_spans["div.nothing"], 0);
        assert_eq!(
            rows.warnings,
            vec![ExtractionWarning::NoMatch {
                selector: "div.nothing".into()
            }]
        );
        Ok(())
    }

    #[test]
    fn test_invalid_selector_is_a_warning() -> Result<()> {
        let doc = RuleDocument::from_value(json!({
            "resources": {"broken": {"selector": "ul[[", "fields": {"x": "li"}}}
        }))?;
        let page = HtmlDocument::parse(PAGE);
        let rows = extract(&page, &doc.resources["broken"], &TransformEngine::default(), true);

        assert!(rows.records.is_empty());
        assert_eq!(rows.warnings.len(), 1);
        assert!(matches!(rows.warnings[0], ExtractionWarning::InvalidSelector { .. }));
        Ok(())
    }
}
