// harvest-core/src/application/commit.rs

use serde_json::Value;

use crate::domain::extraction::ExtractionResult;
use crate::domain::rules::{RuleDocument, resolve_targets};
use crate::ports::TableOp;

/// Groups extracted rows by target table, one op per resource feeding it.
/// Ops follow table order, then resource declaration order; empty ops are
/// skipped.
pub fn build_table_ops(doc: &RuleDocument, extraction: &ExtractionResult) -> Vec<TableOp> {
    let mut ops = Vec::new();

    for table in resolve_targets(doc) {
        for resource in doc.resources.keys() {
            let sources: Vec<_> = table
                .columns
                .iter()
                .filter(|c| &c.resource == resource)
                .collect();
            if sources.is_empty() {
                continue;
            }

            let rows: Vec<Vec<Value>> = extraction
                .records(resource)
                .iter()
                .map(|record| {
                    sources
                        .iter()
                        .map(|c| record.get(&c.field).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .collect();
            if rows.is_empty() {
                continue;
            }

            ops.push(TableOp {
                resource: resource.clone(),
                table: table.name.clone(),
                columns: sources.iter().map(|c| c.column.clone()).collect(),
                rows,
            });
        }
    }
    ops
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::extraction::{ResourceExtraction, ResourceSummary};
    use crate::domain::rules::ResourceKind;
    use anyhow::Result;
    use serde_json::json;

    fn extraction(resource: &str, rows: Value) -> ExtractionResult {
        let records: Vec<_> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        let mut result = ExtractionResult::default();
        result.resources.insert(
            resource.into(),
            ResourceExtraction {
                kind: ResourceKind::List,
                summary: ResourceSummary {
                    resource: resource.into(),
                    kind: ResourceKind::List,
                    record_count: records.len(),
                    warnings: vec![],
                },
                records,
                match_spans: Default::default(),
            },
        );
        result
    }

    #[test]
    fn test_mapped_fields_become_table_columns() -> Result<()> {
        let doc = RuleDocument::from_value(json!({
            "resources": {"p": {"selector": "li", "fields": {"name": ".n", "age": ".a", "junk": ".j"}}},
            "mapping": {"p.name": "people.full_name", "p.age": "people.age"}
        }))?;
        let ops = build_table_ops(&doc, &extraction("p", json!([{"name": "Ann", "age": 3, "junk": "x"}, {"name": "Bob"}])));

        assert_eq!(
            ops,
            vec![TableOp {
                resource: "p".into(),
                table: "people".into(),
                columns: vec!["full_name".into(), "age".into()],
                rows: vec![vec![json!("Ann"), json!(3)], vec![json!("Bob"), Value::Null]],
            }]
        );
        Ok(())
    }

    #[test]
    fn test_empty_resources_produce_no_op() -> Result<()> {
        let doc = RuleDocument::from_value(json!({
            "resources": {"p": {"selector": "li", "fields": {"name": ".n"}}}
        }))?;
        assert!(build_table_ops(&doc, &ExtractionResult::default()).is_empty());
        Ok(())
    }
}
