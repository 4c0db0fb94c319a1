// harvest-core/src/application/adapter.rs

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{info, instrument};

use crate::domain::extraction::{
    ExtractionResult, RawRows, ResourceExtraction, ResourceSummary, extract,
};
use crate::domain::ports::DocumentTree;
use crate::domain::rules::RuleDocument;
use crate::domain::transform::TransformEngine;

/// Runs every resource over every document and merges the output per
/// resource. Identical rows seen in several documents are kept once, in
/// order of first appearance; match counts are summed.
#[instrument(skip_all, fields(documents = trees.len(), apply_transforms = apply_transforms))]
pub fn adapt_over_documents<'a, D: DocumentTree<'a>>(
    doc: &RuleDocument,
    trees: &'a [D],
    engine: &TransformEngine,
    apply_transforms: bool,
) -> ExtractionResult {
    let mut merged: IndexMap<&str, (RawRows, HashSet<String>)> = doc
        .resources
        .keys()
        .map(|name| (name.as_str(), (RawRows::default(), HashSet::new())))
        .collect();

    for tree in trees {
        for (name, rule) in &doc.resources {
            let rows = extract(tree, rule, engine, apply_transforms);
            if let Some((acc, seen)) = merged.get_mut(name.as_str()) {
                acc.absorb(rows, seen);
            }
        }
    }

    let resources = merged
        .into_iter()
        .filter_map(|(name, (mut rows, _))| {
            let rule = doc.resource(name)?;
            rows.flag_empty_spans();
            let summary = ResourceSummary {
                resource: name.to_string(),
                kind: rule.kind(),
                record_count: rows.records.len(),
                warnings: rows.warnings,
            };
            Some((
                name.to_string(),
                ResourceExtraction {
                    kind: rule.kind(),
                    records: rows.records,
                    summary,
                    match_spans: rows.match_spans,
                },
            ))
        })
        .collect();

    let result = ExtractionResult { resources };
    info!(rows = result.total_rows(), "Documents adapted");
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::extraction::ExtractionWarning;
    use crate::infrastructure::adapters::HtmlDocument;
    use anyhow::Result;
    use serde_json::json;

    fn rules() -> Result<RuleDocument> {
        Ok(RuleDocument::from_value(json!({
            "resources": {
                "players": {"selector": "li", "fields": {"name": ".n"}},
                "coaches": {"selector": "p.coach", "fields": {"name": "b"}}
            }
        }))?)
    }

    #[test]
    fn test_rows_are_merged_and_deduplicated() -> Result<()> {
        let pages = vec![
            HtmlDocument::parse(r#"<ul><li><i class="n">Ann</i></li><li><i class="n">Bob</i></li></ul>"#),
            HtmlDocument::parse(
                r#"<ul><li><i class="n">Bob</i></li><li><i class="n">Cid</i></li></ul><p class="coach"><b>Dee</b></p>"#,
            ),
        ];

        let result = adapt_over_documents(&rules()?, &pages, &TransformEngine::default(), true);

        let names: Vec<_> = result
            .records("players")
            .iter()
            .map(|r| r["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("Ann"), json!("Bob"), json!("Cid")]);
        assert_eq!(result.resources["players"].match_spans["li"], 4);
        assert_eq!(result.resources["players"].summary.record_count, 3);

        // `p.coach` matched in the second page only: no zero-match warning.
        let coaches = &result.resources["coaches"];
        assert_eq!(coaches.records.len(), 1);
        assert!(coaches.summary.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn test_zero_matches_everywhere_still_warn_once() -> Result<()> {
        let pages = vec![HtmlDocument::parse("<div></div>"), HtmlDocument::parse("<span></span>")];
        let result = adapt_over_documents(&rules()?, &pages, &TransformEngine::default(), true);

        assert_eq!(
            result.resources["coaches"].summary.warnings,
            vec![ExtractionWarning::NoMatch {
                selector: "p.coach".into()
            }]
        );
        assert_eq!(result.total_rows(), 0);
        Ok(())
    }

    #[test]
    fn test_no_documents_gives_empty_resources() -> Result<()> {
        let pages: Vec<HtmlDocument> = vec![];
        let result = adapt_over_documents(&rules()?, &pages, &TransformEngine::default(), true);
        assert_eq!(result.resources.len(), 2);
        assert_eq!(result.total_rows(), 0);
        Ok(())
    }
}
