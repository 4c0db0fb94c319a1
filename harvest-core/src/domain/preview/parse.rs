// harvest-core/src/domain/preview/parse.rs

use indexmap::IndexMap;
use serde::Serialize;
use tracing::instrument;

use crate::domain::extraction::{
    ExtractionResult, Record, ResourceExtraction, ResourceSummary, extract,
};
use crate::domain::ports::DocumentTree;
use crate::domain::rules::{ResourceKind, RuleDocument};
use crate::domain::transform::TransformEngine;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsePreview {
    pub summaries: Vec<ResourceSummary>,
    pub extracted_records: IndexMap<String, Vec<Record>>,
    /// Same rows as `extracted_records` for now; kept apart for future row
    /// normalization.
    pub flattened_tables: IndexMap<String, Vec<Record>>,
    pub match_spans: IndexMap<String, IndexMap<String, usize>>,
}

/// Extracts every resource of `doc` from one document.
#[instrument(skip_all, fields(resources = doc.resources.len(), apply_transforms = apply_transforms))]
pub fn generate_parse_preview<'a, D: DocumentTree<'a>>(
    doc: &RuleDocument,
    tree: &'a D,
    engine: &TransformEngine,
    apply_transforms: bool,
) -> ParsePreview {
    let mut preview = ParsePreview {
        summaries: Vec::with_capacity(doc.resources.len()),
        extracted_records: IndexMap::new(),
        flattened_tables: IndexMap::new(),
        match_spans: IndexMap::new(),
    };

    for (name, rule) in &doc.resources {
        let rows = extract(tree, rule, engine, apply_transforms);
        preview.summaries.push(ResourceSummary {
            resource: name.clone(),
            kind: rule.kind(),
            record_count: rows.records.len(),
            warnings: rows.warnings,
        });
        preview
            .flattened_tables
            .insert(name.clone(), rows.records.clone());
        preview.extracted_records.insert(name.clone(), rows.records);
        preview.match_spans.insert(name.clone(), rows.match_spans);
    }

    preview
}

impl ParsePreview {
    pub fn total_records(&self) -> usize {
        self.summaries.iter().map(|s| s.record_count).sum()
    }

    pub fn into_extraction(self) -> ExtractionResult {
        let mut records = self.extracted_records;
        let mut spans = self.match_spans;

        let resources = self
            .summaries
            .into_iter()
            .map(|summary| {
                let name = summary.resource.clone();
                let kind: ResourceKind = summary.kind;
                let extraction = ResourceExtraction {
                    kind,
                    records: records.shift_remove(&name).unwrap_or_default(),
                    match_spans: spans.shift_remove(&name).unwrap_or_default(),
                    summary,
                };
                (name, extraction)
            })
            .collect();

        ExtractionResult { resources }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::HtmlDocument;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn test_preview_covers_every_resource_in_order() -> Result<()> {
        let doc = RuleDocument::from_value(json!({
            "resources": {
                "titles": {"selector": "h1", "fields": {"text": "span"}},
                "links": {"selector": "a", "fields": {"href": "b"}}
            }
        }))?;
        let page = HtmlDocument::parse("<h1><span> Hello </span></h1><h1><span>World</span></h1>");
        let preview = generate_parse_preview(&doc, &page, &TransformEngine::default(), false);

        let names: Vec<_> = preview.summaries.iter().map(|s| s.resource.as_str()).collect();
        assert_eq!(names, vec!["titles", "links"]);
        assert_eq!(preview.summaries[0].record_count, 2);
        assert_eq!(preview.summaries[1].record_count, 0);
        assert_eq!(preview.summaries[1].warnings.len(), 1);
        assert_eq!(preview.extracted_records, preview.flattened_tables);
        assert_eq!(preview.match_spans["links"]["a"], 0);

        let extraction = preview.into_extraction();
        assert_eq!(extraction.records("titles")[0]["text"], json!("Hello"));
        assert_eq!(extraction.row_counts()["links"], 0);
        Ok(())
    }
}
