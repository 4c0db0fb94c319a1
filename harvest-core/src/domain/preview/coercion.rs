// harvest-core/src/domain/preview/coercion.rs

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::domain::extraction::ExtractionResult;
use crate::domain::rules::{ResourceShape, RuleDocument};
use crate::domain::transform::TransformEngine;

pub const MAX_SAMPLES_PER_FIELD: usize = 8;
pub const MAX_DISTINCT_ERRORS: usize = 5;

/// Raw text per resource, per field.
pub type RawSamples = IndexMap<String, IndexMap<String, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionFieldStat {
    pub resource: String,
    pub field: String,
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    /// First distinct messages, in order of appearance.
    pub distinct_errors: Vec<String>,
    /// First successfully coerced values.
    pub samples: Vec<Value>,
    /// Table columns are not transformed and always pass.
    pub passthrough: bool,
}

impl CoercionFieldStat {
    fn new(resource: &str, field: &str, passthrough: bool) -> Self {
        Self {
            resource: resource.to_string(),
            field: field.to_string(),
            total: 0,
            success: 0,
            failure: 0,
            distinct_errors: Vec::new(),
            samples: Vec::new(),
            passthrough,
        }
    }

    fn record_success(&mut self, value: Value) {
        self.total += 1;
        self.success += 1;
        if self.samples.len() < MAX_SAMPLES_PER_FIELD {
            self.samples.push(value);
        }
    }

    fn record_failure(&mut self, message: String) {
        self.total += 1;
        self.failure += 1;
        if self.distinct_errors.len() < MAX_DISTINCT_ERRORS && !self.distinct_errors.contains(&message)
        {
            self.distinct_errors.push(message);
        }
    }

    /// Share of successful coercions; 1.0 when nothing was sampled.
    pub fn success_ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.success as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoercionPreview {
    pub fields: Vec<CoercionFieldStat>,
}

impl CoercionPreview {
    pub fn failures(&self) -> impl Iterator<Item = &CoercionFieldStat> {
        self.fields.iter().filter(|f| f.failure > 0)
    }
}

fn sampled<'s>(samples: &'s RawSamples, resource: &str, field: &str) -> &'s [String] {
    samples
        .get(resource)
        .and_then(|fields| fields.get(field))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Runs each list field's chain over its samples. Fields without a chain are
/// left out; table columns appear as passthrough placeholders.
#[instrument(skip_all)]
pub fn generate_coercion_preview(
    doc: &RuleDocument,
    engine: &TransformEngine,
    samples: &RawSamples,
) -> CoercionPreview {
    let mut preview = CoercionPreview::default();

    for (name, rule) in &doc.resources {
        match &rule.shape {
            ResourceShape::List { fields, .. } => {
                for (field, spec) in fields.iter().filter(|(_, f)| !f.transforms.is_empty()) {
                    let mut stat = CoercionFieldStat::new(name, field, false);
                    for raw in sampled(samples, name, field) {
                        match engine.apply_chain(&Value::String(raw.clone()), &spec.transforms) {
                            Ok(value) => stat.record_success(value),
                            Err(e) => stat.record_failure(e.to_string()),
                        }
                    }
                    preview.fields.push(stat);
                }
            }
            ResourceShape::Table { columns } => {
                for column in columns {
                    let mut stat = CoercionFieldStat::new(name, column, true);
                    for raw in sampled(samples, name, column) {
                        stat.record_success(Value::String(raw.clone()));
                    }
                    preview.fields.push(stat);
                }
            }
        }
    }

    preview
}

/// Collects up to `limit` rows of raw text per resource from an
/// untransformed extraction. Nulls are skipped.
pub fn raw_samples(extraction: &ExtractionResult, limit: usize) -> RawSamples {
    let mut samples = RawSamples::new();

    for (resource, extracted) in &extraction.resources {
        let fields = samples.entry(resource.clone()).or_default();
        for record in extracted.records.iter().take(limit) {
            for (field, value) in record {
                let text = match value {
                    Value::Null => continue,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                fields.entry(field.clone()).or_default().push(text);
            }
        }
    }
    samples
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    fn doc() -> Result<RuleDocument> {
        Ok(RuleDocument::from_value(json!({
            "resources": {
                "players": {"selector": "li", "fields": {
                    "name": ".n",
                    "points": {"selector": ".p", "transforms": ["to_number"]}
                }},
                "standings": {"kind": "table", "selector": "table", "columns": ["team"]}
            }
        }))?)
    }

    fn samples(points: &[&str]) -> RawSamples {
        let mut samples = RawSamples::new();
        samples.entry("players".into()).or_default().insert(
            "points".into(),
            points.iter().map(|s| s.to_string()).collect(),
        );
        samples
            .entry("standings".into())
            .or_default()
            .insert("team".into(), vec!["Lions".into()]);
        samples
    }

    #[test]
    fn test_counts_add_up_and_caps_hold() -> Result<()> {
        let doc = doc()?;
        let mut raw: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        raw.extend((0..10).map(|i| format!("bad{i}")));
        let refs: Vec<&str> = raw.iter().map(String::as_str).collect();

        let preview = generate_coercion_preview(&doc, &TransformEngine::default(), &samples(&refs));
        let points = &preview.fields[0];

        assert_eq!(points.field, "points");
        assert_eq!(points.total, 30);
        assert_eq!(points.success + points.failure, points.total);
        assert_eq!(points.failure, 10);
        assert_eq!(points.samples.len(), MAX_SAMPLES_PER_FIELD);
        assert_eq!(points.distinct_errors.len(), MAX_DISTINCT_ERRORS);
        assert_eq!(preview.failures().count(), 1);
        Ok(())
    }

    #[test]
    fn test_fields_without_chain_are_skipped_and_tables_pass_through() -> Result<()> {
        let doc = doc()?;
        let preview = generate_coercion_preview(&doc, &TransformEngine::default(), &samples(&["1"]));

        let fields: Vec<_> = preview.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["points", "team"]);
        let team = &preview.fields[1];
        assert!(team.passthrough);
        assert_eq!(team.success, team.total);
        assert_eq!(team.success_ratio(), 1.0);
        Ok(())
    }

    #[test]
    fn test_missing_samples_yield_empty_stats() -> Result<()> {
        let doc = doc()?;
        let preview = generate_coercion_preview(&doc, &TransformEngine::default(), &RawSamples::new());
        assert!(preview.fields.iter().all(|f| f.total == 0));
        Ok(())
    }
}
