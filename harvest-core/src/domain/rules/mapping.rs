// harvest-core/src/domain/rules/mapping.rs

use indexmap::IndexMap;
use serde::Serialize;

use super::document::{RuleDocument, split_key};

/// Where one extracted field lands in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetColumn {
    pub resource: String,
    pub field: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetTable {
    pub name: String,
    pub columns: Vec<TargetColumn>,
}

/// Expected storage layout implied by the rules.
///
/// A resource with at least one mapping entry contributes only its mapped
/// fields. A resource without any maps to a table of the same name with one
/// column per field. Tables appear in order of first use, columns in
/// resource-then-field declaration order. A column claimed twice keeps its
/// first source.
pub fn resolve_targets(doc: &RuleDocument) -> Vec<TargetTable> {
    let mut tables: IndexMap<String, Vec<TargetColumn>> = IndexMap::new();

    for (resource, rule) in &doc.resources {
        let prefix = format!("{resource}.");
        let mapped = doc.mapping.keys().any(|k| k.starts_with(&prefix));

        for field in rule.field_names() {
            let target = if mapped {
                doc.mapping
                    .get(&format!("{resource}.{field}"))
                    .and_then(|t| split_key(t))
            } else {
                Some((resource.as_str(), field))
            };
            let Some((table, column)) = target else {
                continue;
            };

            let columns = tables.entry(table.to_string()).or_default();
            if columns.iter().any(|c| c.column == column) {
                continue;
            }
            columns.push(TargetColumn {
                resource: resource.clone(),
                field: field.to_string(),
                column: column.to_string(),
            });
        }
    }

    tables
        .into_iter()
        .map(|(name, columns)| TargetTable { name, columns })
        .collect()
}

/// A declared field that never reaches storage: its resource has mapping
/// entries, none of them for this field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanField {
    pub resource: String,
    pub field: String,
    pub suggestion: String,
}

/// Fields left out by a partial mapping, sorted by name within each
/// resource. Resources without mapping entries map identically and have
/// no orphans.
pub fn compute_orphan_fields(doc: &RuleDocument) -> Vec<OrphanField> {
    let mut orphans = Vec::new();
    for (resource, rule) in &doc.resources {
        let prefix = format!("{resource}.");
        if !doc.mapping.keys().any(|k| k.starts_with(&prefix)) {
            continue;
        }

        let mut fields: Vec<&str> = rule
            .field_names()
            .into_iter()
            .filter(|field| !doc.mapping.contains_key(&format!("{resource}.{field}")))
            .collect();
        fields.sort_unstable();

        orphans.extend(fields.into_iter().map(|field| OrphanField {
            resource: resource.clone(),
            field: field.to_string(),
            suggestion: format!(
                "Map '{resource}.{field}' to a target column or remove the field if it is obsolete"
            ),
        }));
    }
    orphans
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_unmapped_resources_map_identically() -> Result<()> {
        let doc = RuleDocument::parse(
            r#"{"resources": {"standings": {"kind": "table", "selector": "table", "columns": ["name", "points"]}}}"#,
        )?;
        let targets = resolve_targets(&doc);

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "standings");
        let cols: Vec<_> = targets[0].columns.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(cols, vec!["name", "points"]);
        Ok(())
    }

    #[test]
    fn test_mapped_resources_keep_only_mapped_fields() -> Result<()> {
        let doc = RuleDocument::parse(
            r#"{
                "resources": {
                    "players": {"selector": "li", "fields": {"name": ".n", "age": ".a", "club": ".c"}},
                    "coaches": {"selector": "p", "fields": {"name": ".n"}}
                },
                "mapping": {"players.club": "people.team", "players.name": "people.full_name", "coaches.name": "staff.name"}
            }"#,
        )?;
        let targets = resolve_targets(&doc);

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "people");
        let cols: Vec<_> = targets[0].columns.iter().map(|c| c.column.as_str()).collect();
        // Field declaration order, not mapping order.
        assert_eq!(cols, vec!["full_name", "team"]);
        assert_eq!(targets[1].columns[0].resource, "coaches");
        Ok(())
    }

    #[test]
    fn test_partial_mapping_reports_orphans() -> Result<()> {
        let doc = RuleDocument::parse(
            r#"{
                "resources": {
                    "players": {"selector": "li", "fields": {"name": ".n", "club": ".c", "age": ".a"}},
                    "coaches": {"selector": "p", "fields": {"name": ".n"}}
                },
                "mapping": {"players.name": "people.full_name"}
            }"#,
        )?;
        let orphans = compute_orphan_fields(&doc);

        let names: Vec<_> = orphans
            .iter()
            .map(|o| format!("{}.{}", o.resource, o.field))
            .collect();
        assert_eq!(names, vec!["players.age", "players.club"]);
        assert!(orphans[0].suggestion.contains("players.age"));

        // Orphans are exactly the fields `resolve_targets` leaves out.
        let placed: usize = resolve_targets(&doc).iter().map(|t| t.columns.len()).sum();
        assert_eq!(placed, 2);
        Ok(())
    }

    #[test]
    fn test_unmapped_document_has_no_orphans() -> Result<()> {
        let doc = RuleDocument::parse(
            r#"{"resources": {"t": {"kind": "table", "selector": "table", "columns": ["a", "b"]}}}"#,
        )?;
        assert!(compute_orphan_fields(&doc).is_empty());
        Ok(())
    }
}
