// harvest/src/commands/preview.rs
//
// USE CASE: Read-only previews over the project documents.

use std::path::PathBuf;

use harvest_core::RuleDocument;
use harvest_core::application::adapt_over_documents;
use harvest_core::domain::extraction::{ExtractionResult, ResourceSummary};
use harvest_core::domain::preview::{
    SampleRows, compute_field_coverage, diff_rule_documents, generate_coercion_preview,
    generate_parse_preview, raw_samples, simulate_constraints,
};
use harvest_core::domain::rules::ResourceKind;

use super::{Project, load_rules_from};
use crate::cli::ProjectArgs;
use crate::render;

fn print_summaries<'s>(summaries: impl IntoIterator<Item = &'s ResourceSummary>) {
    let mut table = render::table(["Resource", "Kind", "Records", "Warnings"]);
    let mut warnings = Vec::new();
    for summary in summaries {
        table.add_row(vec![
            summary.resource.clone(),
            summary.kind.to_string(),
            summary.record_count.to_string(),
            summary.warnings.len().to_string(),
        ]);
        warnings.extend(
            summary
                .warnings
                .iter()
                .map(|w| format!("{}: {w}", summary.resource)),
        );
    }
    println!("{table}");
    for warning in warnings {
        println!("   ⚠️  {warning}");
    }
}

pub async fn execute(
    args: ProjectArgs,
    transforms: bool,
    json: bool,
    document: Option<PathBuf>,
) -> anyhow::Result<()> {
    let project = Project::from_args(&args)?;
    let doc = project.load_rules()?;
    let engine = project.engine();

    if let Some(path) = document {
        let page = project.single_document(Some(&path)).await?;
        let preview = generate_parse_preview(&doc, &page, &engine, transforms);
        if json {
            return render::json(&preview);
        }
        print_summaries(&preview.summaries);
        println!("✨ {} record(s) from {}", preview.total_records(), path.display());
        return Ok(());
    }

    let pages = project.documents().await?;
    let extraction = adapt_over_documents(&doc, &pages, &engine, transforms);
    if json {
        return render::json(&extraction);
    }
    print_summaries(extraction.resources.values().map(|r| &r.summary));
    println!(
        "✨ {} record(s) from {} document(s)",
        extraction.total_rows(),
        pages.len()
    );
    Ok(())
}

pub async fn coercion(args: ProjectArgs, json: bool) -> anyhow::Result<()> {
    let project = Project::from_args(&args)?;
    let doc = project.load_rules()?;
    let engine = project.engine();
    let pages = project.documents().await?;

    let raw = adapt_over_documents(&doc, &pages, &engine, false);
    let samples = raw_samples(&raw, project.config.preview.sample_limit);
    let preview = generate_coercion_preview(&doc, &engine, &samples);
    if json {
        return render::json(&preview);
    }

    let mut table = render::table(["Resource", "Field", "Total", "OK", "Failed", "Errors"]);
    for stat in &preview.fields {
        let field = if stat.passthrough {
            format!("{} (raw)", stat.field)
        } else {
            stat.field.clone()
        };
        table.add_row(vec![
            stat.resource.clone(),
            field,
            stat.total.to_string(),
            stat.success.to_string(),
            stat.failure.to_string(),
            stat.distinct_errors.join("\n"),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn coverage(args: ProjectArgs, json: bool) -> anyhow::Result<()> {
    let project = Project::from_args(&args)?;
    let doc = project.load_rules()?;
    let pages = project.documents().await?;

    let extraction = adapt_over_documents(&doc, &pages, &project.engine(), true);
    let report = compute_field_coverage(&doc, &extraction);
    if json {
        return render::json(&report);
    }

    let mut table = render::table(["Resource", "Field", "Target", "Filled", "Distinct", "Ratio"]);
    for resource in &report.resources {
        for field in &resource.fields {
            table.add_row(vec![
                resource.resource.clone(),
                field.field.clone(),
                field.target_column.clone().unwrap_or_default(),
                format!("{}/{}", field.non_empty, field.total_rows),
                field.distinct.to_string(),
                render::percent(field.ratio),
            ]);
        }
    }
    println!("{table}");
    println!("📊 Overall: {}", render::percent(report.overall_ratio));
    Ok(())
}

fn table_samples(project: &Project, doc: &RuleDocument, extraction: &ExtractionResult) -> SampleRows {
    doc.resources_of(ResourceKind::Table)
        .map(|rule| {
            let rows = extraction
                .records(&rule.name)
                .iter()
                .take(project.config.preview.sample_limit)
                .cloned()
                .collect();
            (rule.name.clone(), rows)
        })
        .collect()
}

pub async fn constraints(args: ProjectArgs, json: bool) -> anyhow::Result<()> {
    let project = Project::from_args(&args)?;
    let doc = project.load_rules()?;
    let pages = project.documents().await?;

    let extraction = adapt_over_documents(&doc, &pages, &project.engine(), true);
    let issues = simulate_constraints(&doc, &table_samples(&project, &doc, &extraction));
    if json {
        return render::json(&issues);
    }

    if issues.is_empty() {
        println!("✅ No constraint issues in the sampled rows");
        return Ok(());
    }
    for issue in &issues {
        println!("   ⚠️  {}", serde_json::to_string(issue)?);
    }
    println!("{} issue(s); advisory only, nothing is blocked.", issues.len());
    Ok(())
}

pub async fn diff(args: ProjectArgs, other: PathBuf, document: Option<PathBuf>) -> anyhow::Result<()> {
    let project = Project::from_args(&args)?;
    let current = project.load_rules()?;
    let candidate = load_rules_from(&other)?;
    let page = project.single_document(document.as_deref()).await?;

    let diff = diff_rule_documents(&current, &candidate, &page, &project.engine());

    let mut table = render::table(["Resource", "Current", "Other", "Only current", "Only other", "Shared"]);
    for resource in &diff.resources {
        let kind = |k: Option<ResourceKind>| k.map_or("-".to_string(), |k| k.to_string());
        table.add_row(vec![
            resource.resource.clone(),
            format!("{} ({})", resource.count_a, kind(resource.kind_a)),
            format!("{} ({})", resource.count_b, kind(resource.kind_b)),
            resource.only_a.to_string(),
            resource.only_b.to_string(),
            resource.overlap.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
