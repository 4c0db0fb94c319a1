// harvest/src/commands/migrate.rs
//
// USE CASE: Diff the implied schema against DuckDB, optionally run the
// additive statements.

use anyhow::Context;
use harvest_core::RuleDocument;
use harvest_core::domain::preview::{
    LiveSchema, MigrationAction, MigrationPreview, generate_migration_preview,
};
use harvest_core::infrastructure::adapters::DuckDbStore;

use super::Project;
use crate::cli::ProjectArgs;
use crate::render;

pub async fn plan(doc: &RuleDocument, store: &DuckDbStore) -> anyhow::Result<MigrationPreview> {
    let live = LiveSchema::introspect(store)
        .await
        .context("Failed to read the live schema")?;
    Ok(generate_migration_preview(doc, &live))
}

/// Runs every suggested statement; returns how many ran.
pub fn run(store: &DuckDbStore, preview: &MigrationPreview) -> anyhow::Result<usize> {
    let statements = preview.statements();
    if statements.is_empty() {
        return Ok(0);
    }
    Ok(store.execute_migration(&statements)?)
}

pub async fn execute(args: ProjectArgs, execute: bool, json: bool) -> anyhow::Result<()> {
    let project = Project::from_args(&args)?;
    let doc = project.load_rules()?;
    let store = project.open_store()?;

    let preview = plan(&doc, &store).await?;
    if json {
        return render::json(&preview);
    }
    if preview.is_empty() {
        println!("✅ Database schema already matches the rules");
        return Ok(());
    }

    let mut table = render::table(["Table", "Action", "Statement / note"]);
    for action in &preview.actions {
        let (kind, detail) = match action {
            MigrationAction::CreateTable { .. } => ("create_table", action.suggested_sql()),
            MigrationAction::AddColumn { .. } => ("add_column", action.suggested_sql()),
            MigrationAction::TypeNote {
                column,
                declared_type,
                observed_type,
                ..
            } => (
                "type_note",
                Some(format!("{column}: store declares {declared_type}, rules imply {observed_type}")),
            ),
        };
        table.add_row(vec![
            action.table().to_string(),
            kind.to_string(),
            detail.unwrap_or_default(),
        ]);
    }
    println!("{table}");

    if execute {
        let ran = run(&store, &preview)?;
        println!("🏗️  {ran} statement(s) executed");
    } else {
        println!("👉 Re-run with --execute to apply the CREATE/ALTER statements.");
    }
    Ok(())
}
