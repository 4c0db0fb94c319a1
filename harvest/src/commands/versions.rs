// harvest/src/commands/versions.rs
//
// USE CASE: Publish, list and roll back rule versions.

use std::path::PathBuf;
use std::sync::Arc;

use harvest_core::domain::versioning::VersionStore;
use harvest_core::infrastructure::adapters::DuckDbStore;

use super::Project;
use crate::cli::ProjectArgs;
use crate::render;

fn version_store(project: &Project) -> anyhow::Result<(VersionStore, Arc<DuckDbStore>)> {
    let store = Arc::new(project.open_store()?);
    let versions = VersionStore::with_repository(store.clone())?;
    Ok((versions, store))
}

pub fn publish(args: ProjectArgs) -> anyhow::Result<()> {
    let project = Project::from_args(&args)?;
    let doc = project.load_rules()?;
    let (versions, _) = version_store(&project)?;

    match versions.publish(&doc) {
        Ok(version) => {
            println!("📌 Published v{} ({})", version.version_id, version.hash);
            Ok(())
        }
        Err(e) => render::fail(e),
    }
}

pub fn history(project_dir: PathBuf) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let (versions, store) = version_store(&project)?;

    let mut table = render::table(["Version", "Published", "Hash", "Resources"]);
    for version in versions.history() {
        table.add_row(vec![
            format!("v{}", version.version_id),
            version.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            version.hash[..12].to_string(),
            version.document.resources.len().to_string(),
        ]);
    }
    println!("{table}");

    let audit = store.audit_log()?;
    if !audit.is_empty() {
        let mut table = render::table(["Applied", "Hash", "Rows"]);
        for entry in audit {
            table.add_row(vec![
                entry.applied_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                entry.rules_hash[..12].to_string(),
                entry.rows_written.to_string(),
            ]);
        }
        println!("{table}");
    }
    Ok(())
}

pub fn rollback(project_dir: PathBuf, version_id: u64, draft: Option<String>) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let (versions, _) = version_store(&project)?;

    let doc = match versions.rollback(version_id) {
        Ok(doc) => doc,
        Err(e) => render::fail(e),
    };
    let name = draft.unwrap_or_else(|| format!("rollback-v{version_id}"));
    let path = project.drafts().save(&name, &doc)?;

    println!("⏪ v{version_id} written to {}", path.display());
    println!("👉 Review it, copy it over your rules, then publish to make it current.");
    Ok(())
}
