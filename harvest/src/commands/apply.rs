// harvest/src/commands/apply.rs
//
// USE CASE: Simulate, then commit through the guard and publish the rules.

use harvest_core::application::{GuardError, GuardSettings, SafeApplyGuard, SimulationReport};
use harvest_core::domain::versioning::{VersionError, VersionStore};
use std::sync::Arc;

use super::{Project, migrate};
use crate::cli::ProjectArgs;
use crate::render;

fn print_report(report: &SimulationReport) {
    let mut table = render::table(["Resource", "Rows"]);
    for (resource, rows) in &report.rows_by_resource {
        table.add_row(vec![resource.clone(), rows.to_string()]);
    }
    println!("{table}");

    for gate in &report.quality_gates.results {
        println!(
            "   ✅ {} {} (min {})",
            gate.key,
            render::percent(gate.ratio),
            render::percent(gate.threshold)
        );
    }
    for stat in report.coercion.failures() {
        println!(
            "   ⚠️  {}.{}: {} of {} value(s) failed to coerce",
            stat.resource, stat.field, stat.failure, stat.total
        );
    }
    if !report.constraint_issues.is_empty() {
        println!(
            "   ⚠️  {} constraint issue(s) in sample rows (advisory)",
            report.constraint_issues.len()
        );
    }
    println!("📊 Coverage: {}", render::percent(report.coverage_overall));
}

fn explain(err: GuardError) -> ! {
    match &err {
        GuardError::UnsafePayload { findings } => {
            for f in findings {
                eprintln!("   • '{}' at {}", f.pattern, f.path);
            }
        }
        GuardError::QualityGateFailure { failures } => {
            for g in failures {
                eprintln!(
                    "   • {}: {} < {}",
                    g.key,
                    render::percent(g.ratio),
                    render::percent(g.threshold)
                );
            }
        }
        _ => {}
    }
    render::fail(err)
}

pub async fn simulate(args: ProjectArgs, json: bool) -> anyhow::Result<()> {
    let project = Project::from_args(&args)?;
    let doc = project.load_rules()?;
    let pages = project.documents().await?;

    let guard = SafeApplyGuard::new(project.engine(), GuardSettings::from(&project.config));
    let report = match guard.simulate(&doc, &pages) {
        Ok(report) => report,
        Err(e) => explain(e),
    };

    if json {
        return render::json(&report);
    }
    print_report(&report);
    println!("🛡️  Simulation passed ({}); ready to apply", &report.rules_hash[..12]);
    Ok(())
}

pub async fn execute(args: ProjectArgs, migrate_first: bool) -> anyhow::Result<()> {
    let project = Project::from_args(&args)?;
    let doc = project.load_rules()?;
    let pages = project.documents().await?;
    let store = Arc::new(project.open_store()?);

    println!("🛡️  Simulating...");
    let guard = SafeApplyGuard::new(project.engine(), GuardSettings::from(&project.config));
    let report = match guard.simulate(&doc, &pages) {
        Ok(report) => report,
        Err(e) => explain(e),
    };
    print_report(&report);

    if migrate_first {
        let plan = migrate::plan(&doc, &store).await?;
        let ran = migrate::run(&store, &plan)?;
        println!("🏗️  {ran} migration statement(s) executed");
    }

    println!("🚀 Applying...");
    let receipt = match guard.apply(&doc, &report.extraction, store.as_ref()).await {
        Ok(receipt) => receipt,
        Err(e) => explain(e),
    };
    store.record_audit(&receipt.audit)?;
    for (table, rows) in &receipt.summary.tables {
        println!("   ➜ {table}: {rows} row(s)");
    }

    let versions = VersionStore::with_repository(store.clone())?;
    match versions.publish(&doc) {
        Ok(version) => println!("📌 Published as v{}", version.version_id),
        Err(VersionError::Duplicate { version_id }) => {
            println!("📌 Rules unchanged since v{version_id}")
        }
        Err(e) => render::fail(e),
    }

    println!("✨ {} row(s) written", receipt.summary.rows_written);
    Ok(())
}
