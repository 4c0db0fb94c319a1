// harvest/src/commands/validate.rs
//
// USE CASE: Check a rule document without touching documents or storage.

use harvest_core::domain::governance::SafetyScanner;
use harvest_core::domain::rules::compute_orphan_fields;

use super::Project;
use crate::cli::ProjectArgs;
use crate::render;

pub fn execute(args: ProjectArgs) -> anyhow::Result<()> {
    let project = Project::from_args(&args)?;
    let doc = project.load_rules()?;

    let mut table = render::table(["Resource", "Kind", "Selector", "Fields"]);
    for (name, rule) in &doc.resources {
        table.add_row(vec![
            name.clone(),
            rule.kind().to_string(),
            rule.selector.clone(),
            rule.field_names().join(", "),
        ]);
    }
    println!("{table}");

    for orphan in compute_orphan_fields(&doc) {
        println!(
            "   ⚠️  Unmapped field {}.{}: {}",
            orphan.resource, orphan.field, orphan.suggestion
        );
    }

    let scanner = SafetyScanner::new(&project.config.safety)?;
    let findings = scanner.scan(&serde_json::to_value(&doc)?);
    for finding in &findings {
        println!("   ⚠️  Forbidden pattern '{}' at {}", finding.pattern, finding.path);
    }

    println!(
        "✅ {} is valid: {} resource(s), {} mapping(s), {} quality gate(s)",
        project.rules_path().display(),
        doc.resources.len(),
        doc.mapping.len(),
        doc.quality_gates.len()
    );
    println!("   Fingerprint: {}", doc.fingerprint());
    if !findings.is_empty() {
        println!("   Simulation will refuse these rules until the flagged values are removed.");
    }
    Ok(())
}
