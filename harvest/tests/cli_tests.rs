use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const STANDINGS: &str = r#"<html><body>
  <div class="news"><h2>Round 3 results</h2></div>
  <table class="standings">
    <tr><th>Team</th><th>Points</th></tr>
    <tr><td>Tigers</td><td>9</td></tr>
    <tr><td>Lions</td><td>7</td></tr>
  </table>
</body></html>"#;

/// A throwaway project: harvest.yaml, rules.json and one HTML document.
struct HarvestTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl HarvestTestEnv {
    fn new(rules: serde_json::Value) -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().join("league");
        fs::create_dir_all(root.join("documents"))?;

        fs::write(
            root.join("harvest.yaml"),
            "name: league\nrules: rules.json\ndocuments: documents\ndatabase: harvest.duckdb\n",
        )?;
        fs::write(root.join("rules.json"), serde_json::to_string_pretty(&rules)?)?;
        fs::write(root.join("documents/round3.html"), STANDINGS)?;

        Ok(Self { _tmp: tmp, root })
    }

    fn harvest(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("harvest"));
        cmd.current_dir(&self.root);
        cmd.env_remove("HARVEST_DATABASE");
        cmd.env_remove("HARVEST_STRICT_SAFETY");
        cmd
    }
}

fn league_rules() -> serde_json::Value {
    json!({
        "resources": {
            "teams": {"kind": "table", "selector": "table.standings", "columns": ["name", "points"]},
            "headlines": {"selector": "div.news", "fields": {"title": {"selector": "h2", "transforms": ["trim"]}}}
        },
        "quality_gates": {"teams.name": {"min_non_null": 0.5}}
    })
}

#[test]
fn test_validate_accepts_a_good_document() -> Result<()> {
    let env = HarvestTestEnv::new(league_rules())?;

    env.harvest()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid: 2 resource(s)"))
        .stdout(predicate::str::contains("Fingerprint:"));
    Ok(())
}

#[test]
fn test_validate_warns_about_unmapped_fields() -> Result<()> {
    let mut rules = league_rules();
    rules["mapping"] = json!({"teams.name": "clubs.name"});
    let env = HarvestTestEnv::new(rules)?;

    env.harvest()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Unmapped field teams.points"))
        .stdout(predicate::str::contains("is valid"));
    Ok(())
}

#[test]
fn test_validate_lists_every_issue() -> Result<()> {
    let env = HarvestTestEnv::new(json!({
        "resources": {
            "bad_kind": {"kind": "grid", "selector": "div"},
            "no_cols": {"kind": "table", "selector": "table", "columns": []}
        }
    }))?;

    env.harvest()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("/resources/bad_kind"))
        .stderr(predicate::str::contains("/resources/no_cols"));
    Ok(())
}

#[test]
fn test_preview_extracts_table_rows_as_json() -> Result<()> {
    let env = HarvestTestEnv::new(league_rules())?;

    let output = env.harvest().args(["preview", "--json"]).output()?;
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let teams = report["resources"]["teams"]["records"].as_array().cloned().unwrap_or_default();
    assert_eq!(teams.len(), 2);
    assert_eq!(teams[0]["name"], "Tigers");
    Ok(())
}

#[test]
fn test_simulate_reports_ready() -> Result<()> {
    let env = HarvestTestEnv::new(league_rules())?;

    env.harvest()
        .arg("simulate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Simulation passed"));

    // Nothing is written by a simulation
    assert!(!env.root.join("harvest.duckdb").exists());
    Ok(())
}

#[test]
fn test_simulate_blocks_on_failed_gate() -> Result<()> {
    let mut rules = league_rules();
    rules["resources"]["ghosts"] = json!({"selector": "div.nothing", "fields": {"x": "span"}});
    rules["quality_gates"]["ghosts.x"] = json!({"min_non_null": 0.5});
    let env = HarvestTestEnv::new(rules)?;

    env.harvest()
        .arg("simulate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghosts.x"));
    Ok(())
}

#[test]
fn test_simulate_refuses_forbidden_patterns() -> Result<()> {
    let mut rules = league_rules();
    rules["resources"]["headlines"]["selector"] = json!("h2[onclick='eval(1)']");
    let env = HarvestTestEnv::new(rules)?;

    env.harvest().arg("simulate").assert().failure();
    Ok(())
}

#[test]
fn test_apply_with_migrate_then_history() -> Result<()> {
    let env = HarvestTestEnv::new(league_rules())?;

    env.harvest()
        .args(["apply", "--migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("teams: 2 row(s)"))
        .stdout(predicate::str::contains("Published as v1"));

    env.harvest()
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("v1"));

    // The schema now matches, so a second migrate is a no-op
    env.harvest()
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("already matches"));
    Ok(())
}

#[test]
fn test_apply_without_tables_fails_cleanly() -> Result<()> {
    let env = HarvestTestEnv::new(league_rules())?;
    env.harvest().arg("apply").assert().failure();

    // A failed commit publishes nothing
    env.harvest()
        .arg("publish")
        .assert()
        .success()
        .stdout(predicate::str::contains("Published v1"));
    Ok(())
}

#[test]
fn test_publish_twice_is_a_duplicate() -> Result<()> {
    let env = HarvestTestEnv::new(league_rules())?;

    env.harvest().arg("publish").assert().success();
    env.harvest()
        .arg("publish")
        .assert()
        .failure()
        .stderr(predicate::str::contains("identical to the latest version"));
    Ok(())
}

#[test]
fn test_rollback_writes_a_draft() -> Result<()> {
    let env = HarvestTestEnv::new(league_rules())?;
    env.harvest().arg("publish").assert().success();

    env.harvest()
        .args(["rollback", "1", "--draft", "restore"])
        .assert()
        .success();

    let draft = fs::read_to_string(env.root.join(".harvest/drafts/restore.json"))?;
    let doc: serde_json::Value = serde_json::from_str(&draft)?;
    assert_eq!(doc["resources"]["teams"]["kind"], "table");

    env.harvest().args(["rollback", "9"]).assert().failure();
    Ok(())
}
