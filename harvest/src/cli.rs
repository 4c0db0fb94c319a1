// harvest/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Declarative ingestion rules: extract, preview, simulate, then commit", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the project lives and which rule file to use.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project directory (holds harvest.yaml)
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Rule document, overriding `rules` from harvest.yaml
    #[arg(long)]
    pub rules: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// ✅ Validates the rule document and lists every problem
    Validate {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// 🔍 Extracts records from the project documents
    Preview {
        #[command(flatten)]
        project: ProjectArgs,

        /// Run field transform chains
        #[arg(long)]
        transforms: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Preview a single document instead of the whole documents directory
        #[arg(long)]
        document: Option<PathBuf>,
    },

    /// 🧪 Shows how raw values fare through each transform chain
    Coercion {
        #[command(flatten)]
        project: ProjectArgs,

        #[arg(long)]
        json: bool,
    },

    /// 📊 Non-empty ratio of every field
    Coverage {
        #[command(flatten)]
        project: ProjectArgs,

        #[arg(long)]
        json: bool,
    },

    /// 🏗️  Compares the schema the rules imply with the database
    Migrate {
        #[command(flatten)]
        project: ProjectArgs,

        /// Run the suggested CREATE/ALTER statements
        #[arg(long)]
        execute: bool,

        #[arg(long)]
        json: bool,
    },

    /// 🔗 Checks sample rows for duplicate ids and dangling references
    Constraints {
        #[command(flatten)]
        project: ProjectArgs,

        #[arg(long)]
        json: bool,
    },

    /// ↔️  Compares what two rule documents extract from one document
    Diff {
        #[command(flatten)]
        project: ProjectArgs,

        /// The rule document to compare against
        other: PathBuf,

        /// Document to run both on (default: the first project document)
        #[arg(long)]
        document: Option<PathBuf>,
    },

    /// 🛡️  Runs the full pre-commit simulation without writing anything
    Simulate {
        #[command(flatten)]
        project: ProjectArgs,

        #[arg(long)]
        json: bool,
    },

    /// 🚀 Simulates, commits the rows, then publishes the rules
    Apply {
        #[command(flatten)]
        project: ProjectArgs,

        /// Create missing tables and columns before writing
        #[arg(long)]
        migrate: bool,
    },

    /// 📌 Records the rule document as a new version
    Publish {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// 📜 Lists published versions and past applies
    History {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// ⏪ Writes an old version to the draft store
    Rollback {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        version_id: u64,

        /// Draft name (default: rollback-v<ID>)
        #[arg(long)]
        draft: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use clap::Parser;

    #[test]
    fn test_cli_parse_preview_defaults() -> Result<()> {
        let args = Cli::parse_from(["harvest", "preview"]);
        match args.command {
            Commands::Preview {
                project,
                transforms,
                json,
                document,
            } => {
                assert_eq!(project.project_dir.to_string_lossy(), ".");
                assert!(project.rules.is_none());
                assert!(!transforms && !json);
                assert!(document.is_none());
                Ok(())
            }
            _ => bail!("Expected Preview command"),
        }
    }

    #[test]
    fn test_cli_parse_migrate_execute() -> Result<()> {
        let args = Cli::parse_from([
            "harvest",
            "migrate",
            "--execute",
            "--project-dir",
            "/tmp/league",
            "--rules",
            "alt.json",
        ]);
        match args.command {
            Commands::Migrate {
                project, execute, ..
            } => {
                assert!(execute);
                assert_eq!(project.project_dir.to_string_lossy(), "/tmp/league");
                assert_eq!(project.rules.unwrap_or_default().to_string_lossy(), "alt.json");
                Ok(())
            }
            _ => bail!("Expected Migrate command"),
        }
    }

    #[test]
    fn test_cli_parse_rollback() -> Result<()> {
        let args = Cli::parse_from(["harvest", "rollback", "3", "--draft", "old"]);
        match args.command {
            Commands::Rollback {
                version_id, draft, ..
            } => {
                assert_eq!(version_id, 3);
                assert_eq!(draft.as_deref(), Some("old"));
                Ok(())
            }
            _ => bail!("Expected Rollback command"),
        }
    }
}
