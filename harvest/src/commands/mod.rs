// harvest/src/commands/mod.rs

pub mod apply;
pub mod migrate;
pub mod preview;
pub mod validate;
pub mod versions;

use anyhow::{Context, bail};
use std::fs;
use std::path::{Path, PathBuf};

use harvest_core::RuleDocument;
use harvest_core::domain::transform::TransformEngine;
use harvest_core::infrastructure::adapters::{DuckDbStore, HtmlDocument};
use harvest_core::infrastructure::config::{ProjectConfig, load_project_config};
use harvest_core::infrastructure::drafts::DraftStore;
use harvest_core::infrastructure::fs::{discover_documents, read_documents};

use crate::cli::ProjectArgs;
use crate::render;

/// A loaded project: its directory, its config, and an explicit rule file if
/// one was given on the command line.
pub struct Project {
    pub dir: PathBuf,
    pub config: ProjectConfig,
    rules_override: Option<PathBuf>,
}

impl Project {
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let config = load_project_config(dir)
            .with_context(|| format!("Failed to load project configuration from {:?}", dir))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            rules_override: None,
        })
    }

    pub fn from_args(args: &ProjectArgs) -> anyhow::Result<Self> {
        let mut project = Self::load(&args.project_dir)?;
        project.rules_override = args.rules.clone();
        Ok(project)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }

    pub fn rules_path(&self) -> PathBuf {
        match &self.rules_override {
            Some(path) => path.clone(),
            None => self.resolve(Path::new(&self.config.rules)),
        }
    }

    /// Parses the rule file; validation problems are printed in full and end
    /// the process.
    pub fn load_rules(&self) -> anyhow::Result<RuleDocument> {
        load_rules_from(&self.rules_path())
    }

    pub fn engine(&self) -> TransformEngine {
        TransformEngine::default()
    }

    /// Every HTML document under the documents directory.
    pub async fn documents(&self) -> anyhow::Result<Vec<HtmlDocument>> {
        let root = self.resolve(Path::new(&self.config.documents));
        let paths = discover_documents(&root)
            .with_context(|| format!("Failed to scan documents in {:?}", root))?;
        if paths.is_empty() {
            bail!("❌ No HTML documents found in {:?}", root);
        }
        let raw = read_documents(&paths).await?;
        Ok(raw.iter().map(|(_, html)| HtmlDocument::parse(html)).collect())
    }

    /// One named document, or the first project document.
    pub async fn single_document(&self, path: Option<&Path>) -> anyhow::Result<HtmlDocument> {
        match path {
            Some(path) => HtmlDocument::from_path(path)
                .with_context(|| format!("Failed to read document {:?}", path)),
            None => self
                .documents()
                .await?
                .into_iter()
                .next()
                .context("No document to run on"),
        }
    }

    pub fn open_store(&self) -> anyhow::Result<DuckDbStore> {
        let db = &self.config.database;
        let db_path = if db == ":memory:" {
            db.clone()
        } else {
            self.resolve(Path::new(db)).to_string_lossy().into_owned()
        };
        DuckDbStore::open(&db_path).with_context(|| format!("Failed to open DuckDB at {}", db_path))
    }

    pub fn drafts(&self) -> DraftStore {
        DraftStore::new(self.resolve(Path::new(&self.config.drafts)))
    }
}

pub fn load_rules_from(path: &Path) -> anyhow::Result<RuleDocument> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read rules at {:?}", path))?;
    match RuleDocument::parse(&raw) {
        Ok(doc) => Ok(doc),
        Err(e) => {
            eprintln!("❌ {}", path.display());
            for issue in &e.issues {
                eprintln!("   • {issue}");
            }
            render::fail(e)
        }
    }
}
