// harvest-core/src/infrastructure/drafts.rs

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::domain::error::DomainError;
use crate::domain::rules::RuleDocument;
use crate::error::HarvestError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;

/// Work-in-progress rule documents, one pretty-printed JSON file per draft.
#[derive(Debug, Clone)]
pub struct DraftStore {
    root: PathBuf,
}

impl DraftStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Draft names are plain file stems: letters, digits, `-`, `_` and `.`.
    fn path_for(&self, name: &str) -> Result<PathBuf, HarvestError> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        let path = self.root.join(format!("{name}.json"));

        // Path traversal guard
        if !plain || !path.starts_with(&self.root) {
            return Err(HarvestError::UnsafePath(name.to_string()));
        }
        Ok(path)
    }

    #[instrument(skip(self, doc))]
    pub fn save(&self, name: &str, doc: &RuleDocument) -> Result<PathBuf, HarvestError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.root)?;

        let json = doc.to_json_pretty().map_err(InfrastructureError::Json)?;
        atomic_write(&path, json)?;
        info!(path = ?path, "Draft saved");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<RuleDocument, HarvestError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(InfrastructureError::DraftNotFound(name.to_string()).into());
        }
        let raw = fs::read_to_string(&path)?;
        let doc = RuleDocument::parse(&raw).map_err(DomainError::from)?;
        debug!(path = ?path, "Draft loaded");
        Ok(doc)
    }

    /// Draft names, sorted. A missing directory holds no drafts.
    pub fn list(&self) -> Result<Vec<String>, HarvestError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
