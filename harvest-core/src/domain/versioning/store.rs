// harvest-core/src/domain/versioning/store.rs

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{info, instrument};

use crate::domain::error::DomainError;
use crate::domain::ports::VersionRepository;
use crate::domain::rules::RuleDocument;

/// An immutable, published snapshot of a rule document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRuleDocument {
    pub version_id: u64,
    /// Fingerprint of `document` at publish time.
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub document: RuleDocument,
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Document is identical to the latest version (v{version_id})")]
    #[diagnostic(
        code(harvest::domain::version_duplicate),
        help("Change the rules before publishing again.")
    )]
    Duplicate { version_id: u64 },

    #[error("Version v{0} does not exist")]
    #[diagnostic(code(harvest::domain::version_not_found))]
    NotFound(u64),

    #[error("Version repository failure: {0}")]
    #[diagnostic(code(harvest::domain::version_repository))]
    Repository(String),
}

/// Append-only log of published rule documents.
///
/// Ids grow strictly; a rollback never rewrites history, it hands back an
/// old document that can be published again as a new version.
pub struct VersionStore {
    log: Mutex<Vec<VersionedRuleDocument>>,
    repository: Option<Arc<dyn VersionRepository>>,
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionStore {
    /// In-memory store, lost with the process.
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            repository: None,
        }
    }

    /// Store backed by `repository`; existing history is loaded up front.
    #[instrument(skip_all)]
    pub fn with_repository(repository: Arc<dyn VersionRepository>) -> Result<Self, DomainError> {
        let mut log = repository.load_all()?;
        log.sort_by_key(|v| v.version_id);
        info!(versions = log.len(), "Version history loaded");

        Ok(Self {
            log: Mutex::new(log),
            repository: Some(repository),
        })
    }

    fn entries(&self) -> MutexGuard<'_, Vec<VersionedRuleDocument>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[instrument(skip_all)]
    pub fn publish(&self, doc: &RuleDocument) -> Result<VersionedRuleDocument, VersionError> {
        let mut log = self.entries();
        let hash = doc.fingerprint();

        if let Some(latest) = log.last()
            && latest.hash == hash
        {
            return Err(VersionError::Duplicate {
                version_id: latest.version_id,
            });
        }

        let version = VersionedRuleDocument {
            version_id: log.last().map_or(1, |v| v.version_id + 1),
            hash,
            created_at: Utc::now(),
            document: doc.clone(),
        };

        if let Some(repository) = &self.repository {
            repository
                .append(&version)
                .map_err(|e| VersionError::Repository(e.to_string()))?;
        }
        log.push(version.clone());

        info!(version_id = version.version_id, hash = %version.hash, "Rule document published");
        Ok(version)
    }

    /// The document stored under `version_id`. The log is left untouched.
    pub fn rollback(&self, version_id: u64) -> Result<RuleDocument, VersionError> {
        self.get(version_id)
            .map(|v| v.document)
            .ok_or(VersionError::NotFound(version_id))
    }

    pub fn get(&self, version_id: u64) -> Option<VersionedRuleDocument> {
        self.entries()
            .iter()
            .find(|v| v.version_id == version_id)
            .cloned()
    }

    /// Every version, oldest first.
    pub fn history(&self) -> Vec<VersionedRuleDocument> {
        self.entries().clone()
    }

    pub fn latest(&self) -> Option<VersionedRuleDocument> {
        self.entries().last().cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    fn doc(selector: &str) -> Result<RuleDocument> {
        Ok(RuleDocument::from_value(json!({
            "resources": {"p": {"selector": selector, "fields": {"name": ".n"}}}
        }))?)
    }

    #[test]
    fn test_publish_twice_is_a_duplicate() -> Result<()> {
        let store = VersionStore::new();
        let first = store.publish(&doc("li")?)?;
        assert_eq!(first.version_id, 1);

        let err = store.publish(&doc("li")?).unwrap_err();
        assert_eq!(err, VersionError::Duplicate { version_id: 1 });
        assert_eq!(store.history().len(), 1);
        Ok(())
    }

    #[test]
    fn test_rollback_then_publish_gets_a_new_id() -> Result<()> {
        let store = VersionStore::new();
        let v1 = store.publish(&doc("li")?)?;
        let v2 = store.publish(&doc("tr")?)?;
        assert!(v2.version_id > v1.version_id);

        let old = store.rollback(v1.version_id)?;
        assert_eq!(old, v1.document);
        assert_eq!(store.history().len(), 2);

        let v3 = store.publish(&old)?;
        assert_eq!(v3.version_id, 3);
        assert_eq!(v3.hash, v1.hash);
        assert_eq!(store.latest().unwrap().version_id, 3);
        Ok(())
    }

    #[test]
    fn test_unknown_version() {
        let store = VersionStore::new();
        assert_eq!(store.rollback(7).unwrap_err(), VersionError::NotFound(7));
    }

    // --- persistence through the port ---

    struct MockRepository {
        appended: Arc<Mutex<Vec<VersionedRuleDocument>>>,
        seed: Vec<VersionedRuleDocument>,
    }

    impl VersionRepository for MockRepository {
        fn load_all(&self) -> Result<Vec<VersionedRuleDocument>, DomainError> {
            Ok(self.seed.clone())
        }

        fn append(&self, version: &VersionedRuleDocument) -> Result<(), DomainError> {
            self.appended.lock().unwrap().push(version.clone());
            Ok(())
        }
    }

    #[test]
    fn test_repository_history_is_loaded_and_appended() -> Result<()> {
        let seeded = VersionStore::new().publish(&doc("li")?)?;
        let appended = Arc::new(Mutex::new(Vec::new()));
        let repository = MockRepository {
            appended: appended.clone(),
            seed: vec![seeded.clone()],
        };

        let store = VersionStore::with_repository(Arc::new(repository))?;
        assert_eq!(store.history(), vec![seeded]);

        let v2 = store.publish(&doc("tr")?)?;
        assert_eq!(v2.version_id, 2);
        assert_eq!(*appended.lock().unwrap(), vec![v2]);
        Ok(())
    }
}
