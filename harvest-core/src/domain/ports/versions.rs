// harvest-core/src/domain/ports/versions.rs

use crate::domain::error::DomainError;
use crate::domain::versioning::VersionedRuleDocument;

/// Durable backing for the version log. Entries are never updated or removed.
pub trait VersionRepository: Send + Sync {
    /// Every stored version, oldest first.
    fn load_all(&self) -> Result<Vec<VersionedRuleDocument>, DomainError>;

    fn append(&self, version: &VersionedRuleDocument) -> Result<(), DomainError>;
}
