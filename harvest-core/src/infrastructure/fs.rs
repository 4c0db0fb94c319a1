// harvest-core/src/infrastructure/fs.rs

use futures::{StreamExt, TryStreamExt, stream};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::infrastructure::error::InfrastructureError;

const DOCUMENT_EXTENSIONS: [&str; 2] = ["html", "htm"];
const READ_CONCURRENCY: usize = 8;

/// Write content to a file atomically using a temporary file.
///
/// The temporary file lives in the target's directory so the final rename
/// never crosses filesystems. Readers see the old content or the new one.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(InfrastructureError::Io)?;
    temp_file
        .write_all(content.as_ref())
        .map_err(InfrastructureError::Io)?;
    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;

    Ok(())
}

/// HTML files under `root` (or `root` itself), sorted by path.
#[instrument]
pub fn discover_documents(root: &Path) -> Result<Vec<PathBuf>, InfrastructureError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| InfrastructureError::Io(e.into()))?;
        let is_document = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if entry.file_type().is_file() && is_document {
            found.push(entry.into_path());
        }
    }
    found.sort();
    debug!(count = found.len(), "Documents discovered");
    Ok(found)
}

/// Reads every file concurrently; output keeps the input order.
pub async fn read_documents(paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>, InfrastructureError> {
    stream::iter(paths.iter().cloned())
        .map(|path| async move {
            let raw = tokio::fs::read_to_string(&path).await?;
            Ok::<_, InfrastructureError>((path, raw))
        })
        .buffered(READ_CONCURRENCY)
        .try_collect()
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_overwrites_existing() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("rules.json");

        atomic_write(&file_path, "Initial")?;
        atomic_write(&file_path, "Updated")?;

        assert_eq!(fs::read_to_string(file_path)?, "Updated");
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_and_read_documents() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("2024"))?;
        fs::write(dir.path().join("b.html"), "<p>b</p>")?;
        fs::write(dir.path().join("2024/a.HTM"), "<p>a</p>")?;
        fs::write(dir.path().join("notes.txt"), "skip")?;

        let paths = discover_documents(dir.path())?;
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["2024/a.HTM", "b.html"]);

        let docs = read_documents(&paths).await?;
        assert_eq!(docs[0].1, "<p>a</p>");
        assert_eq!(docs[1].1, "<p>b</p>");
        Ok(())
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(discover_documents(Path::new("/definitely/not/here")).is_err());
    }
}
