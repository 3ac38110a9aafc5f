//! Filesystem helpers for output directories.

use std::path::Path;
use tokio::fs;

use crate::error::MediaResult;

/// Directory mode for created output directories.
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

/// Create `dir` and any missing parents.
///
/// Idempotent: an existing directory is not an error.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> MediaResult<()> {
    let dir = dir.as_ref();

    if fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);

    builder.create(dir).await?;
    tracing::debug!("Created output directory {}", dir.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_dir_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b").join("c");

        ensure_dir(&nested).await.unwrap();
        assert!(nested.is_dir());

        // Second call is a no-op
        ensure_dir(&nested).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_dir_fails_on_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("taken");
        std::fs::write(&file, b"x").unwrap();

        assert!(ensure_dir(file.join("sub")).await.is_err());
    }
}
