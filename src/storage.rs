//! Filesystem helpers shared by the tile and derived image caches.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::error::ArtifactError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Create the parent directory of `path`, recursively.
pub(crate) async fn ensure_parent(path: &Path) -> Result<(), ArtifactError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| ArtifactError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })
}

/// Sibling temp path, unique per process and call.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{counter}.tmp", std::process::id()))
}

/// Write `data` to `path` so readers only ever observe the complete file.
///
/// The bytes land in a temp file beside `path` and are renamed over it.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), ArtifactError> {
    ensure_parent(path).await?;

    let temp = temp_path(path);
    if let Err(source) = tokio::fs::write(&temp, data).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(ArtifactError::ImageWrite {
            path: path.to_path_buf(),
            source,
        });
    }
    if let Err(source) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(ArtifactError::ImageWrite {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Modification time of `path`, or `None` if it does not exist.
pub(crate) async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|m| m.is_file())
        .and_then(|m| m.modified().ok())
}

/// Read `path`, mapping "not found" to `None`.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, ArtifactError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c/file.png");

        write_atomic(&path, b"data").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"data");
        assert!(modified(&path).await.is_some());
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.jpeg");

        write_atomic(&path, b"one").await.unwrap();
        write_atomic(&path, b"two").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["file.jpeg".to_string()]);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.png");

        assert!(modified(&path).await.is_none());
        assert!(read_optional(&path).await.unwrap().is_none());
        assert!(modified(dir.path()).await.is_none());
    }

    #[test]
    fn test_temp_paths_are_unique() {
        let path = Path::new("/cache/map/file.png");
        let a = temp_path(path);
        let b = temp_path(path);
        assert_ne!(a, b);
        assert_eq!(a.parent(), path.parent());
        assert!(a.file_name().unwrap().to_string_lossy().ends_with(".tmp"));
    }
}
