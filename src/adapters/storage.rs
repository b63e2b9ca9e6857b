use crate::core::Storage;
use crate::utils::error::{Result, XdsError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Filesystem storage rooted at a base directory.
///
/// Writes go to a staging file next to the target and are renamed into place, so a reader
/// never sees a half-written document and a failed write leaves nothing behind.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

fn write_atomic(full_path: &Path, data: &[u8]) -> Result<PathBuf> {
    let parent = full_path.parent().ok_or_else(|| {
        XdsError::validation(format!("'{}' has no parent directory", full_path.display()))
    })?;
    std::fs::create_dir_all(parent)?;

    // Dropping the staging file on any early return deletes it.
    let mut staging = NamedTempFile::new_in(parent)?;
    staging.write_all(data)?;
    staging.as_file().sync_all()?;
    staging.persist(full_path).map_err(|e| XdsError::IoError(e.error))?;

    Ok(full_path.to_path_buf())
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<PathBuf> {
        let full_path = self.base_path.join(path);
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || write_atomic(&full_path, &data))
            .await
            .map_err(|e| XdsError::IoError(std::io::Error::other(e)))?
    }

    async fn existing(&self, path: &str) -> Result<Option<PathBuf>> {
        let full_path = self.base_path.join(path);
        match tokio::fs::metadata(&full_path).await {
            Ok(meta) if meta.is_file() => Ok(Some(full_path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_write_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        let path = storage
            .write_file("patient-42/doc_text.xml", b"<ClinicalDocument/>")
            .await
            .unwrap();

        assert_eq!(path, temp_dir.path().join("patient-42/doc_text.xml"));
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"<ClinicalDocument/>"
        );
    }

    #[tokio::test]
    async fn test_rewrite_leaves_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage.write_file("doc_text.xml", b"first").await.unwrap();
        storage.write_file("doc_text.xml", b"second").await.unwrap();

        assert_eq!(entries(temp_dir.path()), vec!["doc_text.xml".to_string()]);
        assert_eq!(
            std::fs::read(temp_dir.path().join("doc_text.xml")).unwrap(),
            b"second"
        );
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        // A directory occupies the target name, so the final rename must fail.
        std::fs::create_dir(temp_dir.path().join("taken")).unwrap();
        std::fs::write(temp_dir.path().join("taken/keep"), b"x").unwrap();

        assert!(storage.write_file("taken", b"data").await.is_err());
        assert_eq!(entries(temp_dir.path()), vec!["taken".to_string()]);
    }

    #[tokio::test]
    async fn test_existing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        assert_eq!(storage.existing("doc_text.xml").await.unwrap(), None);
        storage.write_file("doc_text.xml", b"x").await.unwrap();
        assert_eq!(
            storage.existing("doc_text.xml").await.unwrap(),
            Some(temp_dir.path().join("doc_text.xml"))
        );
    }
}
