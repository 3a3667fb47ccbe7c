//! On-disk storage for project artifacts.
//!
//! Uploaded files are written under the configured upload folder with a random
//! hex prefix so two uploads of `report.pdf` never collide.

use std::path::PathBuf;

use anyhow::Context;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::UploadConfig;

/// Random bytes in the stored-name prefix (rendered as twice as many hex chars).
const PREFIX_BYTES: usize = 8;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No file selected")]
    MissingFile,

    #[error("File type not allowed: {0}")]
    DisallowedExtension(String),

    #[error("Invalid file name")]
    InvalidName,

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    allowed_extensions: Vec<String>,
}

impl FileStore {
    #[must_use]
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: PathBuf::from(&config.upload_folder),
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// `true` when the name has an extension on the allow list (case-insensitive).
    #[must_use]
    pub fn allowed_file(&self, filename: &str) -> bool {
        extension(filename).is_some_and(|ext| self.allowed_extensions.contains(&ext))
    }

    /// Writes the upload and returns the stored filename.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        if original_name.trim().is_empty() {
            return Err(StorageError::MissingFile);
        }

        if !self.allowed_file(original_name) {
            return Err(StorageError::DisallowedExtension(original_name.to_string()));
        }

        let safe = secure_filename(original_name);
        if !self.allowed_file(&safe) {
            return Err(StorageError::InvalidName);
        }

        let stored = format!("{}{}", random_hex(PREFIX_BYTES), safe);

        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create upload folder {}", self.root.display()))?;

        let path = self.root.join(&stored);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload {}", path.display()))?;

        debug!(original = original_name, stored = %stored, size = bytes.len(), "Stored artifact");
        Ok(stored)
    }

    /// Path of a stored file, provided the name is already sanitised and exists.
    pub async fn resolve(&self, stored_name: &str) -> Option<PathBuf> {
        if stored_name.is_empty() || secure_filename(stored_name) != stored_name {
            return None;
        }

        let path = self.root.join(stored_name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    pub async fn remove(&self, stored_name: &str) {
        if let Some(path) = self.resolve(stored_name).await
            && let Err(e) = tokio::fs::remove_file(&path).await
        {
            warn!("Failed to remove artifact file {}: {}", path.display(), e);
        }
    }
}

fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Reduces a client-supplied name to `[A-Za-z0-9._-]` with no directory parts.
///
/// Whitespace becomes `_`, other characters are dropped, and leading or
/// trailing dots and underscores are stripped. May return an empty string.
#[must_use]
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");

    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    filtered.trim_matches(|c| c == '.' || c == '_').to_string()
}

fn random_hex(len: usize) -> String {
    use rand::RngCore;

    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);

    bytes.iter().fold(String::with_capacity(len * 2), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn store(dir: &Path) -> FileStore {
        FileStore::new(&UploadConfig {
            upload_folder: dir.display().to_string(),
            ..UploadConfig::default()
        })
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My cool report.pdf"), "My_cool_report.pdf");
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("C:\\Users\\me\\notes.txt"), "notes.txt");
        assert_eq!(secure_filename(".hidden.txt"), "hidden.txt");
        assert_eq!(secure_filename("résumé.pdf"), "rsum.pdf");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn test_allowed_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = store(dir.path());

        assert!(files.allowed_file("plan.PDF"));
        assert!(files.allowed_file("archive.tar.zip"));
        assert!(!files.allowed_file("script.exe"));
        assert!(!files.allowed_file("README"));
        assert!(!files.allowed_file("pdf"));
    }

    #[tokio::test]
    async fn test_save_randomizes_name() {
        let dir = tempfile::tempdir().unwrap();
        let files = store(dir.path());

        let first = files.save("site plan.pdf", b"one").await.unwrap();
        let second = files.save("site plan.pdf", b"two").await.unwrap();

        assert_ne!(first, second);
        assert_ne!(first, "site plan.pdf");
        assert!(first.ends_with("site_plan.pdf"));
        assert_eq!(first.len(), PREFIX_BYTES * 2 + "site_plan.pdf".len());
        assert!(first[..PREFIX_BYTES * 2].chars().all(|c| c.is_ascii_hexdigit()));

        let on_disk = std::fs::read(dir.path().join(&first)).unwrap();
        assert_eq!(on_disk, b"one");
    }

    #[tokio::test]
    async fn test_save_rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let files = store(dir.path());

        let err = files.save("payload.exe", b"MZ").await.unwrap_err();
        assert!(matches!(err, StorageError::DisallowedExtension(_)));

        let err = files.save("", b"").await.unwrap_err();
        assert!(matches!(err, StorageError::MissingFile));

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let files = store(dir.path());
        let stored = files.save("notes.txt", b"hi").await.unwrap();

        assert!(files.resolve(&stored).await.is_some());
        assert!(files.resolve("../notes.txt").await.is_none());
        assert!(files.resolve("missing.txt").await.is_none());

        files.remove(&stored).await;
        assert!(files.resolve(&stored).await.is_none());
    }
}
