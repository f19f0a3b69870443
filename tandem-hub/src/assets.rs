//! Uploaded audio asset storage.

use crate::error::{HubError, Result};
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

const FALLBACK_NAME: &str = "upload";

/// Flat directory of uploaded audio files.
///
/// Asset names are single path components; names that could resolve outside
/// the root are rejected.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Open the store, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        info!("Serving uploaded assets from {:?}", root);
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage key for a new upload: `<unix-millis>-<sanitized name>`
    #[must_use]
    pub fn storage_name(original: &str) -> String {
        format!("{}-{}", Utc::now().timestamp_millis(), sanitize(original))
    }

    /// Path of an asset inside the store.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidAssetName`] if `name` is not a plain file name.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name => Ok(self.root.join(part)),
            _ => Err(HubError::InvalidAssetName {
                name: name.to_string(),
            }),
        }
    }

    /// Create a new, empty asset. An existing file of the same name is never
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, already taken, or the file
    /// cannot be created.
    pub async fn create(&self, name: &str) -> Result<(PathBuf, tokio::fs::File)> {
        let path = self.resolve(name)?;
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        Ok((path, file))
    }

    /// Delete an asset.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the file cannot be removed.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path).await?;
        debug!("Deleted asset {:?}", path);
        Ok(())
    }
}

/// Reduce a client-supplied file name to a safe single component.
fn sanitize(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');

    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("song1.mp3"), "song1.mp3");
        assert_eq!(sanitize("My Song (live).mp3"), "My Song _live_.mp3");
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize("C:\\music\\track.flac"), "track.flac");
        assert_eq!(sanitize(".hidden"), "hidden");
        assert_eq!(sanitize(""), "upload");
        assert_eq!(sanitize(".."), "upload");
    }

    #[test]
    fn test_storage_name_has_timestamp_prefix() {
        let name = AssetStore::storage_name("song1.mp3");
        let (prefix, rest) = name.split_once('-').unwrap();
        assert!(prefix.parse::<i64>().is_ok());
        assert_eq!(rest, "song1.mp3");
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(dir.path().to_path_buf()).await.unwrap();

        assert!(store.resolve("1700-song1.mp3").is_ok());
        for name in ["", ".", "..", "../x", "a/b", "/etc/passwd"] {
            assert!(
                matches!(store.resolve(name), Err(HubError::InvalidAssetName { .. })),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(dir.path().join("uploads")).await.unwrap();
        let path = store.resolve("1700-a.mp3").unwrap();
        tokio::fs::write(&path, b"audio").await.unwrap();

        store.remove("1700-a.mp3").await.unwrap();
        assert!(!path.exists());

        assert!(matches!(store.remove("1700-a.mp3").await, Err(HubError::Io(_))));
    }

    #[tokio::test]
    async fn test_create_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(dir.path().join("uploads")).await.unwrap();

        let (path, _) = store.create("1700-a.mp3").await.unwrap();
        tokio::fs::write(&path, b"first upload").await.unwrap();

        assert!(matches!(
            store.create("1700-a.mp3").await,
            Err(HubError::Io(ref e)) if e.kind() == std::io::ErrorKind::AlreadyExists
        ));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"first upload");
    }
}
