//! Durable playlist snapshot: `{"playlist": [...], "currentIndex": n}`.
//!
//! The file is rewritten wholesale through a temporary sibling and an atomic
//! rename, so readers never observe a partially written snapshot.

use crate::error::Result;
use crate::playlist::{Playlist, Track};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persisted form of the playlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSnapshot {
    pub playlist: Vec<Track>,
    pub current_index: usize,
}

impl PlaylistSnapshot {
    #[must_use]
    pub fn from_playlist(playlist: &Playlist) -> Self {
        Self {
            playlist: playlist.tracks().to_vec(),
            current_index: playlist.current_index(),
        }
    }

    #[must_use]
    pub fn into_playlist(self) -> Playlist {
        Playlist::new(self.playlist, self.current_index)
    }

    /// Read a snapshot, returning `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not contain a
    /// valid snapshot.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Read a snapshot, falling back to an empty playlist when the file is
    /// missing or unreadable.
    pub async fn load_or_default(path: &Path) -> Self {
        match Self::load(path).await {
            Ok(Some(snapshot)) => {
                info!(
                    "Loaded playlist snapshot from {:?} ({} track(s))",
                    path,
                    snapshot.playlist.len()
                );
                snapshot
            }
            Ok(None) => {
                info!("No playlist snapshot at {:?}, starting empty", path);
                Self::default()
            }
            Err(e) => {
                warn!("Ignoring unreadable playlist snapshot {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Write the snapshot atomically, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let tmp_path = temp_path(path);
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        debug!(
            "Wrote playlist snapshot to {:?} ({} track(s))",
            path,
            self.playlist.len()
        );
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("snapshot"), ToOwned::to_owned);
    name.push(".tmp");
    path.with_file_name(name)
}
