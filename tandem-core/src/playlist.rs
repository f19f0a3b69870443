//! Shared playlist: ordered tracks plus the index of the current one.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// A playlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque storage key of the uploaded asset
    pub filename: String,
    /// Display title
    pub title: String,
}

impl Track {
    /// Create a new track
    #[must_use]
    pub fn new(filename: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            title: title.into(),
        }
    }
}

/// Result of removing a track from the playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// The track that was removed
    pub track: Track,
    /// Whether the removed track was the current one
    pub was_current: bool,
}

/// Ordered list of tracks with a current index.
///
/// `current_index` always points at an existing track while the playlist is
/// non-empty, and is `0` while it is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    tracks: Vec<Track>,
    current_index: usize,
}

impl Playlist {
    /// Create a playlist, clamping `current_index` into range
    #[must_use]
    pub fn new(tracks: Vec<Track>, current_index: usize) -> Self {
        let current_index = clamp_index(current_index, tracks.len());
        Self {
            tracks,
            current_index,
        }
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// Get the current track, if any
    #[must_use]
    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    /// Append a track; the current index is unchanged
    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Make the track at `index` current.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexOutOfRange`] if `index` does not name a track.
    pub fn select(&mut self, index: i64) -> Result<()> {
        self.current_index = self.checked_index(index)?;
        Ok(())
    }

    /// Remove the track at `index`.
    ///
    /// Removing a track before the current one keeps the same track current.
    /// Removing the current track lets the following one slide into its slot,
    /// clamped to the new last entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexOutOfRange`] if `index` does not name a track.
    pub fn remove(&mut self, index: i64) -> Result<Removal> {
        let index = self.checked_index(index)?;
        let track = self.tracks.remove(index);
        let was_current = index == self.current_index;

        if index < self.current_index {
            self.current_index -= 1;
        }
        self.current_index = clamp_index(self.current_index, self.tracks.len());

        Ok(Removal { track, was_current })
    }

    /// Index of the track after the current one, wrapping at the end
    #[must_use]
    pub const fn next_index(&self) -> Option<usize> {
        if self.tracks.is_empty() {
            None
        } else {
            Some((self.current_index + 1) % self.tracks.len())
        }
    }

    fn checked_index(&self, index: i64) -> Result<usize> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.tracks.len())
            .ok_or(CoreError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            })
    }
}

const fn clamp_index(index: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else if index >= len {
        len - 1
    } else {
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(n: usize) -> Playlist {
        let tracks = (0..n)
            .map(|i| Track::new(format!("{i}.mp3"), format!("Song {i}")))
            .collect();
        Playlist::new(tracks, 0)
    }

    fn filenames(playlist: &Playlist) -> Vec<&str> {
        playlist.tracks().iter().map(|t| t.filename.as_str()).collect()
    }

    #[test]
    fn test_new_clamps_index() {
        assert_eq!(Playlist::new(vec![], 5).current_index(), 0);
        let p = Playlist::new(vec![Track::new("a", "A"), Track::new("b", "B")], 7);
        assert_eq!(p.current_index(), 1);
    }

    #[test]
    fn test_push_keeps_current_index() {
        let mut p = playlist(2);
        p.select(1).unwrap();
        p.push(Track::new("new.mp3", "New"));
        assert_eq!(p.current_index(), 1);
        assert_eq!(p.tracks().last().unwrap().filename, "new.mp3");
    }

    #[test]
    fn test_select_rejects_out_of_range() {
        let mut p = playlist(3);
        assert!(matches!(
            p.select(3),
            Err(CoreError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert!(p.select(-1).is_err());
        assert_eq!(p.current_index(), 0);
    }

    #[test]
    fn test_select_on_empty_playlist() {
        let mut p = Playlist::default();
        assert!(p.select(0).is_err());
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut p = playlist(4);
        let removal = p.remove(1).unwrap();
        assert_eq!(removal.track.filename, "1.mp3");
        assert_eq!(filenames(&p), vec!["0.mp3", "2.mp3", "3.mp3"]);
    }

    #[test]
    fn test_remove_before_current_keeps_same_track() {
        let mut p = playlist(4);
        p.select(2).unwrap();
        let removal = p.remove(0).unwrap();
        assert!(!removal.was_current);
        assert_eq!(p.current_index(), 1);
        assert_eq!(p.current().unwrap().filename, "2.mp3");
    }

    #[test]
    fn test_remove_current_slides_next_in() {
        let mut p = playlist(3);
        p.select(1).unwrap();
        let removal = p.remove(1).unwrap();
        assert!(removal.was_current);
        assert_eq!(p.current_index(), 1);
        assert_eq!(p.current().unwrap().filename, "2.mp3");
    }

    #[test]
    fn test_remove_current_last_clamps() {
        let mut p = playlist(3);
        p.select(2).unwrap();
        p.remove(2).unwrap();
        assert_eq!(p.current_index(), 1);
        assert_eq!(p.current().unwrap().filename, "1.mp3");
    }

    #[test]
    fn test_remove_after_current_keeps_index() {
        let mut p = playlist(3);
        p.remove(2).unwrap();
        assert_eq!(p.current_index(), 0);
    }

    #[test]
    fn test_remove_last_remaining() {
        let mut p = playlist(1);
        p.remove(0).unwrap();
        assert!(p.is_empty());
        assert_eq!(p.current_index(), 0);
        assert!(p.current().is_none());
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut p = playlist(2);
        assert!(p.remove(2).is_err());
        assert!(p.remove(-3).is_err());
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_next_index_wraps() {
        let mut p = playlist(3);
        assert_eq!(p.next_index(), Some(1));
        p.select(2).unwrap();
        assert_eq!(p.next_index(), Some(0));
        assert_eq!(Playlist::default().next_index(), None);
    }
}
