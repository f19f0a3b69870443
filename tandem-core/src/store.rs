use crate::error::Result;
use crate::playback::PlaybackState;
use crate::playlist::{Playlist, Track};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::snapshot::PlaylistSnapshot;

/// Result of applying one inbound message
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Message to send to every connection
    pub broadcast: ServerMessage,
    /// Whether the playlist changed and a snapshot must be written
    pub playlist_changed: bool,
    /// Track removed by this mutation, whose asset should be deleted
    pub removed: Option<Track>,
}

impl Outcome {
    const fn transport(broadcast: ServerMessage) -> Self {
        Self {
            broadcast,
            playlist_changed: false,
            removed: None,
        }
    }
}

/// Authoritative playback state and playlist.
///
/// The store has a single owner; every mutation takes `&mut self`, so
/// mutations are applied strictly one at a time.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    playback: PlaybackState,
    playlist: Playlist,
}

impl StateStore {
    #[must_use]
    pub fn new(playlist: Playlist) -> Self {
        Self {
            playback: PlaybackState::default(),
            playlist,
        }
    }

    /// Restore a store from a persisted snapshot; transport state starts paused at 0
    #[must_use]
    pub fn from_snapshot(snapshot: PlaylistSnapshot) -> Self {
        Self::new(snapshot.into_playlist())
    }

    #[must_use]
    pub const fn playback(&self) -> PlaybackState {
        self.playback
    }

    #[must_use]
    pub const fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    #[must_use]
    pub fn snapshot(&self) -> PlaylistSnapshot {
        PlaylistSnapshot::from_playlist(&self.playlist)
    }

    /// Full-state message sent on connect and after most mutations
    #[must_use]
    pub fn sync_message(&self) -> ServerMessage {
        ServerMessage::SyncPlaylist {
            songs: self.playlist.tracks().to_vec(),
            current_index: self.playlist.current_index(),
            is_playing: self.playback.is_playing,
            current_time: self.playback.current_time,
        }
    }

    pub const fn set_playing(&mut self, is_playing: bool) {
        self.playback.set_playing(is_playing);
    }

    /// # Errors
    ///
    /// Returns an error for negative or non-finite times.
    pub fn set_current_time(&mut self, time: f64) -> Result<()> {
        self.playback.set_current_time(time)
    }

    pub fn add_track(&mut self, track: Track) {
        self.playlist.push(track);
    }

    /// Select a track and rewind to its start.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range; the store is unchanged.
    pub fn set_current_index(&mut self, index: i64) -> Result<()> {
        self.playlist.select(index)?;
        self.playback.current_time = 0.0;
        Ok(())
    }

    /// Remove a track, keeping `current_index` valid.
    ///
    /// Removing the current track rewinds to the start of whichever track takes
    /// its place. Removing the last track stops playback.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range; the store is unchanged.
    pub fn remove_track(&mut self, index: i64) -> Result<Track> {
        let removal = self.playlist.remove(index)?;
        if self.playlist.is_empty() {
            self.playback.stop();
        } else if removal.was_current {
            self.playback.current_time = 0.0;
        }
        Ok(removal.track)
    }

    /// Apply one inbound message.
    ///
    /// Returns `Ok(None)` for unrecognized message kinds.
    ///
    /// # Errors
    ///
    /// Returns an error if the message carries an invalid index or time. The
    /// store is unchanged in that case.
    pub fn apply(&mut self, message: &ClientMessage) -> Result<Option<Outcome>> {
        let outcome = match message {
            ClientMessage::Play => {
                self.set_playing(true);
                Outcome::transport(self.sync_message())
            }
            ClientMessage::Pause => {
                self.set_playing(false);
                Outcome::transport(self.sync_message())
            }
            ClientMessage::UpdateTime { time } => {
                self.set_current_time(*time)?;
                Outcome::transport(ServerMessage::SyncTime { time: *time })
            }
            ClientMessage::AddSong { filename, title } => {
                self.add_track(Track::new(filename.clone(), title.clone()));
                Outcome {
                    broadcast: self.sync_message(),
                    playlist_changed: true,
                    removed: None,
                }
            }
            ClientMessage::ChangeSong { index } => {
                self.set_current_index(*index)?;
                Outcome {
                    broadcast: self.sync_message(),
                    playlist_changed: true,
                    removed: None,
                }
            }
            ClientMessage::DeleteSong { index } => {
                let removed = self.remove_track(*index)?;
                Outcome {
                    broadcast: self.sync_message(),
                    playlist_changed: true,
                    removed: Some(removed),
                }
            }
            ClientMessage::Unknown => return Ok(None),
        };
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn store_with(n: usize) -> StateStore {
        let mut store = StateStore::default();
        for i in 0..n {
            store.add_track(Track::new(format!("{i}.mp3"), format!("Song {i}")));
        }
        store
    }

    fn apply(store: &mut StateStore, message: ClientMessage) -> Outcome {
        store.apply(&message).unwrap().unwrap()
    }

    fn broadcast_is_playing(outcome: &Outcome) -> Option<bool> {
        match outcome.broadcast {
            ServerMessage::SyncPlaylist { is_playing, .. } => Some(is_playing),
            _ => None,
        }
    }

    #[test]
    fn test_last_play_or_pause_wins() {
        let sequence = [
            ClientMessage::Play,
            ClientMessage::Pause,
            ClientMessage::Pause,
            ClientMessage::Play,
            ClientMessage::Play,
            ClientMessage::Pause,
        ];
        let mut store = StateStore::default();

        for message in sequence {
            let expected = message == ClientMessage::Play;
            let outcome = apply(&mut store, message);
            assert_eq!(broadcast_is_playing(&outcome), Some(expected));
            assert_eq!(store.playback().is_playing, expected);
            assert!(!outcome.playlist_changed);
        }
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut store = store_with(1);
        let first = apply(&mut store, ClientMessage::Pause);
        let second = apply(&mut store, ClientMessage::Pause);
        assert_eq!(first, second);
        assert!(!store.playback().is_playing);
    }

    #[test]
    fn test_update_time_rebroadcasts_verbatim() {
        let mut store = StateStore::default();
        store.set_playing(true);
        let outcome = apply(&mut store, ClientMessage::UpdateTime { time: 42.3 });

        assert_eq!(outcome.broadcast, ServerMessage::SyncTime { time: 42.3 });
        assert!(!outcome.playlist_changed);
        assert!(store.playback().is_playing);
        assert!((store.playback().current_time - 42.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_time_rejects_negative() {
        let mut store = StateStore::default();
        assert!(matches!(
            store.apply(&ClientMessage::UpdateTime { time: -2.0 }),
            Err(CoreError::InvalidTime { .. })
        ));
    }

    #[test]
    fn test_add_song_to_empty_playlist() {
        let mut store = StateStore::default();
        let outcome = apply(
            &mut store,
            ClientMessage::AddSong {
                filename: "1700-song1.mp3".into(),
                title: "song1.mp3".into(),
            },
        );

        assert!(outcome.playlist_changed);
        assert_eq!(
            outcome.broadcast,
            ServerMessage::SyncPlaylist {
                songs: vec![Track::new("1700-song1.mp3", "song1.mp3")],
                current_index: 0,
                is_playing: false,
                current_time: 0.0,
            }
        );
        assert_eq!(store.snapshot().playlist.len(), 1);
    }

    #[test]
    fn test_add_song_appends_and_keeps_index() {
        let mut store = store_with(2);
        store.set_current_index(1).unwrap();
        apply(
            &mut store,
            ClientMessage::AddSong {
                filename: "f".into(),
                title: "t".into(),
            },
        );

        assert_eq!(store.playlist().len(), 3);
        assert_eq!(store.playlist().tracks()[2], Track::new("f", "t"));
        assert_eq!(store.playlist().current_index(), 1);
    }

    #[test]
    fn test_change_song_rewinds() {
        let mut store = store_with(3);
        store.set_playing(true);
        store.set_current_time(80.0).unwrap();

        let outcome = apply(&mut store, ClientMessage::ChangeSong { index: 2 });

        assert!(outcome.playlist_changed);
        assert_eq!(store.playlist().current_index(), 2);
        assert!(store.playback().is_playing);
        assert!(store.playback().current_time.abs() < f64::EPSILON);
    }

    #[test]
    fn test_change_song_out_of_range_leaves_store_unchanged() {
        let mut store = store_with(2);
        store.set_current_time(10.0).unwrap();

        assert!(store.apply(&ClientMessage::ChangeSong { index: 2 }).is_err());
        assert!(store.apply(&ClientMessage::ChangeSong { index: -1 }).is_err());
        assert_eq!(store.playlist().current_index(), 0);
        assert!((store.playback().current_time - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_delete_song_removes_entry_in_order() {
        let mut store = store_with(4);
        let outcome = apply(&mut store, ClientMessage::DeleteSong { index: 2 });

        assert_eq!(outcome.removed, Some(Track::new("2.mp3", "Song 2")));
        assert!(outcome.playlist_changed);
        let remaining: Vec<_> = store
            .playlist()
            .tracks()
            .iter()
            .map(|t| t.filename.as_str())
            .collect();
        assert_eq!(remaining, vec!["0.mp3", "1.mp3", "3.mp3"]);
    }

    #[test]
    fn test_delete_current_song_rewinds() {
        let mut store = store_with(3);
        store.set_current_index(1).unwrap();
        store.set_playing(true);
        store.set_current_time(30.0).unwrap();

        apply(&mut store, ClientMessage::DeleteSong { index: 1 });

        assert_eq!(store.playlist().current().unwrap().filename, "2.mp3");
        assert!(store.playback().is_playing);
        assert!(store.playback().current_time.abs() < f64::EPSILON);
    }

    #[test]
    fn test_delete_other_song_keeps_position() {
        let mut store = store_with(3);
        store.set_current_index(2).unwrap();
        store.set_current_time(30.0).unwrap();

        apply(&mut store, ClientMessage::DeleteSong { index: 0 });

        assert_eq!(store.playlist().current().unwrap().filename, "2.mp3");
        assert!((store.playback().current_time - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_delete_last_song_stops_playback() {
        let mut store = store_with(1);
        store.set_playing(true);
        store.set_current_time(12.0).unwrap();

        let outcome = apply(&mut store, ClientMessage::DeleteSong { index: 0 });

        assert_eq!(
            outcome.broadcast,
            ServerMessage::SyncPlaylist {
                songs: vec![],
                current_index: 0,
                is_playing: false,
                current_time: 0.0,
            }
        );
    }

    #[test]
    fn test_delete_out_of_range() {
        let mut store = store_with(1);
        assert!(store.apply(&ClientMessage::DeleteSong { index: 1 }).is_err());
        assert_eq!(store.playlist().len(), 1);
    }

    #[test]
    fn test_unknown_message_is_ignored() {
        let mut store = store_with(1);
        assert_eq!(store.apply(&ClientMessage::Unknown).unwrap(), None);
    }

    #[test]
    fn test_from_snapshot_starts_paused() {
        let snapshot = PlaylistSnapshot {
            playlist: vec![Track::new("a", "A"), Track::new("b", "B")],
            current_index: 1,
        };
        let store = StateStore::from_snapshot(snapshot.clone());

        assert_eq!(store.snapshot(), snapshot);
        assert_eq!(store.playback(), PlaybackState::default());
    }
}
