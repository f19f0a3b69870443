//! Viewer agent: follows hub broadcasts and turns local actions into messages.
//!
//! The agent keeps a local belief of the shared state that only hub
//! broadcasts change. Local control actions never mutate the belief; a
//! controller turns them into [`ClientMessage`]s and waits for the hub to echo
//! the resulting state back.

use crate::endpoints::asset_url;
use crate::player::AudioOutput;
use std::fmt::Write;
use tandem_core::{ClientMessage, PlaybackState, Playlist, ServerMessage, format_clock};
use tracing::{debug, info, warn};
use url::Url;

const LOG_TARGET: &str = "tandem::viewer::agent";

/// Whether a time correction to `target` is large enough to act on.
///
/// Drift of exactly `dead_band` is tolerated.
#[must_use]
pub fn needs_correction(local: f64, target: f64, dead_band: f64) -> bool {
    (target - local).abs() > dead_band
}

/// A stored upload ready to be announced with `addSong`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub filename: String,
    pub title: String,
}

pub struct ViewerAgent<P> {
    player: P,
    hub_url: Url,
    controller: bool,
    dead_band: f64,
    playback: PlaybackState,
    playlist: Playlist,
    /// Index and filename of the track whose end already triggered an advance
    ended_track: Option<(usize, String)>,
}

impl<P: AudioOutput> ViewerAgent<P> {
    #[must_use]
    pub fn new(player: P, hub_url: Url, controller: bool, dead_band: f64) -> Self {
        Self {
            player,
            hub_url,
            controller,
            dead_band,
            playback: PlaybackState::default(),
            playlist: Playlist::default(),
            ended_track: None,
        }
    }

    #[must_use]
    pub const fn is_controller(&self) -> bool {
        self.controller
    }

    #[must_use]
    pub const fn player(&self) -> &P {
        &self.player
    }

    #[must_use]
    pub const fn playback(&self) -> PlaybackState {
        self.playback
    }

    #[must_use]
    pub const fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Apply one broadcast from the hub
    pub fn apply(&mut self, message: ServerMessage) {
        debug!(target: LOG_TARGET, "Applying {}", message.kind());
        match message {
            ServerMessage::SyncPlaylist {
                songs,
                current_index,
                is_playing,
                current_time,
            } => {
                self.playlist = Playlist::new(songs, current_index);
                if !self.same_track_still_ended(current_time) {
                    self.ended_track = None;
                }
                self.load_current();
                self.apply_state(is_playing, current_time);
            }
            ServerMessage::SyncState {
                is_playing,
                current_time,
            } => {
                self.apply_state(is_playing, current_time);
            }
            ServerMessage::Play => {
                self.playback.set_playing(true);
                self.player.play();
            }
            ServerMessage::Pause => {
                self.playback.set_playing(false);
                self.player.pause();
            }
            ServerMessage::SyncTime { time } => {
                self.playback.current_time = time;
                let local = self.player.current_time();
                if needs_correction(local, time, self.dead_band) {
                    debug!(
                        target: LOG_TARGET,
                        "Drift {:.3}s exceeds dead-band, seeking to {:.3}",
                        time - local,
                        time
                    );
                    self.player.seek(time);
                }
            }
            ServerMessage::Unknown => {
                debug!(target: LOG_TARGET, "Ignoring unknown broadcast");
            }
        }
    }

    fn apply_state(&mut self, is_playing: bool, current_time: f64) {
        self.playback = PlaybackState::new(is_playing, current_time);
        self.player.seek(current_time);
        if is_playing {
            self.player.play();
        } else if self.player.is_playing() {
            self.player.pause();
        }
    }

    /// Make the local output match the believed current track
    fn load_current(&mut self) {
        let Some(track) = self.playlist.current() else {
            if self.player.loaded().is_some() {
                info!(target: LOG_TARGET, "Playlist is empty, unloading");
                self.player.unload();
            }
            return;
        };

        let url = match asset_url(&self.hub_url, &track.filename) {
            Ok(url) => url,
            Err(e) => {
                warn!(target: LOG_TARGET, "No asset URL for {:?}: {}", track.filename, e);
                self.player.unload();
                return;
            }
        };

        if self.player.loaded() != Some(&url) {
            info!(target: LOG_TARGET, "Now playing: {}", track.title);
            self.player.load(url);
        }
    }

    fn controller_only(&self, action: &str) -> bool {
        if !self.controller {
            warn!(target: LOG_TARGET, "Ignoring {}: this viewer is not the controller", action);
        }
        self.controller
    }

    #[must_use]
    pub fn request_play(&self) -> Option<ClientMessage> {
        self.controller_only("play").then_some(ClientMessage::Play)
    }

    #[must_use]
    pub fn request_pause(&self) -> Option<ClientMessage> {
        self.controller_only("pause").then_some(ClientMessage::Pause)
    }

    /// Seek locally and report the new position
    pub fn request_seek(&mut self, secs: f64) -> Option<ClientMessage> {
        if !self.controller_only("seek") {
            return None;
        }
        if !secs.is_finite() || secs < 0.0 {
            warn!(target: LOG_TARGET, "Ignoring seek to {}", secs);
            return None;
        }
        self.player.seek(secs);
        Some(ClientMessage::UpdateTime { time: secs })
    }

    /// Select a playlist entry
    #[must_use]
    pub fn request_pick(&self, index: i64) -> Option<ClientMessage> {
        if !self.controller_only("pick") {
            return None;
        }
        if !self.index_exists(index) {
            warn!(
                target: LOG_TARGET,
                "No playlist entry {} ({} tracks)",
                index,
                self.playlist.len()
            );
            return None;
        }
        Some(ClientMessage::ChangeSong { index })
    }

    /// Select the entry after the current one, wrapping at the end
    #[must_use]
    pub fn request_next(&self) -> Option<ClientMessage> {
        if !self.controller_only("next") {
            return None;
        }
        Self::change_song(self.playlist.next_index())
    }

    #[must_use]
    pub fn request_delete(&self, index: i64) -> Option<ClientMessage> {
        if !self.controller_only("delete") {
            return None;
        }
        if !self.index_exists(index) {
            warn!(
                target: LOG_TARGET,
                "No playlist entry {} ({} tracks)",
                index,
                self.playlist.len()
            );
            return None;
        }
        Some(ClientMessage::DeleteSong { index })
    }

    /// Announce a finished upload
    #[must_use]
    pub fn announce(&self, asset: UploadedAsset) -> Option<ClientMessage> {
        self.controller_only("upload").then(|| ClientMessage::AddSong {
            filename: asset.filename,
            title: asset.title,
        })
    }

    /// Periodic heartbeat while the controller's output is playing
    #[must_use]
    pub fn heartbeat(&self) -> Option<ClientMessage> {
        (self.controller && self.player.is_playing()).then(|| ClientMessage::UpdateTime {
            time: self.player.current_time(),
        })
    }

    /// Request the next track once the current one has ended.
    ///
    /// Fires once per track; the next `syncPlaylist` re-arms it.
    pub fn check_ended(&mut self) -> Option<ClientMessage> {
        if !self.controller || self.ended_track.is_some() || !self.player.has_ended() {
            return None;
        }
        self.ended_track = self.current_identity();
        info!(target: LOG_TARGET, "Track ended, advancing");
        Self::change_song(self.playlist.next_index())
    }

    fn current_identity(&self) -> Option<(usize, String)> {
        let track = self.playlist.current()?;
        Some((self.playlist.current_index(), track.filename.clone()))
    }

    /// A sync keeps the advance armed only while it still points at the ended
    /// track and has not been rewound to the start.
    fn same_track_still_ended(&self, current_time: f64) -> bool {
        let Some((index, filename)) = &self.ended_track else {
            return false;
        };
        current_time > 0.0
            && self.playlist.current_index() == *index
            && self
                .playlist
                .current()
                .is_some_and(|track| track.filename == *filename)
    }

    fn change_song(index: Option<usize>) -> Option<ClientMessage> {
        let index = i64::try_from(index?).ok()?;
        Some(ClientMessage::ChangeSong { index })
    }

    fn index_exists(&self, index: i64) -> bool {
        usize::try_from(index).is_ok_and(|i| i < self.playlist.len())
    }

    /// One-line transport summary
    #[must_use]
    pub fn status_line(&self) -> String {
        let state = if self.player.is_playing() {
            "playing"
        } else {
            "paused"
        };
        let title = self
            .playlist
            .current()
            .map_or("nothing loaded", |track| track.title.as_str());
        format!(
            "{state} {} {title}",
            format_clock(self.player.current_time())
        )
    }

    /// Numbered playlist with the current entry marked
    #[must_use]
    pub fn playlist_listing(&self) -> String {
        if self.playlist.is_empty() {
            return "Playlist is empty".to_string();
        }
        let mut listing = String::new();
        for (i, track) in self.playlist.tracks().iter().enumerate() {
            let marker = if i == self.playlist.current_index() {
                '>'
            } else {
                ' '
            };
            let _ = writeln!(listing, "{marker} {i:>2}. {}", track.title);
        }
        listing
    }
}
