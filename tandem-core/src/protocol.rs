//! JSON wire protocol between viewers and the hub.
//!
//! Every frame is a JSON object whose `type` field selects the message shape.
//! Unrecognized `type` values decode to the `Unknown` variant so callers can
//! ignore them, while a recognized type with missing or mistyped fields is a
//! decode error.

use crate::playlist::Track;
use serde::{Deserialize, Serialize};

/// Messages sent by a viewer to the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Play,
    Pause,
    /// Controller heartbeat or seek
    UpdateTime { time: f64 },
    /// Announce a finished upload
    AddSong { filename: String, title: String },
    /// Select a playlist entry
    ChangeSong { index: i64 },
    /// Remove a playlist entry and its asset
    DeleteSong { index: i64 },
    #[serde(other)]
    Unknown,
}

/// Messages sent by the hub to viewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Legacy full sync without the playlist
    #[serde(rename_all = "camelCase")]
    SyncState { is_playing: bool, current_time: f64 },
    /// Full sync including the playlist
    #[serde(rename_all = "camelCase")]
    SyncPlaylist {
        songs: Vec<Track>,
        current_index: usize,
        is_playing: bool,
        current_time: f64,
    },
    Play,
    Pause,
    /// Coarse time correction
    SyncTime { time: f64 },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Wire name of this message kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::UpdateTime { .. } => "updateTime",
            Self::AddSong { .. } => "addSong",
            Self::ChangeSong { .. } => "changeSong",
            Self::DeleteSong { .. } => "deleteSong",
            Self::Unknown => "unknown",
        }
    }
}

impl ServerMessage {
    /// Wire name of this message kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SyncState { .. } => "syncState",
            Self::SyncPlaylist { .. } => "syncPlaylist",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::SyncTime { .. } => "syncTime",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the message replaces everything a viewer knows, so a newer one
    /// supersedes any older one still waiting to be delivered
    #[must_use]
    pub const fn carries_full_state(&self) -> bool {
        matches!(self, Self::SyncPlaylist { .. } | Self::SyncState { .. })
    }
}
