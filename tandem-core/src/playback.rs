use crate::error::{CoreError, Result};

/// Transport state shared by every viewer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackState {
    /// Whether the shared track is currently playing
    pub is_playing: bool,
    /// Last reported position within the current track, in seconds
    pub current_time: f64,
}

impl PlaybackState {
    /// Create a new playback state
    #[must_use]
    pub const fn new(is_playing: bool, current_time: f64) -> Self {
        Self {
            is_playing,
            current_time,
        }
    }

    /// Set the playing flag; the position is untouched
    pub const fn set_playing(&mut self, is_playing: bool) {
        self.is_playing = is_playing;
    }

    /// Set the position; the playing flag is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTime`] for negative or non-finite times.
    pub fn set_current_time(&mut self, time: f64) -> Result<()> {
        if !time.is_finite() || time < 0.0 {
            return Err(CoreError::InvalidTime { time });
        }
        self.current_time = time;
        Ok(())
    }

    /// Return to the paused start position
    pub const fn stop(&mut self) {
        self.is_playing = false;
        self.current_time = 0.0;
    }
}
