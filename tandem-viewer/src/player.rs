//! Local audio output driven by the viewer agent.

use std::time::Duration;
use tandem_core::duration_from_secs;
use tokio::time::Instant;
use url::Url;

/// A local output the agent can load, seek and start or stop.
///
/// Times are float seconds, matching the wire protocol.
pub trait AudioOutput: Send {
    /// Replace the loaded asset; the output starts paused at 0
    fn load(&mut self, source: Url);
    fn unload(&mut self);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, secs: f64);
    fn current_time(&self) -> f64;
    /// Whether audio is advancing right now. False once the track has ended.
    fn is_playing(&self) -> bool;
    fn loaded(&self) -> Option<&Url>;
    /// Whether the loaded track has played to its end
    fn has_ended(&self) -> bool;
}

/// Headless output that tracks its position against a monotonic clock.
///
/// Without a track length the position grows without bound and the track
/// never ends.
#[derive(Debug, Clone)]
pub struct ClockPlayer {
    source: Option<Url>,
    playing: bool,
    /// Position at `updated_at`
    position: Duration,
    updated_at: Instant,
    track_length: Option<Duration>,
}

impl ClockPlayer {
    #[must_use]
    pub fn new(track_length: Option<Duration>) -> Self {
        Self {
            source: None,
            playing: false,
            position: Duration::ZERO,
            updated_at: Instant::now(),
            track_length,
        }
    }

    /// Position interpolated from the time elapsed since the last anchor
    #[must_use]
    pub fn position(&self) -> Duration {
        let position = if self.playing {
            self.position + self.updated_at.elapsed()
        } else {
            self.position
        };
        self.clamp(position)
    }

    fn clamp(&self, position: Duration) -> Duration {
        match self.track_length {
            Some(length) => position.min(length),
            None => position,
        }
    }

    fn anchor(&mut self, position: Duration) {
        self.position = self.clamp(position);
        self.updated_at = Instant::now();
    }
}

impl Default for ClockPlayer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AudioOutput for ClockPlayer {
    fn load(&mut self, source: Url) {
        self.source = Some(source);
        self.playing = false;
        self.anchor(Duration::ZERO);
    }

    fn unload(&mut self) {
        self.source = None;
        self.playing = false;
        self.anchor(Duration::ZERO);
    }

    fn play(&mut self) {
        if self.source.is_none() {
            return;
        }
        // Playing an ended track starts it over
        let position = if self.has_ended() {
            Duration::ZERO
        } else {
            self.position()
        };
        self.anchor(position);
        self.playing = true;
    }

    fn pause(&mut self) {
        let position = self.position();
        self.anchor(position);
        self.playing = false;
    }

    fn seek(&mut self, secs: f64) {
        if self.source.is_none() {
            return;
        }
        self.anchor(duration_from_secs(secs));
    }

    fn current_time(&self) -> f64 {
        self.position().as_secs_f64()
    }

    fn is_playing(&self) -> bool {
        self.playing && !self.has_ended()
    }

    fn loaded(&self) -> Option<&Url> {
        self.source.as_ref()
    }

    fn has_ended(&self) -> bool {
        self.source.is_some()
            && self
                .track_length
                .is_some_and(|length| self.position() >= length)
    }
}
