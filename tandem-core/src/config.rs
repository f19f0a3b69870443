use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Main configuration structure shared by the hub and viewer binaries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TandemConfig {
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Address the relay hub listens on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Directory for uploaded audio assets (defaults to the data directory)
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
    /// Playlist snapshot file (defaults to the data directory)
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    /// Largest accepted upload, in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
    /// Messages buffered per connection before broadcasts to it are skipped
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

const fn default_max_upload_mb() -> u64 {
    200
}

const fn default_outbox_capacity() -> usize {
    64
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            upload_dir: None,
            state_file: None,
            max_upload_mb: default_max_upload_mb(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

impl HubConfig {
    /// Parse the bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if `bind_addr` is not a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|e| CoreError::ConfigInvalid {
                message: format!("hub.bind_addr {:?}: {e}", self.bind_addr),
            })
    }

    #[must_use]
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(crate::paths::uploads_dir)
    }

    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(crate::paths::state_file_path)
    }

    /// Upload limit in bytes, saturating on overflow
    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Base HTTP URL of the relay hub
    #[serde(default = "default_hub_url")]
    pub hub_url: String,
    /// Whether this viewer sends transport actions
    #[serde(default)]
    pub controller: bool,
    /// Time corrections up to this many seconds are ignored
    #[serde(default = "default_dead_band")]
    pub dead_band_secs: f64,
    /// Controller heartbeat interval
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Fixed delay between reconnection attempts
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Simulated track length for the headless player
    #[serde(default)]
    pub track_length_secs: Option<f64>,
}

fn default_hub_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

const fn default_dead_band() -> f64 {
    0.5
}

const fn default_heartbeat_interval() -> u64 {
    1000
}

const fn default_reconnect_delay() -> u64 {
    1000
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            hub_url: default_hub_url(),
            controller: false,
            dead_band_secs: default_dead_band(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            reconnect_delay_ms: default_reconnect_delay(),
            track_length_secs: None,
        }
    }
}

impl ViewerConfig {
    /// Parse the hub base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `hub_url` is not an `http`/`https` URL.
    pub fn hub_url(&self) -> Result<Url> {
        let url = Url::parse(&self.hub_url).map_err(|e| CoreError::ConfigInvalid {
            message: format!("viewer.hub_url {:?}: {e}", self.hub_url),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::ConfigInvalid {
                message: format!("viewer.hub_url must use http or https, got {}", url.scheme()),
            });
        }
        Ok(url)
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a file in the cache directory
    #[serde(default)]
    pub enabled: bool,
}

impl TandemConfig {
    /// Get the configuration directory path (~/.config/tandem/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/tandem/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from file or create template on first run
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template on
    /// first run, or an error if the file cannot be read, parsed or validated.
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&config_path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        let content = fs::read_to_string(&config_path)?;
        Self::parse(&content)
    }

    /// Parse and validate config file content
    ///
    /// # Errors
    ///
    /// Returns an error on TOML syntax errors or invalid values.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check on its own
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        self.hub.socket_addr()?;
        self.viewer.hub_url()?;

        if !self.viewer.dead_band_secs.is_finite() || self.viewer.dead_band_secs < 0.0 {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "viewer.dead_band_secs must be a non-negative number, got {}",
                    self.viewer.dead_band_secs
                ),
            });
        }
        if self.viewer.heartbeat_interval_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "viewer.heartbeat_interval_ms must be greater than 0".to_string(),
            });
        }
        if self.hub.outbox_capacity == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "hub.outbox_capacity must be greater than 0".to_string(),
            });
        }
        if let Some(length) = self.viewer.track_length_secs
            && (!length.is_finite() || length <= 0.0)
        {
            return Err(CoreError::ConfigInvalid {
                message: format!("viewer.track_length_secs must be positive, got {length}"),
            });
        }
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = r#"# Tandem Configuration
# ~/.config/tandem/config.toml

[hub]
# Address the relay hub listens on
bind_addr = "0.0.0.0:3000"
# Defaults to the local data directory (~/.local/share/tandem on Linux)
# upload_dir = "/srv/tandem/uploads"
# state_file = "/srv/tandem/playlist.json"
max_upload_mb = 200
outbox_capacity = 64

[viewer]
hub_url = "http://127.0.0.1:3000"
# Only the controlling device should set this to true
controller = false
# Time corrections smaller than this are ignored
dead_band_secs = 0.5
heartbeat_interval_ms = 1000
reconnect_delay_ms = 1000
# Simulated track length for the headless player (enables auto-advance)
# track_length_secs = 180.0

[logging]
# Also write logs to ~/.cache/tandem/tandem.log
enabled = false
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config = TandemConfig::parse(CONFIG_TEMPLATE).unwrap();
        let defaults = TandemConfig::default();

        assert_eq!(config.hub.bind_addr, defaults.hub.bind_addr);
        assert_eq!(config.hub.max_upload_mb, defaults.hub.max_upload_mb);
        assert_eq!(config.viewer.hub_url, defaults.viewer.hub_url);
        assert!(!config.viewer.controller);
        assert!((config.viewer.dead_band_secs - 0.5).abs() < f64::EPSILON);
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = TandemConfig::parse("").unwrap();
        assert_eq!(config.hub.socket_addr().unwrap().port(), 3000);
        assert_eq!(config.viewer.heartbeat_interval(), Duration::from_secs(1));
        assert_eq!(config.viewer.reconnect_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_sections() {
        let config = TandemConfig::parse(
            r#"
            [viewer]
            controller = true
            hub_url = "https://music.local:8443"
            "#,
        )
        .unwrap();

        assert!(config.viewer.controller);
        assert_eq!(config.viewer.hub_url().unwrap().port(), Some(8443));
        assert_eq!(config.hub.outbox_capacity, 64);
    }

    #[test]
    fn test_invalid_bind_addr() {
        let result = TandemConfig::parse("[hub]\nbind_addr = \"not an address\"");
        assert!(matches!(result, Err(CoreError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_invalid_hub_url_scheme() {
        let result = TandemConfig::parse("[viewer]\nhub_url = \"ws://127.0.0.1:3000\"");
        assert!(matches!(result, Err(CoreError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_negative_dead_band() {
        let result = TandemConfig::parse("[viewer]\ndead_band_secs = -0.1");
        assert!(matches!(result, Err(CoreError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_syntax_error() {
        let result = TandemConfig::parse("[hub\nbind_addr = 1");
        assert!(matches!(result, Err(CoreError::ConfigParseError(_))));
    }

    #[test]
    fn test_explicit_paths() {
        let config = TandemConfig::parse(
            r#"
            [hub]
            upload_dir = "/tmp/tandem/uploads"
            state_file = "/tmp/tandem/state.json"
            max_upload_mb = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.hub.upload_dir(), PathBuf::from("/tmp/tandem/uploads"));
        assert_eq!(config.hub.state_file(), PathBuf::from("/tmp/tandem/state.json"));
        assert_eq!(config.hub.max_upload_bytes(), 1024 * 1024);
    }
}
