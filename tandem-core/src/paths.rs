//! Path constants for configuration, persisted state and uploaded assets.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "tandem";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the persisted playlist snapshot
pub const STATE_FILE_NAME: &str = "playlist.json";

/// The name of the directory holding uploaded audio assets
pub const UPLOADS_DIR_NAME: &str = "uploads";

/// The name of the log file written when file logging is enabled
pub const LOG_FILE_NAME: &str = "tandem.log";

/// Get the configuration directory path (~/.config/tandem/)
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/tandem/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the data directory for hub state (`~/.local/share/tandem` on Linux)
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(config_dir)
        .join(CONFIG_DIR_NAME)
}

/// Get the default playlist snapshot path
#[must_use]
pub fn state_file_path() -> PathBuf {
    data_dir().join(STATE_FILE_NAME)
}

/// Get the default upload directory
#[must_use]
pub fn uploads_dir() -> PathBuf {
    data_dir().join(UPLOADS_DIR_NAME)
}

/// Get the log file path (`~/.cache/tandem/tandem.log` on Linux)
#[must_use]
pub fn log_file_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(config_dir)
        .join(CONFIG_DIR_NAME)
        .join(LOG_FILE_NAME)
}
