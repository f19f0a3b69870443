pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod playback;
pub mod playlist;
pub mod protocol;
pub mod snapshot;
pub mod store;
pub mod time;

pub use config::{HubConfig, LoggingConfig, TandemConfig, ViewerConfig};
pub use error::CoreError;
pub use paths::{config_dir, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, STATE_FILE_NAME};
pub use playback::PlaybackState;
pub use playlist::{Playlist, Removal, Track};
pub use protocol::{ClientMessage, ServerMessage};
pub use snapshot::PlaylistSnapshot;
pub use store::{Outcome, StateStore};
pub use time::{duration_from_secs, format_clock};
