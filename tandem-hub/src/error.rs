use tandem_core::CoreError;
use thiserror::Error;

/// Errors raised by the relay hub.
#[derive(Debug, Error)]
pub enum HubError {
    /// The hub actor has stopped and no longer accepts commands.
    #[error("Relay hub is not running")]
    HubClosed,

    /// The snapshot writer task has stopped.
    #[error("Snapshot writer is not running")]
    WriterClosed,

    /// A client-supplied asset name could escape the upload directory.
    #[error("Invalid asset name: {name:?}")]
    InvalidAssetName { name: String },

    /// Failed to bind the listening socket.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results with `HubError`.
pub type Result<T> = std::result::Result<T, HubError>;
