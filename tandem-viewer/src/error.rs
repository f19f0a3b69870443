use tandem_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload rejected with status {status}: {message}")]
    UploadRejected { status: u16, message: String },

    #[error("Invalid hub URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for ViewerError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
