//! `POST /upload`: store one audio file and return its storage key.
//!
//! Uploading does not touch the playlist; the client announces the stored
//! file with an `addSong` message afterwards.

use crate::assets::AssetStore;
use crate::error::HubError;
use crate::server::AppState;
use axum::Json;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Multipart field carrying the audio file
pub const UPLOAD_FIELD: &str = "song";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Hub(#[from] HubError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingFile => StatusCode::BAD_REQUEST,
            Self::Multipart(e) => e.status(),
            Self::Storage(_) | Self::Hub(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Upload failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original = field.file_name().unwrap_or_default().to_string();
        let filename = AssetStore::storage_name(&original);
        let (path, file) = state.assets.create(&filename).await?;

        if let Err(e) = write_field(field, file).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        info!("Stored upload {:?} as {}", original, filename);
        return Ok(Json(UploadResponse { filename }));
    }

    Err(UploadError::MissingFile)
}

async fn write_field(mut field: Field<'_>, mut file: File) -> Result<(), UploadError> {
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}
