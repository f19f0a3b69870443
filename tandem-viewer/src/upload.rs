use crate::agent::UploadedAsset;
use crate::endpoints::upload_url;
use crate::error::{Result, ViewerError};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

const UPLOAD_FIELD: &str = "song";

const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    filename: String,
}

/// Client for the hub's upload endpoint
#[derive(Debug, Clone)]
pub struct UploadClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl UploadClient {
    /// Create an upload client for the hub at `hub_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(hub_url: &Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            endpoint: upload_url(hub_url)?,
        })
    }

    /// Upload one file. The title of the returned asset is the original file
    /// name.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the request fails, or the
    /// hub rejects the upload.
    pub async fn upload(&self, path: &Path) -> Result<UploadedAsset> {
        let title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ViewerError::InvalidCommand(format!("{} is not a file", path.display()))
            })?;
        let bytes = tokio::fs::read(path).await?;
        info!("Uploading {} ({} bytes)", title, bytes.len());

        let form = Form::new().part(UPLOAD_FIELD, Part::bytes(bytes).file_name(title.clone()));
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ViewerError::UploadRejected {
                status: status.as_u16(),
                message,
            });
        }

        let stored: UploadResponse = response.json().await?;
        info!("Uploaded {} as {}", title, stored.filename);
        Ok(UploadedAsset {
            filename: stored.filename,
            title,
        })
    }
}
