//! URLs derived from the configured hub base URL.

use crate::error::Result;
use tandem_core::CoreError;
use url::Url;

const WS_PATH: &str = "ws";
const UPLOAD_PATH: &str = "upload";
const ASSETS_PATH: &str = "uploads/";

/// WebSocket endpoint: same host, `ws`/`wss` scheme, path `/ws`.
///
/// # Errors
///
/// Returns an error if the base URL cannot be joined or is not `http`/`https`.
pub fn websocket_url(hub: &Url) -> Result<Url> {
    let mut url = hub.join(WS_PATH)?;
    let scheme = if hub.scheme() == "https" { "wss" } else { "ws" };
    if url.set_scheme(scheme).is_err() {
        return Err(CoreError::ConfigInvalid {
            message: format!("cannot derive a WebSocket URL from {hub}"),
        }
        .into());
    }
    Ok(url)
}

/// Upload endpoint
///
/// # Errors
///
/// Returns an error if the base URL cannot be joined.
pub fn upload_url(hub: &Url) -> Result<Url> {
    Ok(hub.join(UPLOAD_PATH)?)
}

/// Static URL of a stored asset
///
/// # Errors
///
/// Returns an error if the base URL cannot be joined.
pub fn asset_url(hub: &Url, filename: &str) -> Result<Url> {
    Ok(hub.join(&format!("{ASSETS_PATH}{}", urlencoding::encode(filename)))?)
}
