//! HTTP surface of the hub: WebSocket, upload and static asset routes.

use crate::assets::AssetStore;
use crate::error::{HubError, Result};
use crate::hub::{Hub, HubHandle};
use crate::persist::SnapshotWriter;
use crate::upload::upload_handler;
use crate::ws::ws_handler;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::path::PathBuf;
use tandem_core::{HubConfig, PlaylistSnapshot, StateStore};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::info;

/// Path of the WebSocket endpoint
pub const WS_PATH: &str = "/ws";
/// Path of the upload endpoint
pub const UPLOAD_PATH: &str = "/upload";
/// Prefix under which uploaded assets are served
pub const ASSETS_PATH: &str = "/uploads";

/// Resolved hub settings
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub upload_dir: PathBuf,
    pub state_file: PathBuf,
    pub max_upload_bytes: usize,
    pub outbox_capacity: usize,
}

impl HubSettings {
    #[must_use]
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            upload_dir: config.upload_dir(),
            state_file: config.state_file(),
            max_upload_bytes: config.max_upload_bytes(),
            outbox_capacity: config.outbox_capacity,
        }
    }
}

/// Shared state for route handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub assets: AssetStore,
    pub cancel_token: CancellationToken,
}

/// Build the router
#[must_use]
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let assets = ServeDir::new(state.assets.root());

    Router::new()
        .route(WS_PATH, get(ws_handler))
        .route(
            UPLOAD_PATH,
            post(upload_handler).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .nest_service(ASSETS_PATH, assets)
        .with_state(state)
}

/// Bind the listening socket.
///
/// # Errors
///
/// Returns [`HubError::Bind`] if the address is invalid or already in use.
pub async fn bind(config: &HubConfig) -> Result<TcpListener> {
    let addr = config.socket_addr()?;
    TcpListener::bind(addr).await.map_err(|source| HubError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Restore state, start the hub task and serve until `cancel_token` fires.
///
/// # Errors
///
/// Returns an error if the upload directory cannot be created or the server
/// fails.
pub async fn run(
    listener: TcpListener,
    settings: HubSettings,
    cancel_token: CancellationToken,
) -> Result<()> {
    let assets = AssetStore::open(settings.upload_dir.clone()).await?;
    let snapshot = PlaylistSnapshot::load_or_default(&settings.state_file).await;
    let store = StateStore::from_snapshot(snapshot);

    let (writer, writer_task) = SnapshotWriter::spawn(settings.state_file.clone());
    let (hub, hub_task) = Hub::new(store, writer, assets.clone())
        .spawn(settings.outbox_capacity, cancel_token.clone());

    let state = AppState {
        hub,
        assets,
        cancel_token: cancel_token.clone(),
    };
    let app = router(state, settings.max_upload_bytes);

    info!("Relay hub listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await?;

    // The hub task owns the last writer handle; once it exits the writer drains
    let _ = hub_task.await;
    let _ = writer_task.await;
    info!("Relay hub stopped");
    Ok(())
}
