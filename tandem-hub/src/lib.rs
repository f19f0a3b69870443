pub mod assets;
pub mod error;
pub mod hub;
pub mod persist;
pub mod registry;
pub mod server;
pub mod upload;
pub mod ws;

pub use assets::AssetStore;
pub use error::HubError;
pub use hub::{Connection, Hub, HubCommand, HubHandle, HubSnapshot};
pub use persist::SnapshotWriter;
pub use registry::{ConnectionId, Registry};
pub use server::{
    bind, router, run, AppState, HubSettings, ASSETS_PATH, UPLOAD_PATH, WS_PATH,
};
pub use upload::{UploadResponse, UPLOAD_FIELD};
