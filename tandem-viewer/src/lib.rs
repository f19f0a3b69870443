pub mod agent;
pub mod commands;
pub mod endpoints;
pub mod error;
pub mod player;
pub mod session;
pub mod upload;

pub use agent::{UploadedAsset, ViewerAgent, needs_correction};
pub use commands::{HELP, ViewerCommand};
pub use error::ViewerError;
pub use player::{AudioOutput, ClockPlayer};
pub use session::{Session, SessionSettings};
pub use upload::UploadClient;
