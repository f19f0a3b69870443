//! Sequential snapshot writer.
//!
//! A single task owns the snapshot file and performs writes in the order they
//! were requested. Each request carries an acknowledgement channel so the hub
//! broadcasts a playlist mutation only after it is on disk.

use crate::error::{HubError, Result};
use std::path::{Path, PathBuf};
use tandem_core::PlaylistSnapshot;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const WRITE_QUEUE_CAPACITY: usize = 16;

struct WriteRequest {
    snapshot: PlaylistSnapshot,
    done: oneshot::Sender<tandem_core::error::Result<()>>,
}

/// Handle to the snapshot writer task
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    tx: mpsc::Sender<WriteRequest>,
    path: PathBuf,
}

impl std::fmt::Debug for WriteRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteRequest")
            .field("tracks", &self.snapshot.playlist.len())
            .finish_non_exhaustive()
    }
}

impl SnapshotWriter {
    /// Spawn the writer task for `path`.
    ///
    /// The task exits once every handle has been dropped.
    #[must_use]
    pub fn spawn(path: PathBuf) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let handle = tokio::spawn(run(path.clone(), rx));
        (Self { tx, path }, handle)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a snapshot and wait until it has been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or the writer task has stopped.
    pub async fn persist(&self, snapshot: PlaylistSnapshot) -> Result<()> {
        let (done, ack) = oneshot::channel();
        self.tx
            .send(WriteRequest { snapshot, done })
            .await
            .map_err(|_| HubError::WriterClosed)?;
        ack.await.map_err(|_| HubError::WriterClosed)??;
        Ok(())
    }
}

async fn run(path: PathBuf, mut rx: mpsc::Receiver<WriteRequest>) {
    info!("Snapshot writer started for {:?}", path);

    while let Some(request) = rx.recv().await {
        debug!("Writing snapshot: {:?}", request);
        let result = request.snapshot.write(&path).await;
        let _ = request.done.send(result);
    }

    info!("Snapshot writer stopped");
}
