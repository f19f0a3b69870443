//! Relay hub actor.
//!
//! One task owns the [`StateStore`] and the connection [`Registry`]. Connection
//! tasks reach it only through [`HubHandle`], so inbound messages are applied
//! and broadcast strictly in arrival order.

use crate::assets::AssetStore;
use crate::error::{HubError, Result};
use crate::persist::SnapshotWriter;
use crate::registry::{ConnectionId, Delivery, Registry};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tandem_core::{ClientMessage, PlaybackState, PlaylistSnapshot, ServerMessage, StateStore};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMMAND_QUEUE_CAPACITY: usize = 256;

/// How often held full states are retried for slow connections
const PENDING_FLUSH_INTERVAL: Duration = Duration::from_millis(50);

/// Commands processed by the hub task
#[derive(Debug)]
pub enum HubCommand {
    /// Register a connection; the hub sends it the current state first
    Connect {
        id: ConnectionId,
        outbox: mpsc::Sender<ServerMessage>,
    },
    /// A decoded message from a connection
    Inbound {
        id: ConnectionId,
        message: ClientMessage,
    },
    Disconnect {
        id: ConnectionId,
    },
    /// Read the current state
    Snapshot {
        resp: oneshot::Sender<HubSnapshot>,
    },
}

/// Point-in-time view of the hub
#[derive(Debug, Clone, PartialEq)]
pub struct HubSnapshot {
    pub playlist: PlaylistSnapshot,
    pub playback: PlaybackState,
    pub connections: usize,
}

/// A registered connection: its id and the receiving end of its outbox
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub outbox: mpsc::Receiver<ServerMessage>,
}

/// Cloneable handle for talking to the hub task
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
    next_id: Arc<AtomicU64>,
    outbox_capacity: usize,
}

impl HubHandle {
    /// Register a new connection.
    ///
    /// The first message in the returned outbox is the full state.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub task has stopped.
    pub async fn connect(&self) -> Result<Connection> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbox_tx, outbox) = mpsc::channel(self.outbox_capacity);
        self.send(HubCommand::Connect {
            id,
            outbox: outbox_tx,
        })
        .await?;
        Ok(Connection { id, outbox })
    }

    /// Forward a decoded message from `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub task has stopped.
    pub async fn dispatch(&self, id: ConnectionId, message: ClientMessage) -> Result<()> {
        self.send(HubCommand::Inbound { id, message }).await
    }

    /// Remove `id` from the active set.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub task has stopped.
    pub async fn disconnect(&self, id: ConnectionId) -> Result<()> {
        self.send(HubCommand::Disconnect { id }).await
    }

    /// Read the current state.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub task has stopped.
    pub async fn snapshot(&self) -> Result<HubSnapshot> {
        let (resp, rx) = oneshot::channel();
        self.send(HubCommand::Snapshot { resp }).await?;
        rx.await.map_err(|_| HubError::HubClosed)
    }

    async fn send(&self, command: HubCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| HubError::HubClosed)
    }
}

/// State owned by the hub task
pub struct Hub {
    store: StateStore,
    registry: Registry,
    writer: SnapshotWriter,
    assets: AssetStore,
}

impl Hub {
    #[must_use]
    pub fn new(store: StateStore, writer: SnapshotWriter, assets: AssetStore) -> Self {
        Self {
            store,
            registry: Registry::new(),
            writer,
            assets,
        }
    }

    /// Start the hub task.
    ///
    /// The task runs until `cancel_token` fires or every handle is dropped.
    #[must_use]
    pub fn spawn(
        self,
        outbox_capacity: usize,
        cancel_token: CancellationToken,
    ) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let handle = HubHandle {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
            outbox_capacity: outbox_capacity.max(1),
        };
        let task = tokio::spawn(self.run(rx, cancel_token));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>, cancel_token: CancellationToken) {
        info!(
            "Relay hub started with {} track(s)",
            self.store.playlist().len()
        );

        let mut flush = tokio::time::interval(PENDING_FLUSH_INTERVAL);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Relay hub shutting down");
                    break;
                }
                _ = flush.tick(), if self.registry.has_pending() => {
                    self.registry.flush_pending();
                }
                command = rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle(command).await;
                }
            }
        }
    }

    async fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { id, outbox } => {
                self.registry.insert(id, outbox);
                if self.registry.send_to(id, self.store.sync_message()) == Delivery::Sent {
                    info!(
                        "Client {} connected ({} active)",
                        id,
                        self.registry.len()
                    );
                }
            }
            HubCommand::Inbound { id, message } => {
                self.handle_message(id, &message).await;
            }
            HubCommand::Disconnect { id } => {
                if self.registry.remove(id) {
                    info!(
                        "Client {} disconnected ({} active)",
                        id,
                        self.registry.len()
                    );
                }
            }
            HubCommand::Snapshot { resp } => {
                let _ = resp.send(HubSnapshot {
                    playlist: self.store.snapshot(),
                    playback: self.store.playback(),
                    connections: self.registry.len(),
                });
            }
        }
    }

    async fn handle_message(&mut self, id: ConnectionId, message: &ClientMessage) {
        let outcome = match self.store.apply(message) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                debug!("Ignoring unknown message from {}", id);
                return;
            }
            Err(e) => {
                warn!("Rejected {} from {}: {}", message.kind(), id, e);
                return;
            }
        };

        if let Some(track) = &outcome.removed {
            if let Err(e) = self.assets.remove(&track.filename).await {
                warn!("Failed to delete asset {:?}: {}", track.filename, e);
            } else {
                info!("Deleted {} ({})", track.title, track.filename);
            }
        }

        // A failed write does not hold back the broadcast; the file catches up
        // on the next playlist change.
        if outcome.playlist_changed
            && let Err(e) = self.writer.persist(self.store.snapshot()).await
        {
            error!(
                "Failed to persist playlist to {:?}, broadcasting unsaved state: {}",
                self.writer.path(),
                e
            );
        }

        let sent = self.registry.broadcast(&outcome.broadcast);
        debug!(
            "Applied {} from {}, broadcast {} to {} client(s)",
            message.kind(),
            id,
            outcome.broadcast.kind(),
            sent
        );
    }
}
