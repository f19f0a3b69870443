//! Active connection set.

use std::collections::HashMap;
use std::fmt;
use tandem_core::ServerMessage;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Process-local key for one WebSocket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Sending half of a connection's outbox
pub type Outbox = mpsc::Sender<ServerMessage>;

/// Outcome of delivering to one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Outbox full; a full-state message was kept to send once it drains
    Deferred,
    /// Outbox full; the message was skipped for this connection
    Skipped,
    /// Connection closed; it has been removed from the registry
    Closed,
}

#[derive(Debug)]
struct Peer {
    outbox: Outbox,
    /// Latest full-state message that did not fit in the outbox
    pending: Option<ServerMessage>,
}

impl Peer {
    fn new(outbox: Outbox) -> Self {
        Self {
            outbox,
            pending: None,
        }
    }

    /// Push the pending message, if any. Returns `false` if the connection is
    /// closed.
    fn flush(&mut self) -> bool {
        let Some(message) = self.pending.take() else {
            return true;
        };
        match self.outbox.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                self.pending = Some(message);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn deliver(&mut self, message: ServerMessage) -> Delivery {
        if !self.flush() {
            return Delivery::Closed;
        }
        if self.pending.is_some() {
            return self.defer(message);
        }
        match self.outbox.try_send(message) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(message)) => self.defer(message),
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    fn defer(&mut self, message: ServerMessage) -> Delivery {
        if message.carries_full_state() {
            self.pending = Some(message);
            Delivery::Deferred
        } else {
            Delivery::Skipped
        }
    }
}

/// Maps connection ids to their outboxes.
///
/// A connection whose outbox is full keeps only the newest full-state message
/// and receives it once the outbox drains; partial updates are dropped.
#[derive(Debug, Default)]
pub struct Registry {
    peers: HashMap<ConnectionId, Peer>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ConnectionId, outbox: Outbox) {
        self.peers.insert(id, Peer::new(outbox));
    }

    /// Returns `true` if the connection was registered
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        self.peers.remove(&id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.peers.contains_key(&id)
    }

    /// Whether any connection still holds an undelivered full state
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.peers.values().any(|peer| peer.pending.is_some())
    }

    /// Send to a single connection, dropping it if closed
    pub fn send_to(&mut self, id: ConnectionId, message: ServerMessage) -> Delivery {
        let Some(peer) = self.peers.get_mut(&id) else {
            return Delivery::Closed;
        };
        let kind = message.kind();
        let delivery = peer.deliver(message);
        self.note(id, kind, delivery);
        delivery
    }

    /// Send to every connection.
    ///
    /// Closed connections are collected during the pass and removed after it.
    /// Returns the number of connections that accepted the message.
    pub fn broadcast(&mut self, message: &ServerMessage) -> usize {
        let mut sent = 0;
        let mut closed = Vec::new();

        for (id, peer) in &mut self.peers {
            match peer.deliver(message.clone()) {
                Delivery::Sent => sent += 1,
                Delivery::Deferred => {
                    debug!("Outbox full, holding {} for {}", message.kind(), id);
                }
                Delivery::Skipped => {
                    warn!("Outbox full, skipping {} for {}", message.kind(), id);
                }
                Delivery::Closed => closed.push(*id),
            }
        }

        self.drop_closed(closed);
        sent
    }

    /// Retry every held full state. Returns how many were delivered.
    pub fn flush_pending(&mut self) -> usize {
        let mut flushed = 0;
        let mut closed = Vec::new();

        for (id, peer) in &mut self.peers {
            if peer.pending.is_none() {
                continue;
            }
            if peer.flush() {
                if peer.pending.is_none() {
                    flushed += 1;
                    debug!("Delivered held full state to {}", id);
                }
            } else {
                closed.push(*id);
            }
        }

        self.drop_closed(closed);
        flushed
    }

    fn note(&mut self, id: ConnectionId, kind: &str, delivery: Delivery) {
        match delivery {
            Delivery::Sent => {}
            Delivery::Deferred => debug!("Outbox full, holding {} for {}", kind, id),
            Delivery::Skipped => warn!("Outbox full, skipping {} for {}", kind, id),
            Delivery::Closed => self.drop_closed([id]),
        }
    }

    fn drop_closed(&mut self, closed: impl IntoIterator<Item = ConnectionId>) {
        for id in closed {
            if self.peers.remove(&id).is_some() {
                debug!("Removed closed connection {}", id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_reaches_every_connection() {
        let mut registry = Registry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.insert(ConnectionId(1), tx1);
        registry.insert(ConnectionId(2), tx2);

        let sent = registry.broadcast(&ServerMessage::Play);

        assert_eq!(sent, 2);
        assert_eq!(rx1.try_recv().unwrap(), ServerMessage::Play);
        assert_eq!(rx2.try_recv().unwrap(), ServerMessage::Play);
    }

    #[test]
    fn test_broadcast_removes_closed_connections() {
        let mut registry = Registry::new();
        let (tx1, rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.insert(ConnectionId(1), tx1);
        registry.insert(ConnectionId(2), tx2);
        drop(rx1);

        let sent = registry.broadcast(&ServerMessage::Pause);

        assert_eq!(sent, 1);
        assert!(!registry.contains(ConnectionId(1)));
        assert!(registry.contains(ConnectionId(2)));
        assert_eq!(rx2.try_recv().unwrap(), ServerMessage::Pause);
    }

    fn sync(current_index: usize) -> ServerMessage {
        ServerMessage::SyncPlaylist {
            songs: vec![
                tandem_core::Track::new("a.mp3", "a"),
                tandem_core::Track::new("b.mp3", "b"),
            ],
            current_index,
            is_playing: false,
            current_time: 0.0,
        }
    }

    #[test]
    fn test_broadcast_skips_partial_updates_when_full() {
        let mut registry = Registry::new();
        let (tx, mut rx) = mpsc::channel(1);
        registry.insert(ConnectionId(7), tx);

        assert_eq!(registry.broadcast(&ServerMessage::Play), 1);
        assert_eq!(registry.broadcast(&ServerMessage::Pause), 0);
        assert_eq!(registry.broadcast(&ServerMessage::SyncTime { time: 3.0 }), 0);

        assert!(registry.contains(ConnectionId(7)));
        assert!(!registry.has_pending());
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Play);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_state_is_held_until_outbox_drains() {
        let mut registry = Registry::new();
        let (tx, mut rx) = mpsc::channel(1);
        registry.insert(ConnectionId(1), tx);

        assert_eq!(registry.broadcast(&ServerMessage::Play), 1);
        assert_eq!(registry.broadcast(&sync(1)), 0);
        assert!(registry.has_pending());

        // Still full: nothing moves
        assert_eq!(registry.flush_pending(), 0);

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Play);
        assert_eq!(registry.flush_pending(), 1);
        assert!(!registry.has_pending());
        assert_eq!(rx.try_recv().unwrap(), sync(1));
    }

    #[test]
    fn test_newer_full_state_replaces_held_one() {
        let mut registry = Registry::new();
        let (tx, mut rx) = mpsc::channel(1);
        registry.insert(ConnectionId(1), tx);

        registry.broadcast(&ServerMessage::Play);
        registry.broadcast(&sync(0));
        registry.broadcast(&ServerMessage::SyncTime { time: 9.0 });
        registry.broadcast(&sync(1));

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Play);
        // The next broadcast flushes the held state before its own message
        assert_eq!(registry.broadcast(&ServerMessage::SyncTime { time: 10.0 }), 0);
        assert_eq!(rx.try_recv().unwrap(), sync(1));
        assert!(rx.try_recv().is_err());
        assert!(!registry.has_pending());
    }

    #[test]
    fn test_flush_drops_closed_connection() {
        let mut registry = Registry::new();
        let (tx, rx) = mpsc::channel(1);
        registry.insert(ConnectionId(4), tx);
        registry.broadcast(&ServerMessage::Play);
        registry.broadcast(&sync(0));
        drop(rx);

        assert_eq!(registry.flush_pending(), 0);
        assert!(registry.is_empty());
        assert!(!registry.has_pending());
    }

    #[test]
    fn test_send_to_unknown_or_closed() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.send_to(ConnectionId(1), ServerMessage::Play),
            Delivery::Closed
        );

        let (tx, rx) = mpsc::channel(1);
        registry.insert(ConnectionId(2), tx);
        drop(rx);
        assert_eq!(
            registry.send_to(ConnectionId(2), ServerMessage::Play),
            Delivery::Closed
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut registry = Registry::new();
        let (tx, _rx) = mpsc::channel(1);
        registry.insert(ConnectionId(3), tx);

        assert!(registry.remove(ConnectionId(3)));
        assert!(!registry.remove(ConnectionId(3)));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId(42).to_string(), "conn-42");
    }
}
