//! Outbound delivery to connected clients.

use crate::games::tictactoe::Symbol;
use crate::protocol::{PlayerDisconnected, ServerMessage};
use crate::room::{ConnectionId, RoomCode};
use crate::store::RoomStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// Messages a connection may have queued before further sends are dropped.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Something that can push a message to one connection.
pub trait Transport: Send + Sync {
    /// Delivers `message` to `to`. Returns false if the connection is gone
    /// or cannot take more.
    fn send(&self, to: ConnectionId, message: ServerMessage) -> bool;
}

/// Sending half of a connection's outbound queue.
pub type ConnectionSender = mpsc::Sender<ServerMessage>;

/// Live connections and their outbound queues.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    senders: Mutex<HashMap<ConnectionId, ConnectionSender>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnectionSender>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `id` and returns the queue its writer task drains.
    ///
    /// The queue holds at most [`OUTBOUND_CAPACITY`] messages; a client that
    /// stops reading loses whatever arrives past that.
    #[instrument(skip(self))]
    pub fn connect(&self, id: ConnectionId) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.lock().insert(id, tx);
        rx
    }

    /// Drops the queue for `id`.
    #[instrument(skip(self))]
    pub fn disconnect(&self, id: ConnectionId) {
        self.lock().remove(&id);
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing is connected.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Transport for ConnectionRegistry {
    fn send(&self, to: ConnectionId, message: ServerMessage) -> bool {
        match self.lock().get(&to) {
            Some(tx) => match tx.try_send(message) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%to, "Outbound queue full, dropping message");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
            None => false,
        }
    }
}

/// Fans room state out to seated connections.
///
/// Holds no game logic. Delivery is best effort: closed connections are
/// skipped, nothing is queued or retried.
#[derive(Clone)]
pub struct Broadcaster {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster").finish_non_exhaustive()
    }
}

impl Broadcaster {
    /// Wraps a transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Sends to a single connection.
    pub fn send_to(&self, to: ConnectionId, message: ServerMessage) {
        if !self.transport.send(to, message) {
            debug!(%to, "Dropped message for closed connection");
        }
    }

    /// Pushes the room's current view to every occupant.
    #[instrument(skip(self, store))]
    pub fn broadcast_state(&self, store: &RoomStore, code: &RoomCode) {
        let Some(room) = store.get_room(code) else {
            return;
        };
        let message = ServerMessage::GameStateUpdate(room.view());
        let occupants = room.occupant_ids();
        debug!(recipients = occupants.len(), "Broadcasting state");
        for id in occupants {
            self.send_to(id, message.clone());
        }
    }

    /// Tells every occupant other than `exclude` that `symbol` left.
    #[instrument(skip(self, store))]
    pub fn notify_disconnect(
        &self,
        store: &RoomStore,
        code: &RoomCode,
        symbol: Symbol,
        exclude: ConnectionId,
    ) {
        let Some(room) = store.get_room(code) else {
            return;
        };
        let message = ServerMessage::PlayerDisconnected(PlayerDisconnected {
            disconnected_player: symbol,
        });
        for id in room.occupant_ids().into_iter().filter(|id| *id != exclude) {
            self.send_to(id, message.clone());
        }
    }
}
