//! Outbound handles for connected players.
//!
//! A [`ConnectionHandle`] is what a session keeps for each seat. It only holds the
//! sending half of a bounded queue drained by the connection's writer task, so the
//! session can push messages without owning or awaiting the socket.

use shared::ServerMessage;
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Identifier assigned by the transport to every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
    #[error("outbound buffer full")]
    Full,
}

#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<ServerMessage>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self { id, tx }
    }

    /// Creates a handle together with the receiving end of its outbound queue.
    pub fn channel(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a message without waiting. A full queue means the consumer is not
    /// keeping up and is reported the same way as a closed one.
    pub fn send(&self, message: ServerMessage) -> Result<(), SendError> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }
}
