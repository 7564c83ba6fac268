//! Presence: which user is online, and through which live connection.
//!
//! The registry never owns a connection. Each entry keeps only a weak
//! reference to the connection's outbound queue; the connection task holds
//! the strong sender and is the only place a connection is torn down.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, info};

use murmur_shared::protocol::ServerEvent;
use murmur_shared::{ConnectionId, UserId};

/// Why a push to a live connection did not happen.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError {
    #[error("connection closed")]
    Closed,

    #[error("outbound queue full")]
    Full,
}

/// Non-owning reference to one live connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::WeakSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, sender: &mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id,
            sender: sender.downgrade(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an event for the connection without waiting.
    pub fn push(&self, event: ServerEvent) -> Result<(), PushError> {
        let sender = self.sender.upgrade().ok_or(PushError::Closed)?;
        sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle").field("id", &self.id).finish()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Maps each online user to at most one connection.
///
/// Every operation takes the single lock for a pure in-memory update; no
/// operation awaits anything else while holding it.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    entries: Arc<RwLock<HashMap<UserId, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `identity` to `handle`, replacing any previous binding.
    ///
    /// A displaced connection is neither closed nor notified. Returns the
    /// displaced handle, if any.
    pub async fn register(
        &self,
        identity: UserId,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let conn = handle.id();
        let previous = self.entries.write().await.insert(identity.clone(), handle);

        match &previous {
            Some(old) if old.id() != conn => info!(
                user = %identity,
                conn = %conn,
                displaced = %old.id(),
                "Presence moved to a new connection"
            ),
            _ => debug!(user = %identity, conn = %conn, "Presence registered"),
        }

        previous
    }

    pub async fn lookup(&self, identity: &UserId) -> Option<ConnectionHandle> {
        self.entries.read().await.get(identity).cloned()
    }

    /// Returns whether an entry was removed.
    pub async fn remove(&self, identity: &UserId) -> bool {
        let removed = self.entries.write().await.remove(identity).is_some();
        if removed {
            debug!(user = %identity, "Presence removed");
        }
        removed
    }

    /// Drop every entry that points at `conn`. Used on disconnect, where
    /// only the connection is known. Returns the identities that went
    /// offline.
    pub async fn remove_by_handle(&self, conn: ConnectionId) -> Vec<UserId> {
        let mut entries = self.entries.write().await;
        let gone: Vec<UserId> = entries
            .iter()
            .filter(|(_, handle)| handle.id() == conn)
            .map(|(identity, _)| identity.clone())
            .collect();
        for identity in &gone {
            entries.remove(identity);
        }
        drop(entries);

        if !gone.is_empty() {
            debug!(conn = %conn, users = gone.len(), "Presence cleared for connection");
        }
        gone
    }

    pub async fn online_count(&self) -> usize {
        self.entries.read().await.len()
    }
}
