//! Per-connection presence state machine.

use thiserror::Error;
use tracing::debug;

use murmur_shared::{ConnectionId, UserId};

use crate::registry::{ConnectionHandle, ConnectionRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgraded but not yet bound to a user.
    Anonymous,
    /// Bound to the most recently identified user.
    Identified(UserId),
    /// Transport gone. Terminal.
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("userId is required")]
    EmptyIdentity,

    #[error("connection is closed")]
    Closed,
}

/// Drives one connection through `Anonymous -> Identified -> Closed`,
/// keeping the registry in step.
pub struct ConnectionLifecycle {
    handle: ConnectionHandle,
    registry: ConnectionRegistry,
    state: ConnectionState,
}

impl ConnectionLifecycle {
    pub fn new(handle: ConnectionHandle, registry: ConnectionRegistry) -> Self {
        Self {
            handle,
            registry,
            state: ConnectionState::Anonymous,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn identity(&self) -> Option<&UserId> {
        match &self.state {
            ConnectionState::Identified(user) => Some(user),
            _ => None,
        }
    }

    /// Bind this connection to `user`.
    ///
    /// Identifying again re-registers. An identity bound earlier on this
    /// same connection stays registered until the connection closes.
    pub async fn identify(&mut self, user: UserId) -> Result<(), LifecycleError> {
        if self.state == ConnectionState::Closed {
            return Err(LifecycleError::Closed);
        }
        if user.is_blank() {
            return Err(LifecycleError::EmptyIdentity);
        }

        self.registry.register(user.clone(), self.handle.clone()).await;
        debug!(conn = %self.handle.id(), user = %user, "Connection identified");
        self.state = ConnectionState::Identified(user);
        Ok(())
    }

    /// Mark the transport as gone and drop its presence. Idempotent.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        let gone = self.registry.remove_by_handle(self.handle.id()).await;
        debug!(conn = %self.handle.id(), offline = ?gone, "Connection closed");
        self.state = ConnectionState::Closed;
    }
}
