//! Message relay: persist first, then push to the recipient if online.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use murmur_shared::protocol::ServerEvent;
use murmur_shared::UserId;
use murmur_store::{MessageStore, NewMessage};

use crate::registry::ConnectionRegistry;

#[derive(Debug, Error)]
pub enum RelayError {
    /// A required field is missing. Not retried.
    #[error("{0}")]
    Validation(String),

    /// The message could not be stored. Nothing was pushed.
    #[error("Failed to store message: {0}")]
    Persistence(String),
}

/// How an accepted message reached its recipient. Both are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Stored and queued on the recipient's live connection.
    Delivered,
    /// Stored only; the recipient will see it in history.
    Stored,
}

/// One message of a conversation, seen from the requesting user.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub from_self: bool,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RelayService {
    store: Arc<dyn MessageStore>,
    registry: ConnectionRegistry,
}

impl RelayService {
    pub fn new(store: Arc<dyn MessageStore>, registry: ConnectionRegistry) -> Self {
        Self { store, registry }
    }

    pub async fn handle_send(
        &self,
        sender: UserId,
        recipient: UserId,
        text: String,
    ) -> Result<SendOutcome, RelayError> {
        if sender.is_blank() || recipient.is_blank() || text.is_empty() {
            return Err(RelayError::Validation(
                "From, to, and message are required".to_string(),
            ));
        }

        let new_message = NewMessage {
            sender_id: sender,
            recipient_id: recipient,
            text,
            created_at: Utc::now(),
        };

        // The store may block; the registry is not touched until it returns.
        let store = self.store.clone();
        let stored = tokio::task::spawn_blocking(move || store.append(new_message))
            .await
            .map_err(|e| RelayError::Persistence(e.to_string()))?
            .map_err(|e| {
                error!(error = %e, "Message append failed");
                RelayError::Persistence(e.to_string())
            })?;

        debug!(
            id = %stored.id,
            from = %stored.sender_id,
            to = %stored.recipient_id,
            "Message stored"
        );

        let event = ServerEvent::MessageReceived {
            from: stored.sender_id,
            text: stored.text,
        };
        Ok(self.push(&stored.recipient_id, event).await)
    }

    /// Best-effort live delivery. Any failure counts as "offline".
    async fn push(&self, recipient: &UserId, event: ServerEvent) -> SendOutcome {
        let Some(handle) = self.registry.lookup(recipient).await else {
            debug!(to = %recipient, "Recipient offline, history only");
            return SendOutcome::Stored;
        };

        match handle.push(event) {
            Ok(()) => {
                debug!(to = %recipient, conn = %handle.id(), "Message pushed live");
                SendOutcome::Delivered
            }
            Err(e) => {
                debug!(to = %recipient, conn = %handle.id(), error = %e, "Live push failed");
                SendOutcome::Stored
            }
        }
    }

    /// The conversation between `requester` and `peer`, oldest first.
    pub async fn handle_history(
        &self,
        requester: UserId,
        peer: UserId,
    ) -> Result<Vec<HistoryEntry>, RelayError> {
        if requester.is_blank() || peer.is_blank() {
            return Err(RelayError::Validation(
                "From and to users are required".to_string(),
            ));
        }

        let store = self.store.clone();
        let (a, b) = (requester.clone(), peer);
        let messages = tokio::task::spawn_blocking(move || store.query(&a, &b))
            .await
            .map_err(|e| RelayError::Persistence(e.to_string()))?
            .map_err(|e| {
                error!(error = %e, "History query failed");
                RelayError::Persistence(e.to_string())
            })?;

        Ok(messages
            .into_iter()
            .map(|m| HistoryEntry {
                from_self: m.sender_id == requester,
                message: m.text,
                created_at: m.created_at,
            })
            .collect())
    }
}
