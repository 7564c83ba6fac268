//! JSON events exchanged over the live channel.
//!
//! Every frame is a text frame of the form `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_FRAME_SIZE;
use crate::error::ProtocolError;
use crate::types::UserId;

/// Events a client may send after the socket is upgraded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Bind this connection to a user identity.
    Identify(Identify),

    /// Send a text message to another user.
    Send(SendMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub user_id: UserId,
}

/// A send request. Missing fields decode as empty so that the relay reports
/// them as validation failures rather than as malformed frames.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessage {
    #[serde(default)]
    pub from: UserId,
    #[serde(default)]
    pub to: UserId,
    #[serde(default)]
    pub text: String,
}

/// Events pushed from the server to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A message addressed to the connected user arrived.
    MessageReceived { from: UserId, text: String },

    /// The previous client event was rejected.
    Error { msg: String },
}

impl ClientEvent {
    /// Decode one text frame.
    pub fn from_frame(frame: &str) -> Result<Self, ProtocolError> {
        if frame.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: frame.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(serde_json::from_str(frame)?)
    }
}

impl ServerEvent {
    pub fn error(msg: impl Into<String>) -> Self {
        ServerEvent::Error { msg: msg.into() }
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
