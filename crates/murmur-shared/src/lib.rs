//! # murmur-shared
//!
//! Types shared by the murmur store and server: user and connection
//! identities, the JSON live-channel protocol, and common constants.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use types::{ConnectionId, UserId};
