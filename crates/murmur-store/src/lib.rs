//! # murmur-store
//!
//! Durable storage for murmur, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection` with typed helpers for users and messages, and the
//! [`MessageStore`] / [`UserDirectory`] traits the server depends on.
//! [`SqliteBackend`] implements both over a shared, mutex-guarded database.

pub mod backend;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use backend::{MessageStore, SqliteBackend, UserDirectory};
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
