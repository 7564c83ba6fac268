//! Collaborator traits consumed by the server, and their SQLite backend.
//!
//! The traits are synchronous: implementations may block, and callers are
//! expected to run them off the async executor (`spawn_blocking`).

use std::sync::{Arc, Mutex};

use murmur_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Contact, Message, NewMessage, NewUser, User};

/// Durable, append-only message log.
pub trait MessageStore: Send + Sync + 'static {
    /// Persist a message. Once this returns `Ok` the message is part of the
    /// conversation history.
    fn append(&self, message: NewMessage) -> Result<Message>;

    /// Every message between `a` and `b`, oldest first.
    fn query(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>>;
}

/// Registered accounts and the contact list.
pub trait UserDirectory: Send + Sync + 'static {
    fn create_user(&self, new_user: NewUser) -> Result<User>;

    fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Every user except `self_id`.
    fn list_others(&self, self_id: &UserId) -> Result<Vec<Contact>>;

    fn set_avatar(&self, id: &UserId, image: &str) -> Result<User>;
}

/// A [`Database`] shared between request handlers.
///
/// `rusqlite::Connection` is not `Sync`, so every call takes the mutex for
/// the duration of one statement batch.
#[derive(Clone)]
pub struct SqliteBackend {
    db: Arc<Mutex<Database>>,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(&db)
    }
}

impl MessageStore for SqliteBackend {
    fn append(&self, message: NewMessage) -> Result<Message> {
        self.with_db(|db| db.insert_message(message))
    }

    fn query(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>> {
        self.with_db(|db| db.get_conversation(a, b))
    }
}

impl UserDirectory for SqliteBackend {
    fn create_user(&self, new_user: NewUser) -> Result<User> {
        self.with_db(|db| db.insert_user(new_user))
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_db(|db| db.find_user_by_username(username))
    }

    fn list_others(&self, self_id: &UserId) -> Result<Vec<Contact>> {
        self.with_db(|db| db.list_other_users(self_id))
    }

    fn set_avatar(&self, id: &UserId, image: &str) -> Result<User> {
        self.with_db(|db| db.set_avatar(id, image))
    }
}
