use chrono::SubsecRound;
use rusqlite::params;
use uuid::Uuid;

use murmur_shared::UserId;

use crate::database::Database;
use crate::error::Result;
use crate::models::{decode_timestamp, encode_timestamp, Message, NewMessage};

impl Database {
    /// Append a message and return it with its assigned id.
    pub fn insert_message(&self, mut message: NewMessage) -> Result<Message> {
        let id = Uuid::new_v4();
        // Stored precision is microseconds; keep the returned copy identical.
        message.created_at = message.created_at.trunc_subsecs(6);
        self.conn().execute(
            "INSERT INTO messages (id, sender_id, recipient_id, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                message.sender_id.as_str(),
                message.recipient_id.as_str(),
                message.text,
                encode_timestamp(&message.created_at),
            ],
        )?;
        Ok(message.into_message(id))
    }

    /// All messages exchanged between `a` and `b`, in either direction,
    /// oldest first.
    pub fn get_conversation(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, sender_id, recipient_id, text, created_at
             FROM messages
             WHERE (sender_id = ?1 AND recipient_id = ?2)
                OR (sender_id = ?2 AND recipient_id = ?1)
             ORDER BY created_at ASC, seq ASC",
        )?;

        let rows = stmt.query_map(params![a.as_str(), b.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, sender, recipient, text, ts) = row?;
            messages.push(Message {
                id: Uuid::parse_str(&id)?,
                sender_id: UserId(sender),
                recipient_id: UserId(recipient),
                text,
                created_at: decode_timestamp(&ts)?,
            });
        }
        Ok(messages)
    }

    pub fn count_messages(&self) -> Result<u64> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}
