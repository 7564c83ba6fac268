use chrono::{SubsecRound, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension};

use murmur_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{decode_timestamp, encode_timestamp, Contact, NewUser, User};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, avatar_image, is_avatar_image_set, created_at";

impl Database {
    /// Create an account. Fails with [`StoreError::Duplicate`] when the
    /// username or email is taken.
    pub fn insert_user(&self, new_user: NewUser) -> Result<User> {
        let user = User {
            id: UserId::generate(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            avatar_image: None,
            is_avatar_image_set: false,
            created_at: Utc::now().trunc_subsecs(6),
        };

        self.conn()
            .execute(
                "INSERT INTO users (id, username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.as_str(),
                    user.username,
                    user.email,
                    user.password_hash,
                    encode_timestamp(&user.created_at),
                ],
            )
            .map_err(map_unique_violation)?;

        Ok(user)
    }

    pub fn get_user(&self, id: &UserId) -> Result<User> {
        self.find_user_where("id = ?1", id.as_str())?
            .ok_or(StoreError::NotFound)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_user_where("username = ?1", username)
    }

    /// Every user except `self_id`, ordered by username.
    pub fn list_other_users(&self, self_id: &UserId) -> Result<Vec<Contact>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, username, email, avatar_image
             FROM users
             WHERE id != ?1
             ORDER BY username ASC",
        )?;

        let rows = stmt.query_map(params![self_id.as_str()], |row| {
            Ok(Contact {
                id: UserId(row.get(0)?),
                username: row.get(1)?,
                email: row.get(2)?,
                avatar_image: row.get(3)?,
            })
        })?;

        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row?);
        }
        Ok(contacts)
    }

    /// Store an avatar and mark it as set. Returns the updated user.
    pub fn set_avatar(&self, id: &UserId, image: &str) -> Result<User> {
        let affected = self.conn().execute(
            "UPDATE users SET avatar_image = ?2, is_avatar_image_set = 1 WHERE id = ?1",
            params![id.as_str(), image],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_user(id)
    }

    fn find_user_where(&self, predicate: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
        let row = self
            .conn()
            .query_row(&sql, params![value], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, bool>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .optional()?;

        let Some((id, username, email, password_hash, avatar_image, is_set, ts)) = row else {
            return Ok(None);
        };

        Ok(Some(User {
            id: UserId(id),
            username,
            email,
            password_hash,
            avatar_image,
            is_avatar_image_set: is_set,
            created_at: decode_timestamp(&ts)?,
        }))
    }
}

fn map_unique_violation(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &err {
        if code.code == ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return StoreError::Duplicate("username");
            }
            if msg.contains("users.email") {
                return StoreError::Duplicate("email");
            }
        }
    }
    StoreError::Sqlite(err)
}
