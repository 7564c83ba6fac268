//! Account registration and login.
//!
//! Passwords are hashed with bcrypt. Hashing and store access both block,
//! so they run on the blocking pool.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use murmur_shared::constants::MIN_PASSWORD_LEN;
use murmur_store::{NewUser, StoreError, User, UserDirectory};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Incorrect Username or Password")]
    InvalidCredentials,

    #[error("Auth backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate("username") => AuthError::Conflict("Username already used".into()),
            StoreError::Duplicate("email") => AuthError::Conflict("Email already used".into()),
            other => AuthError::Backend(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    directory: Arc<dyn UserDirectory>,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(directory: Arc<dyn UserDirectory>, bcrypt_cost: u32) -> Self {
        Self {
            directory,
            bcrypt_cost,
        }
    }

    /// Create an account and return it (without the password hash).
    pub async fn register(
        &self,
        username: String,
        email: String,
        password: String,
    ) -> Result<User, AuthError> {
        validate_registration(&username, &email, &password)?;

        let directory = self.directory.clone();
        let cost = self.bcrypt_cost;
        let user = tokio::task::spawn_blocking(move || -> Result<User, AuthError> {
            let password_hash = bcrypt::hash(&password, cost)
                .map_err(|e| AuthError::Backend(format!("hashing failed: {e}")))?;
            Ok(directory.create_user(NewUser {
                username,
                email,
                password_hash,
            })?)
        })
        .await
        .map_err(|e| AuthError::Backend(e.to_string()))??;

        info!(user = %user.id, username = %user.username, "Account registered");
        Ok(user)
    }

    /// Check credentials and return the matching account.
    pub async fn identify(&self, username: String, password: String) -> Result<User, AuthError> {
        if username.is_empty() {
            return Err(AuthError::Validation("\"username\" is required".into()));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("\"password\" is required".into()));
        }

        let directory = self.directory.clone();
        let found = tokio::task::spawn_blocking(move || -> Result<Option<User>, AuthError> {
            let Some(user) = directory.find_by_username(&username)? else {
                return Ok(None);
            };
            let matches = bcrypt::verify(&password, &user.password_hash)
                .map_err(|e| AuthError::Backend(format!("hash check failed: {e}")))?;
            Ok(matches.then_some(user))
        })
        .await
        .map_err(|e| AuthError::Backend(e.to_string()))??;

        match found {
            Some(user) => {
                info!(user = %user.id, "Login succeeded");
                Ok(user)
            }
            None => {
                warn!("Login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

fn validate_registration(username: &str, email: &str, password: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::Validation("\"username\" is required".into()));
    }
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid_email {
        return Err(AuthError::Validation("\"email\" must be a valid email".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "\"password\" length must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use murmur_store::{Database, SqliteBackend};

    use super::*;

    fn service() -> AuthService {
        let backend = SqliteBackend::new(Database::open_in_memory().unwrap());
        AuthService::new(Arc::new(backend), 4)
    }

    #[tokio::test]
    async fn register_then_login() {
        let auth = service();
        let user = auth
            .register("alice".into(), "alice@example.org".into(), "password1".into())
            .await
            .unwrap();
        assert_ne!(user.password_hash, "password1");

        let logged_in = auth
            .identify("alice".into(), "password1".into())
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let auth = service();
        auth.register("alice".into(), "alice@example.org".into(), "password1".into())
            .await
            .unwrap();

        let wrong = auth
            .identify("alice".into(), "password2".into())
            .await
            .unwrap_err();
        let unknown = auth
            .identify("mallory".into(), "password1".into())
            .await
            .unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let auth = service();
        auth.register("alice".into(), "alice@example.org".into(), "password1".into())
            .await
            .unwrap();

        let err = auth
            .register("alice".into(), "new@example.org".into(), "password1".into())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Username already used");

        let err = auth
            .register("alice2".into(), "alice@example.org".into(), "password1".into())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already used");
    }

    #[test]
    fn registration_validation() {
        assert!(validate_registration("alice", "a@example.org", "12345678").is_ok());
        assert!(validate_registration("", "a@example.org", "12345678").is_err());
        assert!(validate_registration("alice", "example.org", "12345678").is_err());
        assert!(validate_registration("alice", "@example.org", "12345678").is_err());
        assert!(validate_registration("alice", "a@example.org", "short").is_err());
    }

    #[tokio::test]
    async fn login_requires_fields() {
        let err = service()
            .identify(String::new(), "password1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
