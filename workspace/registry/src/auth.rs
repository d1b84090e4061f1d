//! Admin authentication: password hashing, sessions and the access gate.
//!
//! Passwords are hashed with Argon2id. A successful login creates a row in
//! `admin_sessions` whose key is handed to the browser as a cookie; every
//! later request resolves that key back into an account and runs it through
//! [`AuthContext::authorize`].

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::fmt;
use tracing::{debug, info, instrument, warn};

use model::entities::{admin_session, user};

use crate::error::{RegistryError, Result};
use crate::store::{AccountStore, Registry};

/// Length of the random session key stored in the cookie.
pub const SESSION_KEY_LENGTH: usize = 64;

/// Explicit authentication context handed to every admin operation.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i32,
    pub username: String,
    pub session_key: Option<String>,
}

// The session key is a bearer credential and must never reach the logs
impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("session_key", &self.session_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthContext {
    /// Access gate: allows the request iff the actor exists and is an
    /// active superuser.
    pub fn authorize(actor: Option<user::Model>) -> Result<Self> {
        match actor {
            Some(account) if account.can_access_admin() => Ok(Self {
                user_id: account.id,
                username: account.username,
                session_key: None,
            }),
            Some(account) => Err(RegistryError::Authorization(format!(
                "'{}' is not an active superuser",
                account.username
            ))),
            None => Err(RegistryError::Authorization(
                "no authenticated account".to_string(),
            )),
        }
    }

    pub fn with_session(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }
}

/// A session created by a successful login.
#[derive(Clone)]
pub struct LoginSession {
    pub session_key: String,
    pub expires_at: DateTime<Utc>,
    pub context: AuthContext,
}

impl fmt::Debug for LoginSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSession")
            .field("session_key", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("context", &self.context)
            .finish()
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| RegistryError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a cryptographically secure session key.
pub fn generate_session_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_KEY_LENGTH)
        .map(char::from)
        .collect()
}

impl Registry {
    /// Authenticate an admin and create a session.
    ///
    /// Returns `None` for unknown usernames, wrong passwords and accounts
    /// that are not active superusers; nothing is written in those cases.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        session_timeout: Duration,
    ) -> Result<Option<LoginSession>> {
        let account = match self.find_account_by_username(username.trim()).await? {
            Some(account) => account,
            None => {
                debug!("Login attempt for unknown username");
                return Ok(None);
            }
        };

        let password = password.to_string();
        let stored_hash = account.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await?;
        if !verified {
            warn!("Invalid password for '{}'", account.username);
            return Ok(None);
        }

        if !account.can_access_admin() {
            warn!("'{}' has no admin access", account.username);
            return Ok(None);
        }

        let now = Utc::now();
        let session_key = generate_session_key();
        let expires_at = now + session_timeout;

        admin_session::ActiveModel {
            session_key: Set(session_key.clone()),
            user_id: Set(account.id),
            created_at: Set(now),
            expires_at: Set(expires_at),
        }
        .insert(&self.db)
        .await?;

        let mut active: user::ActiveModel = account.clone().into();
        active.last_login = Set(Some(now));
        active.update(&self.db).await?;

        info!("Admin '{}' logged in", account.username);
        let context = AuthContext::authorize(Some(account))?.with_session(session_key.clone());
        Ok(Some(LoginSession {
            session_key,
            expires_at,
            context,
        }))
    }

    /// Resolve a session key into its account. Expired sessions are deleted
    /// and treated as absent.
    #[instrument(skip(self, session_key))]
    pub async fn resolve_session(&self, session_key: &str) -> Result<Option<user::Model>> {
        let found = admin_session::Entity::find_by_id(session_key.to_string())
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?;

        match found {
            Some((session, _)) if session.is_expired(Utc::now()) => {
                debug!("Session for user {} expired", session.user_id);
                admin_session::Entity::delete_by_id(session.session_key)
                    .exec(&self.db)
                    .await?;
                Ok(None)
            }
            Some((_, account)) => Ok(account),
            None => Ok(None),
        }
    }

    /// Gate entry point: resolves the optional session key and authorizes
    /// the account behind it.
    pub async fn authenticate_session(&self, session_key: Option<&str>) -> Result<AuthContext> {
        let actor = match session_key {
            Some(key) if !key.is_empty() => self.resolve_session(key).await?,
            _ => None,
        };
        let context = AuthContext::authorize(actor)?;
        Ok(match session_key {
            Some(key) => context.with_session(key),
            None => context,
        })
    }

    /// Delete a session (logout). Returns whether a session was removed.
    pub async fn logout(&self, session_key: &str) -> Result<bool> {
        let result = admin_session::Entity::delete_by_id(session_key.to_string())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Delete all expired sessions.
    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        let result = admin_session::Entity::delete_many()
            .filter(admin_session::Column::ExpiresAt.lte(Utc::now()))
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            info!("Purged {} expired admin sessions", result.rows_affected);
        }
        Ok(result.rows_affected)
    }
}
