//! Creation of admin accounts from the command line.

use tracing::{info, instrument, warn};
use validator::ValidateEmail;

use model::entities::user;

use crate::auth::hash_password;
use crate::error::{RegistryError, Result};
use crate::store::{AccountFlags, AccountStore, NewAccount};

/// Passwords shorter than this produce a warning.
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// Width of the `users.username` column.
pub const MAX_USERNAME_LENGTH: usize = 150;

#[derive(Debug, Clone, Default)]
pub struct ProvisionRequest {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub password_confirmation: String,
    /// Grant admin rights to an existing account instead of failing.
    pub promote_existing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created(user::Model),
    Promoted(user::Model),
}

impl ProvisionOutcome {
    pub fn account(&self) -> &user::Model {
        match self {
            ProvisionOutcome::Created(account) | ProvisionOutcome::Promoted(account) => account,
        }
    }
}

/// Non-fatal weaknesses of a password. Empty when nothing to report.
pub fn password_warnings(password: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        warnings.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        warnings.push("This password is entirely numeric.".to_string());
    }
    warnings
}

fn validate(request: &ProvisionRequest) -> Result<()> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(RegistryError::Validation(
            "Username cannot be empty".to_string(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(RegistryError::Validation(format!(
            "Username cannot be longer than {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if request.password != request.password_confirmation {
        return Err(RegistryError::Validation(
            "Passwords do not match".to_string(),
        ));
    }
    if request.password.is_empty() {
        return Err(RegistryError::Validation(
            "Password cannot be empty".to_string(),
        ));
    }
    let email = request.email.as_deref().map(str::trim).unwrap_or_default();
    if !email.is_empty() && !email.validate_email() {
        return Err(RegistryError::Validation(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(())
}

/// Creates an active staff superuser, or promotes an existing account when
/// `promote_existing` is set. Nothing is written when validation fails.
#[instrument(skip(store, request), fields(username = %request.username))]
pub async fn provision_admin<S>(store: &S, request: ProvisionRequest) -> Result<ProvisionOutcome>
where
    S: AccountStore + ?Sized,
{
    validate(&request)?;
    let username = request.username.trim().to_string();

    if let Some(existing) = store.find_account_by_username(&username).await? {
        if !request.promote_existing {
            warn!("Account '{}' already exists", username);
            return Err(RegistryError::Validation(format!(
                "User '{username}' already exists"
            )));
        }
        let promoted = store
            .update_account_flags(existing.id, AccountFlags::admin())
            .await?;
        info!("Promoted '{}' to superuser", promoted.username);
        return Ok(ProvisionOutcome::Promoted(promoted));
    }

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let created = store
        .create_account(NewAccount {
            username,
            email: request.email.map(|e| e.trim().to_string()).unwrap_or_default(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash,
            is_active: true,
            is_staff: true,
            is_superuser: true,
        })
        .await?;

    info!("Created superuser '{}'", created.username);
    Ok(ProvisionOutcome::Created(created))
}
