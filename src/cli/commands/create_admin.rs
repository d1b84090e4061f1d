use anyhow::{Result, anyhow, bail};
use registry::provisioning::{ProvisionOutcome, ProvisionRequest, password_warnings, provision_admin};
use registry::{AccountStore, Registry};
use sea_orm::Database;
use std::io::{self, BufRead, Write};
use tracing::{debug, error, info, trace, warn};

use crate::config::Settings;

/// How often mismatching passwords are asked for again.
pub const PASSWORD_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct CreateAdminArgs {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub promote_existing: bool,
    pub interactive: bool,
}

/// Source of answers for the interactive prompts.
pub trait Prompter {
    fn input(&mut self, prompt: &str) -> io::Result<String>;
    /// Reads without echoing.
    fn password(&mut self, prompt: &str) -> io::Result<String>;
    fn message(&mut self, message: &str);
}

pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str) -> io::Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn password(&mut self, prompt: &str) -> io::Result<String> {
        rpassword::prompt_password(prompt)
    }

    fn message(&mut self, message: &str) {
        println!("{message}");
    }
}

pub async fn create_admin(
    settings: &Settings,
    args: CreateAdminArgs,
    prompter: &mut dyn Prompter,
) -> Result<ProvisionOutcome> {
    trace!("Entering create_admin function");
    debug!("Database URL: {}", settings.redacted_database_url());

    let db = match Database::connect(&settings.database_url).await {
        Ok(connection) => connection,
        Err(e) => {
            error!(
                "Failed to connect to database '{}': {}",
                settings.redacted_database_url(),
                e
            );
            return Err(e.into());
        }
    };

    create_admin_in(&Registry::new(db), args, prompter).await
}

/// Collects missing values through `prompter` and provisions the account.
pub async fn create_admin_in<S>(
    store: &S,
    args: CreateAdminArgs,
    prompter: &mut dyn Prompter,
) -> Result<ProvisionOutcome>
where
    S: AccountStore + ?Sized,
{
    let username = match args.username {
        Some(username) => username,
        None if args.interactive => prompter.input("Username: ")?,
        None => bail!("--username is required with --no-input"),
    };
    if username.trim().is_empty() {
        prompter.message("Username is required!");
        bail!("Username is required");
    }

    // Promotion only applies to an account that exists; otherwise a new one is created
    let existing = store.find_account_by_username(username.trim()).await?;
    let mut promote_existing = args.promote_existing && existing.is_some();
    if let Some(existing) = existing.filter(|_| !promote_existing && args.interactive) {
        let answer = prompter.input(&format!(
            "User '{}' already exists. Grant admin access? (y/n): ",
            existing.username
        ))?;
        if !is_yes(&answer) {
            bail!("User '{}' already exists", existing.username);
        }
        promote_existing = true;
    }

    let email = match args.email {
        Some(email) => Some(email),
        None if args.interactive && !promote_existing => {
            Some(prompter.input("Email address (optional): ")?)
        }
        None => None,
    };

    let (password, password_confirmation) = match args.password {
        Some(password) => (password.clone(), password),
        None if promote_existing => (String::new(), String::new()),
        None if args.interactive => read_matching_passwords(prompter)?,
        None => bail!("--password is required with --no-input"),
    };

    if !promote_existing {
        let warnings = password_warnings(&password);
        if !warnings.is_empty() {
            for warning in &warnings {
                warn!("{}", warning);
                prompter.message(warning);
            }
            if !args.interactive {
                debug!("Accepting weak password in non-interactive mode");
            } else if !is_yes(&prompter.input("Continue anyway? (y/n): ")?) {
                bail!("Aborted, no account was created");
            }
        }
    }

    let request = ProvisionRequest {
        username,
        email,
        // Promotion keeps the existing password
        password: if promote_existing { "-".to_string() } else { password },
        password_confirmation: if promote_existing {
            "-".to_string()
        } else {
            password_confirmation
        },
        promote_existing,
    };

    let outcome = provision_admin(store, request)
        .await
        .map_err(|e| anyhow!("{e}"))?;

    match &outcome {
        ProvisionOutcome::Created(account) => {
            info!("Superuser '{}' created successfully", account.username);
            prompter.message(&format!("Superuser '{}' created successfully.", account.username));
        }
        ProvisionOutcome::Promoted(account) => {
            info!("Account '{}' promoted to superuser", account.username);
            prompter.message(&format!("User '{}' is now a superuser.", account.username));
        }
    }
    Ok(outcome)
}

fn read_matching_passwords(prompter: &mut dyn Prompter) -> Result<(String, String)> {
    for attempt in 1..=PASSWORD_ATTEMPTS {
        let password = prompter.password("Password: ")?;
        let confirmation = prompter.password("Password (again): ")?;
        if password == confirmation {
            return Ok((password, confirmation));
        }
        warn!("Passwords did not match (attempt {} of {})", attempt, PASSWORD_ATTEMPTS);
        prompter.message("Error: Your passwords didn't match.");
    }
    bail!("Passwords did not match after {PASSWORD_ATTEMPTS} attempts, no account was created")
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
