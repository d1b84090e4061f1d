use anyhow::{Context, Result};
use config::{Config, Environment, File};
use moka::future::Cache;
use registry::{MediaStorage, Registry};
use sea_orm::{ConnectOptions, Database};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::schemas::AppState;

/// Prefix of the environment variables read by [`Settings::load`].
pub const ENV_PREFIX: &str = "SALESPULSE";
/// Configuration file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "salespulse.toml";
/// How long a storage walk result stays cached.
pub const STORAGE_CACHE_TTL: Duration = Duration::from_secs(60);

/// Runtime settings of the admin panel.
#[derive(Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    pub debug: bool,
    /// Host names accepted in the `Host` header. `*` accepts any host, a
    /// leading `.` accepts the domain and all of its subdomains.
    pub allowed_hosts: Vec<String>,
    pub media_root: PathBuf,
    pub session_timeout_secs: i64,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("database_url", &self.redacted_database_url())
            .field("bind_address", &self.bind_address)
            .field("debug", &self.debug)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("media_root", &self.media_root)
            .field("session_timeout_secs", &self.session_timeout_secs)
            .finish()
    }
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub config_file: Option<PathBuf>,
    pub database_url: Option<String>,
    pub bind_address: Option<String>,
    pub media_root: Option<PathBuf>,
}

impl Settings {
    /// Loads defaults, then the optional config file, then `SALESPULSE_*`
    /// environment variables (a `.env` file is honoured), then `overrides`.
    pub fn load(overrides: &SettingsOverrides) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(overrides, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(overrides: &SettingsOverrides, environment: Environment) -> Result<Self> {
        let config_file = overrides
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        debug!("Reading configuration file {}", config_file.display());

        let settings = Config::builder()
            .set_default("database_url", "sqlite://salespulse.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("debug", false)?
            .set_default("allowed_hosts", vec!["localhost", "127.0.0.1", "[::1]"])?
            .set_default("media_root", "media")?
            .set_default("session_timeout_secs", 14 * 24 * 60 * 60)?
            .add_source(File::from(config_file.as_path()).required(overrides.config_file.is_some()))
            .add_source(
                environment
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_hosts"),
            )
            .set_override_option("database_url", overrides.database_url.clone())?
            .set_override_option("bind_address", overrides.bind_address.clone())?
            .set_override_option(
                "media_root",
                overrides
                    .media_root
                    .as_ref()
                    .map(|path| path.to_string_lossy().into_owned()),
            )?
            .build()
            .context("Failed to read configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;

        Ok(settings)
    }

    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_timeout_secs)
    }

    /// Database engine named by the URL scheme.
    pub fn database_backend(&self) -> &'static str {
        database_backend(&self.database_url)
    }

    pub fn redacted_database_url(&self) -> String {
        redacted_database_url(&self.database_url)
    }
}

/// The database URL with its password masked, safe to log.
pub fn redacted_database_url(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("****")).is_err() {
                return format!("{}://****", parsed.scheme());
            }
            parsed.to_string()
        }
        _ => database_url.to_string(),
    }
}

pub fn database_backend(database_url: &str) -> &'static str {
    match database_url.split(':').next().unwrap_or_default() {
        "sqlite" => "sqlite",
        "postgres" | "postgresql" => "postgresql",
        "mysql" => "mysql",
        _ => "unknown",
    }
}

/// Storage usage cache shared by the settings view and the delete handlers.
pub fn storage_cache() -> Cache<String, crate::schemas::CachedData> {
    Cache::builder()
        .max_capacity(16)
        .time_to_live(STORAGE_CACHE_TTL)
        .build()
}

/// Connect to the database and build the state shared by all handlers.
pub async fn initialize_app_state(settings: Settings) -> Result<AppState> {
    info!("Connecting to database: {}", settings.redacted_database_url());
    let mut options = ConnectOptions::new(settings.database_url.clone());
    options.sqlx_logging(settings.debug);
    let db = Database::connect(options).await?;

    Ok(build_app_state(Registry::new(db), settings))
}

pub fn build_app_state(registry: Registry, settings: Settings) -> AppState {
    let media = MediaStorage::new(settings.media_root.clone());
    AppState {
        registry,
        media,
        settings: Arc::new(settings),
        cache: storage_cache(),
    }
}

/// Display form of the media root, absolute when it can be resolved.
pub fn display_media_root(root: &Path) -> String {
    std::fs::canonicalize(root)
        .unwrap_or_else(|_| root.to_path_buf())
        .display()
        .to_string()
}
