use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::path::PathBuf;
use tracing::{info, debug, trace, error};

use crate::config::redacted_database_url;

pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");
    debug!("Database URL: {}", redacted_database_url(database_url));

    if let Some(parent) = sqlite_parent_dir(database_url) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating database directory {}", parent.display());
            std::fs::create_dir_all(&parent)?;
        }
    }

    trace!("Attempting to connect to database");
    let db: DatabaseConnection = match Database::connect(database_url).await {
        Ok(connection) => {
            info!("Successfully connected to database");
            debug!("Database connection established");
            connection
        }
        Err(e) => {
            error!(
                "Failed to connect to database '{}': {}",
                redacted_database_url(database_url),
                e
            );
            return Err(e.into());
        }
    };

    info!("Running database migrations");
    trace!("Executing migration up command");
    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Database migrations completed successfully");
            debug!("All pending migrations have been applied");
        }
        Err(e) => {
            error!("Failed to run database migrations: {}", e);
            return Err(e.into());
        }
    }

    info!("Database initialization completed successfully!");
    trace!("init_database function completed");

    Ok(())
}

/// Directory of the database file for file-backed SQLite URLs.
fn sqlite_parent_dir(database_url: &str) -> Option<PathBuf> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    PathBuf::from(path).parent().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, Statement};

    #[test]
    fn test_sqlite_parent_dir() {
        assert_eq!(
            sqlite_parent_dir("sqlite:///var/lib/salespulse/db.sqlite?mode=rwc"),
            Some(PathBuf::from("/var/lib/salespulse"))
        );
        assert_eq!(sqlite_parent_dir("sqlite::memory:"), None);
        assert_eq!(sqlite_parent_dir("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn test_init_database_creates_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("admin.sqlite");
        let url = format!("sqlite://{}?mode=rwc", path.display());

        init_database(&url).await.unwrap();
        assert!(path.exists());

        let db = Database::connect(&url).await.unwrap();
        let row = db
            .query_one(Statement::from_string(
                db.get_database_backend(),
                "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'datasets', 'admin_sessions')",
            ))
            .await
            .unwrap()
            .unwrap();
        let tables: i64 = row.try_get("", "n").unwrap();
        assert_eq!(tables, 3);
    }
}
