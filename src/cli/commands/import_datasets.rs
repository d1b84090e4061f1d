use anyhow::{Result, anyhow};
use registry::datasets::{ImportReport, import_directory, resolve_import_owner};
use registry::{MediaStorage, Registry};
use sea_orm::Database;
use std::path::PathBuf;
use tracing::{info, debug, trace, error, warn};

use crate::config::Settings;

pub async fn import_datasets(
    settings: &Settings,
    dir: Option<PathBuf>,
    owner: Option<&str>,
) -> Result<ImportReport> {
    trace!("Entering import_datasets function");
    info!("Starting dataset import");
    debug!("Database URL: {}", settings.redacted_database_url());
    debug!("Media root: {}", settings.media_root.display());

    let db = match Database::connect(&settings.database_url).await {
        Ok(connection) => {
            debug!("Database connection established");
            connection
        }
        Err(e) => {
            error!(
                "Failed to connect to database '{}': {}",
                settings.redacted_database_url(),
                e
            );
            return Err(e.into());
        }
    };

    import_into(&Registry::new(db), &MediaStorage::new(settings.media_root.clone()), dir, owner)
        .await
}

async fn import_into(
    registry: &Registry,
    media: &MediaStorage,
    dir: Option<PathBuf>,
    owner: Option<&str>,
) -> Result<ImportReport> {
    let dir = dir.unwrap_or_else(|| media.datasets_dir());
    info!("Importing dataset files from {}", dir.display());

    if !dir.is_dir() {
        error!("Import directory {} does not exist", dir.display());
        return Err(anyhow!("Directory {} does not exist", dir.display()));
    }

    let owner = match resolve_import_owner(registry, owner).await {
        Ok(owner) => {
            info!("Imported datasets will be owned by '{}'", owner.username);
            owner
        }
        Err(e) => {
            error!("Could not determine dataset owner: {}", e);
            return Err(anyhow!("{e}"));
        }
    };

    let report = import_directory(registry, media, &dir, &owner)
        .await
        .map_err(|e| anyhow!("{e}"))?;

    info!("Dataset import completed");
    info!("  Migrated: {}", report.migrated);
    info!("  Skipped (already registered): {}", report.skipped);
    info!("  Failed: {}", report.failed);
    info!("  Total files: {}", report.total);
    if report.failed > 0 {
        warn!("{} files could not be imported, see warnings above", report.failed);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::{create_test_superuser, setup_test_registry};
    use registry::{DatasetFilter, DatasetStore};

    #[tokio::test]
    async fn test_import_from_external_directory() {
        let registry = setup_test_registry().await;
        let owner = create_test_superuser(&registry, "admin", "admin-password").await;

        let media_dir = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("q1.csv"), "region,revenue\nnorth,10\n").unwrap();
        std::fs::write(source.path().join("q2.csv"), "region,revenue\nsouth,12\n").unwrap();

        let media = MediaStorage::new(media_dir.path());
        let report = import_into(&registry, &media, Some(source.path().to_path_buf()), None)
            .await
            .unwrap();
        assert_eq!(report.migrated, 2);
        assert_eq!(report.total, 2);
        assert!(media.datasets_dir().join("q1.csv").exists());

        let datasets = registry.list_datasets(&DatasetFilter::default()).await.unwrap();
        assert_eq!(datasets.len(), 2);
        assert!(datasets.iter().all(|(_, o)| o.as_ref().map(|o| o.id) == Some(owner.id)));

        // Running again skips what is already registered
        let again = import_into(&registry, &media, Some(source.path().to_path_buf()), None)
            .await
            .unwrap();
        assert_eq!(again.migrated, 0);
        assert_eq!(again.skipped, 2);
    }

    #[tokio::test]
    async fn test_import_requires_existing_directory_and_owner() {
        let registry = setup_test_registry().await;
        let media_dir = tempfile::tempdir().unwrap();
        let media = MediaStorage::new(media_dir.path());

        // Default directory has not been created yet
        assert!(import_into(&registry, &media, None, None).await.is_err());

        std::fs::create_dir_all(media.datasets_dir()).unwrap();
        // No accounts exist to own the files
        assert!(import_into(&registry, &media, None, None).await.is_err());
        assert!(import_into(&registry, &media, None, Some("ghost")).await.is_err());
    }
}
