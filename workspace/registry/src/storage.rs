//! Media root access: dataset files and storage accounting.

use std::io;
use std::path::{Component, Path, PathBuf};

use common::StorageUsage;
use model::entities::dataset;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::error::{RegistryError, Result};

/// Directory under the media root that holds uploaded dataset files.
pub const DATASETS_DIR: &str = "datasets";

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn datasets_dir(&self) -> PathBuf {
        self.root.join(DATASETS_DIR)
    }

    /// Joins a stored relative path onto the media root. Absolute paths and
    /// parent components are rejected so a record can never point outside it.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let escapes = path.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if relative.is_empty() || escapes {
            return Err(RegistryError::Validation(format!(
                "'{relative}' is not a path inside the media root"
            )));
        }
        Ok(self.root.join(path))
    }

    /// Path relative to the media root for a file stored in the datasets dir.
    pub fn dataset_path(file_name: &str) -> String {
        format!("{DATASETS_DIR}/{file_name}")
    }

    /// Walks the media root recursively. A missing root counts as empty.
    pub async fn usage(&self) -> Result<StorageUsage> {
        let root = self.root.clone();
        let usage = tokio::task::spawn_blocking(move || walk_usage(&root)).await?;
        debug!(
            "Media root holds {} files ({} bytes)",
            usage.total_files, usage.total_size_bytes
        );
        Ok(usage)
    }

    /// Removes a stored file. Returns `false` when it did not exist.
    pub async fn remove_file(&self, relative: &str) -> Result<bool> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                trace!("Removed {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("File {} already gone", path.display());
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of the files behind deleted dataset rows. The rows
    /// are already gone, so failures are logged and skipped. Returns the
    /// number of files removed.
    pub async fn remove_dataset_files(&self, datasets: &[dataset::Model]) -> u64 {
        let mut removed = 0;
        for dataset in datasets {
            match self.remove_file(&dataset.file).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Could not remove file of dataset {}: {}", dataset.id, e),
            }
        }
        removed
    }

    pub async fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    /// Regular files directly under `dir`, sorted by name.
    pub async fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let dir = dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || -> io::Result<Vec<PathBuf>> {
            let mut files = Vec::new();
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
                let entry = entry.map_err(io::Error::from)?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            files.sort();
            Ok(files)
        })
        .await??;
        Ok(files)
    }
}

fn walk_usage(root: &Path) -> StorageUsage {
    let mut usage = StorageUsage::default();
    if !root.exists() {
        return usage;
    }

    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(metadata) => {
                usage.total_files += 1;
                usage.total_size_bytes += metadata.len();
            }
            Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }
    usage
}
