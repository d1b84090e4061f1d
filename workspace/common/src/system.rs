use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Files and bytes found under the media root.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StorageUsage {
    pub total_files: u64,
    pub total_size_bytes: u64,
}

impl StorageUsage {
    pub fn total_size_mb(&self) -> f64 {
        bytes_to_megabytes(self.total_size_bytes)
    }
}

/// Read-only environment facts shown on the system settings page.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SystemInfo {
    pub debug_mode: bool,
    pub allowed_hosts: Vec<String>,
    pub media_root: String,
    pub total_files: u64,
    pub total_size_bytes: u64,
    /// Rounded to two decimals.
    pub total_size_mb: f64,
    pub database_backend: String,
    pub version: String,
}

/// Converts bytes to mebibytes rounded to two decimals.
pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}
