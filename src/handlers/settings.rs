use crate::config::display_media_root;
use crate::gate::Actor;
use crate::schemas::{ApiError, ApiResponse, AppState, CachedData, ErrorResponse};
use axum::{extract::State, response::Json};
use common::{StorageUsage, SystemInfo};
use registry::RegistryError;
use tracing::{debug, instrument, trace};

const STORAGE_CACHE_KEY: &str = "storage_usage";

/// Media root usage, served from cache when a recent walk exists.
pub async fn storage_usage(state: &AppState) -> Result<StorageUsage, RegistryError> {
    if let Some(CachedData::StorageUsage(usage)) = state.cache.get(STORAGE_CACHE_KEY).await {
        trace!("Storage usage served from cache");
        return Ok(usage);
    }

    let usage = state.media.usage().await?;
    state
        .cache
        .insert(STORAGE_CACHE_KEY.to_string(), CachedData::StorageUsage(usage))
        .await;
    Ok(usage)
}

/// Forget the cached walk after files were removed.
pub async fn invalidate_storage_usage(state: &AppState) {
    debug!("Invalidating cached storage usage");
    state.cache.invalidate(STORAGE_CACHE_KEY).await;
}

/// Read-only system settings and storage statistics
#[utoipa::path(
    get,
    path = "/admin-panel/settings/",
    tag = "settings",
    responses(
        (status = 200, description = "System settings retrieved successfully", body = ApiResponse<SystemInfo>),
        (status = 303, description = "Not signed in as a superuser, redirect to login"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
    axum::Extension(actor): Actor,
) -> Result<Json<ApiResponse<SystemInfo>>, ApiError> {
    trace!("Entering get_settings function");

    let usage = storage_usage(&state)
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;

    let settings = &state.settings;
    let info = SystemInfo {
        debug_mode: settings.debug,
        allowed_hosts: settings.allowed_hosts.clone(),
        media_root: display_media_root(&settings.media_root),
        total_files: usage.total_files,
        total_size_bytes: usage.total_size_bytes,
        total_size_mb: usage.total_size_mb(),
        database_backend: settings.database_backend().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    Ok(ApiResponse::ok(info, "System settings retrieved successfully"))
}
