use axum::{http::StatusCode, response::Json};
use common::{ActivityEvent, ActivityKind, DashboardSummary, StorageUsage, SystemInfo, TopUser};
use moka::future::Cache;
use registry::{MediaStorage, Registry, RegistryError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};

use crate::config::Settings;
use crate::handlers::auth::{LoginForm, LoginPrompt};
use crate::handlers::datasets::{DatasetListQuery, DatasetListResponse, DatasetResponse, OwnerSummary};
use crate::handlers::users::{
    DeletedUserResponse, UserDetailResponse, UserListQuery, UserListResponse, UserResponse,
};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Account/dataset registry
    pub registry: Registry,
    /// Uploaded files under the media root
    pub media: MediaStorage,
    pub settings: Arc<Settings>,
    /// Cache for expensive operations
    pub cache: Cache<String, CachedData>,
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    StorageUsage(StorageUsage),
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            data,
            message: message.into(),
            success: true,
        })
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            success: false,
        }
    }

    pub fn with_status(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
        (status, Json(Self::new(error, code)))
    }

    /// Maps a registry failure onto its HTTP status and error code.
    pub fn from_registry(err: &RegistryError) -> ApiError {
        match err {
            RegistryError::Validation(message) => {
                warn!("Validation failed: {}", message);
                Self::with_status(StatusCode::BAD_REQUEST, message.clone(), "VALIDATION_ERROR")
            }
            RegistryError::NotFound { entity, .. } => {
                warn!("{}", err);
                let code = match *entity {
                    "User" => "USER_NOT_FOUND",
                    "Dataset" => "DATASET_NOT_FOUND",
                    _ => "NOT_FOUND",
                };
                Self::with_status(StatusCode::NOT_FOUND, err.to_string(), code)
            }
            RegistryError::Protected(message) => {
                warn!("Rejected change of protected account: {}", message);
                Self::with_status(StatusCode::FORBIDDEN, message.clone(), "PROTECTED_ACCOUNT")
            }
            RegistryError::Authorization(message) => {
                warn!("Unauthorized: {}", message);
                Self::with_status(
                    StatusCode::UNAUTHORIZED,
                    "Authentication required",
                    "UNAUTHORIZED",
                )
            }
            RegistryError::Database(db_error) => {
                error!("Database error: {}", db_error);
                Self::with_status(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "DATABASE_ERROR",
                )
            }
            RegistryError::PasswordHash(_)
            | RegistryError::Storage(_)
            | RegistryError::Runtime(_) => {
                error!("Internal error: {}", err);
                Self::with_status(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "INTERNAL_ERROR",
                )
            }
        }
    }
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::login_page,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::dashboard::get_dashboard,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::users::toggle_user_active,
        crate::handlers::users::delete_user,
        crate::handlers::datasets::get_datasets,
        crate::handlers::datasets::get_dataset,
        crate::handlers::datasets::delete_dataset,
        crate::handlers::settings::get_settings,
    ),
    components(
        schemas(
            ApiResponse<DashboardSummary>,
            ApiResponse<UserResponse>,
            ApiResponse<UserListResponse>,
            ApiResponse<UserDetailResponse>,
            ApiResponse<DeletedUserResponse>,
            ApiResponse<DatasetResponse>,
            ApiResponse<DatasetListResponse>,
            ApiResponse<SystemInfo>,
            ApiResponse<LoginPrompt>,
            ErrorResponse,
            HealthResponse,
            LoginForm,
            LoginPrompt,
            UserListQuery,
            DatasetListQuery,
            UserResponse,
            UserListResponse,
            UserDetailResponse,
            DeletedUserResponse,
            DatasetResponse,
            DatasetListResponse,
            OwnerSummary,
            DashboardSummary,
            TopUser,
            ActivityEvent,
            ActivityKind,
            SystemInfo,
            StorageUsage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Admin login and logout"),
        (name = "dashboard", description = "Registry aggregates"),
        (name = "users", description = "User registry management"),
        (name = "datasets", description = "Dataset registry management"),
        (name = "settings", description = "System settings"),
    ),
    info(
        title = "SalesPulse Admin API",
        description = "Superuser-only administration panel for SalesPulse accounts and datasets",
        version = "0.1.0",
    )
)]
pub struct ApiDoc;
