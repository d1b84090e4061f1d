use crate::gate::Actor;
use crate::handlers::datasets::DatasetResponse;
use crate::handlers::settings::invalidate_storage_usage;
use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::user;
use registry::accounts::{self, AccountDetail};
use registry::{AccountFilter, AccountStore, Page, StatusFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Page size used when only `page` is given
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, IntoParams, Validate)]
pub struct UserListQuery {
    /// Case-insensitive match on username, email, first or last name
    pub search: Option<String>,
    /// One of `active`, `inactive`, `staff`, `superuser`
    pub status: Option<String>,
    /// Page number, the full list is returned when neither page nor limit is set
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            is_active: model.is_active,
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
            date_joined: model.date_joined,
            last_login: model.last_login,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    /// Number of matching users across all pages
    pub total: u64,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// A user with the datasets they own, newest first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDetailResponse {
    pub user: UserResponse,
    pub dataset_count: usize,
    pub datasets: Vec<DatasetResponse>,
}

impl From<AccountDetail> for UserDetailResponse {
    fn from(detail: AccountDetail) -> Self {
        Self {
            user: UserResponse::from(detail.account),
            dataset_count: detail.datasets.len(),
            datasets: detail
                .datasets
                .into_iter()
                .map(DatasetResponse::without_owner)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedUserResponse {
    pub id: i32,
    pub username: String,
    pub datasets_removed: usize,
    pub files_removed: u64,
}

fn account_filter(query: &UserListQuery) -> AccountFilter {
    let page = match (query.page, query.limit) {
        (None, None) => None,
        (page, limit) => Some(Page::new(
            page.unwrap_or(1),
            limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )),
    };

    AccountFilter {
        search: query.search.clone(),
        status: query
            .status
            .as_deref()
            .map(StatusFilter::parse)
            .unwrap_or_default(),
        joined_since: None,
        page,
    }
}

/// List, search and filter users
#[utoipa::path(
    get,
    path = "/admin-panel/users/",
    tag = "users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<UserListResponse>),
        (status = 303, description = "Not signed in as a superuser, redirect to login"),
        (status = 400, description = "Invalid query parameters"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_users(
    Valid(Query(query)): Valid<Query<UserListQuery>>,
    State(state): State<AppState>,
    axum::Extension(actor): Actor,
) -> Result<Json<ApiResponse<UserListResponse>>, ApiError> {
    trace!("Entering get_users function");

    let filter = account_filter(&query);
    debug!("Listing users with filter {:?}", filter);

    let users = state
        .registry
        .list_accounts(&filter)
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;
    let total = state
        .registry
        .count_accounts(&filter)
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;

    debug!("Retrieved {} of {} users", users.len(), total);
    let response = UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        total,
        page: filter.page.map(|p| p.number),
        limit: filter.page.map(|p| p.size),
    };
    Ok(ApiResponse::ok(response, "Users retrieved successfully"))
}

/// Get a user with their datasets
#[utoipa::path(
    get,
    path = "/admin-panel/users/{user_id}/",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserDetailResponse>),
        (status = 303, description = "Not signed in as a superuser, redirect to login"),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    axum::Extension(actor): Actor,
) -> Result<Json<ApiResponse<UserDetailResponse>>, ApiError> {
    trace!("Entering get_user function");

    let detail = accounts::account_detail(&state.registry, user_id)
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;

    debug!(
        "User {} owns {} datasets",
        detail.account.username,
        detail.datasets.len()
    );
    Ok(ApiResponse::ok(
        UserDetailResponse::from(detail),
        "User retrieved successfully",
    ))
}

/// Flip a user's active status
#[utoipa::path(
    post,
    path = "/admin-panel/users/{user_id}/toggle/",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User status changed", body = ApiResponse<UserResponse>),
        (status = 303, description = "Not signed in as a superuser, redirect to login"),
        (status = 403, description = "Admins cannot toggle their own account", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn toggle_user_active(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    axum::Extension(actor): Actor,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering toggle_user_active function");

    let updated = accounts::toggle_active(&state.registry, &actor, user_id)
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;

    let message = format!(
        "User {} has been {}",
        updated.username,
        if updated.is_active { "activated" } else { "deactivated" }
    );
    info!("{} by '{}'", message, actor.username);
    Ok(ApiResponse::ok(UserResponse::from(updated), message))
}

/// Delete a user together with their datasets
#[utoipa::path(
    post,
    path = "/admin-panel/users/{user_id}/delete/",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse<DeletedUserResponse>),
        (status = 303, description = "Not signed in as a superuser, redirect to login"),
        (status = 403, description = "Superusers cannot be deleted", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    axum::Extension(actor): Actor,
) -> Result<Json<ApiResponse<DeletedUserResponse>>, ApiError> {
    trace!("Entering delete_user function");

    let deleted = accounts::delete_account(&state.registry, &state.media, user_id)
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;

    if deleted.datasets_removed > 0 {
        invalidate_storage_usage(&state).await;
    }

    info!(
        "User {} deleted by '{}'",
        deleted.account.username, actor.username
    );
    let message = format!("User {} has been deleted", deleted.account.username);
    Ok(ApiResponse::ok(
        DeletedUserResponse {
            id: deleted.account.id,
            username: deleted.account.username,
            datasets_removed: deleted.datasets_removed,
            files_removed: deleted.files_removed,
        },
        message,
    ))
}
