use crate::gate::Actor;
use crate::handlers::settings::invalidate_storage_usage;
use crate::handlers::users::DEFAULT_PAGE_SIZE;
use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::dataset;
use registry::datasets;
use registry::{DatasetFilter, DatasetStore, DatasetWithOwner, Page};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Query parameters for listing datasets
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, IntoParams, Validate)]
pub struct DatasetListQuery {
    /// Case-insensitive match on dataset name or owner username
    pub search: Option<String>,
    /// Page number, the full list is returned when neither page nor limit is set
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OwnerSummary {
    pub id: i32,
    pub username: String,
}

/// Dataset response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatasetResponse {
    pub id: i32,
    pub name: String,
    /// Path relative to the media root
    pub file: String,
    pub file_name: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
    pub version: i32,
    pub is_current: bool,
    pub schema_signature: String,
    pub owner: Option<OwnerSummary>,
}

impl DatasetResponse {
    pub fn without_owner(model: dataset::Model) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            file_name: model.file_name().to_string(),
            file: model.file,
            file_size: model.file_size,
            uploaded_at: model.uploaded_at,
            version: model.version,
            is_current: model.is_current,
            schema_signature: model.schema_signature,
            owner: None,
        }
    }
}

impl From<DatasetWithOwner> for DatasetResponse {
    fn from((model, owner): DatasetWithOwner) -> Self {
        Self {
            owner: owner.map(|owner| OwnerSummary {
                id: owner.id,
                username: owner.username,
            }),
            ..Self::without_owner(model)
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatasetListResponse {
    pub datasets: Vec<DatasetResponse>,
    /// Number of matching datasets across all pages
    pub total: u64,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// List and search datasets
#[utoipa::path(
    get,
    path = "/admin-panel/datasets/",
    tag = "datasets",
    params(DatasetListQuery),
    responses(
        (status = 200, description = "Datasets retrieved successfully", body = ApiResponse<DatasetListResponse>),
        (status = 303, description = "Not signed in as a superuser, redirect to login"),
        (status = 400, description = "Invalid query parameters"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_datasets(
    Valid(Query(query)): Valid<Query<DatasetListQuery>>,
    State(state): State<AppState>,
    axum::Extension(actor): Actor,
) -> Result<Json<ApiResponse<DatasetListResponse>>, ApiError> {
    trace!("Entering get_datasets function");

    let page = match (query.page, query.limit) {
        (None, None) => None,
        (page, limit) => Some(Page::new(
            page.unwrap_or(1),
            limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )),
    };
    let filter = DatasetFilter {
        search: query.search.clone(),
        page,
        ..Default::default()
    };

    let found = state
        .registry
        .list_datasets(&filter)
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;
    let total = state
        .registry
        .count_datasets(&filter)
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;

    debug!("Retrieved {} of {} datasets", found.len(), total);
    let response = DatasetListResponse {
        datasets: found.into_iter().map(DatasetResponse::from).collect(),
        total,
        page: page.map(|p| p.number),
        limit: page.map(|p| p.size),
    };
    Ok(ApiResponse::ok(response, "Datasets retrieved successfully"))
}

/// Get dataset metadata and owner
#[utoipa::path(
    get,
    path = "/admin-panel/datasets/{dataset_id}/",
    tag = "datasets",
    params(
        ("dataset_id" = i32, Path, description = "Dataset ID"),
    ),
    responses(
        (status = 200, description = "Dataset retrieved successfully", body = ApiResponse<DatasetResponse>),
        (status = 303, description = "Not signed in as a superuser, redirect to login"),
        (status = 404, description = "Dataset not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_dataset(
    Path(dataset_id): Path<i32>,
    State(state): State<AppState>,
    axum::Extension(actor): Actor,
) -> Result<Json<ApiResponse<DatasetResponse>>, ApiError> {
    trace!("Entering get_dataset function");

    let found = datasets::dataset_detail(&state.registry, dataset_id)
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;

    Ok(ApiResponse::ok(
        DatasetResponse::from(found),
        "Dataset retrieved successfully",
    ))
}

/// Delete a dataset and its file
#[utoipa::path(
    post,
    path = "/admin-panel/datasets/{dataset_id}/delete/",
    tag = "datasets",
    params(
        ("dataset_id" = i32, Path, description = "Dataset ID"),
    ),
    responses(
        (status = 200, description = "Dataset deleted", body = ApiResponse<DatasetResponse>),
        (status = 303, description = "Not signed in as a superuser, redirect to login"),
        (status = 404, description = "Dataset not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_dataset(
    Path(dataset_id): Path<i32>,
    State(state): State<AppState>,
    axum::Extension(actor): Actor,
) -> Result<Json<ApiResponse<DatasetResponse>>, ApiError> {
    trace!("Entering delete_dataset function");

    let deleted = datasets::delete_dataset(&state.registry, &state.media, dataset_id)
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;
    invalidate_storage_usage(&state).await;

    info!("Dataset '{}' deleted by '{}'", deleted.name, actor.username);
    let message = format!("Dataset {} has been deleted", deleted.name);
    Ok(ApiResponse::ok(DatasetResponse::without_owner(deleted), message))
}
