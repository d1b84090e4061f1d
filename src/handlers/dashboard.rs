use crate::gate::Actor;
use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{extract::State, response::Json};
use common::DashboardSummary;
use registry::dashboard::summarize;
use tracing::{debug, instrument, trace};

/// Registry aggregates and recent activity
#[utoipa::path(
    get,
    path = "/admin-panel/dashboard/",
    tag = "dashboard",
    responses(
        (status = 200, description = "Dashboard retrieved successfully", body = ApiResponse<DashboardSummary>),
        (status = 303, description = "Not signed in as a superuser, redirect to login"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    axum::Extension(actor): Actor,
) -> Result<Json<ApiResponse<DashboardSummary>>, ApiError> {
    trace!("Entering get_dashboard function");

    let summary = summarize(&state.registry, chrono::Utc::now())
        .await
        .map_err(|e| ErrorResponse::from_registry(&e))?;

    debug!(
        "Dashboard for '{}': {} users, {} datasets",
        actor.username, summary.total_users, summary.total_datasets
    );
    Ok(ApiResponse::ok(summary, "Dashboard retrieved successfully"))
}
