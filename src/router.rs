use crate::gate::{check_allowed_host, require_superuser};
use crate::handlers::{
    auth::{admin_index, login, login_page, logout},
    dashboard::get_dashboard,
    datasets::{delete_dataset, get_dataset, get_datasets},
    health::health_check,
    settings::get_settings,
    users::{delete_user, get_user, get_users, toggle_user_active},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Every route here requires an active superuser session
    let admin_routes = Router::new()
        .route("/admin-panel/", get(admin_index))
        .route("/admin-panel/logout/", post(logout))
        .route("/admin-panel/dashboard/", get(get_dashboard))
        // User registry
        .route("/admin-panel/users/", get(get_users))
        .route("/admin-panel/users/:user_id/", get(get_user))
        .route("/admin-panel/users/:user_id/toggle/", post(toggle_user_active))
        .route("/admin-panel/users/:user_id/delete/", post(delete_user))
        // Dataset registry
        .route("/admin-panel/datasets/", get(get_datasets))
        .route("/admin-panel/datasets/:dataset_id/", get(get_dataset))
        .route("/admin-panel/datasets/:dataset_id/delete/", post(delete_dataset))
        // System settings
        .route("/admin-panel/settings/", get(get_settings))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_superuser,
        ));

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/admin-panel/login/", get(login_page).post(login))
        .merge(admin_routes)
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    check_allowed_host,
                )),
        )
        .with_state(state)
}
