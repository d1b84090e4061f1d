use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use tokio::net::TcpListener;
use tracing::{info, debug, trace, error, warn};

use crate::config::{Settings, initialize_app_state};
use crate::router::create_router;

pub async fn serve(settings: Settings, migrate: bool) -> Result<()> {
    trace!("Entering serve function");
    info!("SalesPulse admin panel starting up");
    debug!("Database URL: {}", settings.redacted_database_url());
    debug!("Bind address: {}", settings.bind_address);
    debug!("Media root: {}", settings.media_root.display());

    if settings.debug {
        warn!("Debug mode is enabled, do not use it in production");
    }

    let bind_address = settings.bind_address.clone();

    // Initialize application state
    trace!("Initializing application state");
    let state = match initialize_app_state(settings).await {
        Ok(state) => {
            debug!("Application state initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    if migrate {
        info!("Running database migrations");
        if let Err(e) = Migrator::up(state.registry.connection(), None).await {
            error!("Failed to run database migrations: {}", e);
            return Err(e.into());
        }
        debug!("All pending migrations have been applied");
    }

    match state.registry.purge_expired_sessions().await {
        Ok(purged) => debug!("Removed {} expired sessions", purged),
        Err(e) => warn!("Could not purge expired sessions: {}", e),
    }

    // Create router
    trace!("Creating application router");
    let app = create_router(state);
    debug!("Router created successfully");

    // Start server
    info!("Starting server on {}", bind_address);
    trace!("Attempting to bind TCP listener to {}", bind_address);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            debug!("Successfully bound to address: {}", bind_address);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_address, e);
            return Err(e.into());
        }
    };

    info!("Admin panel running on http://{}/admin-panel/", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);
    debug!("Server is ready to accept connections");

    trace!("Starting axum server");
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
