/// Server setup and initialization
/// 
/// Wires together all components: database, manager assignment service, and HTTP routes.
/// Provides the main application factory function for creating the Axum app.

use crate::{
    api::{create_directory_routes, create_project_routes, AppState},
    assignment::ManagerAssignment,
    config::Config,
    policy::PermissionRegistry,
    project::{Database, Store},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes
/// 
/// Opens the database (applying migrations), registers permissions, resolves the
/// well-known group and roles, and builds the HTTP router.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("🗄️ Initializing database");
    let database = Database::connect(&config.database.path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;

    tracing::info!("🔐 Registering permissions");
    let permissions = Arc::new(PermissionRegistry::default());
    for permission in permissions.all() {
        tracing::debug!("Registered permission {} ({:?})", permission.name, permission.require);
    }

    tracing::info!("👥 Initializing manager assignment service");
    let assignment = ManagerAssignment::new(Store::new(&database), config.policy.clone(), permissions);

    let handles = assignment
        .refresh_well_known()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to resolve well-known groups and roles: {}", e))?;
    if handles.manager_group.is_none() {
        tracing::info!(
            "Group '{}' does not exist yet; project manager assignment is not provisioned",
            config.policy.manager_group
        );
    }

    let app = router(AppState { assignment });

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Build the HTTP router for an application state
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Project and manager assignment routes
        .merge(create_project_routes().with_state(state.clone()))
        // Administrator directory routes
        .merge(create_directory_routes().with_state(state))
}

/// Start the HTTP server with the given configuration
/// 
/// Creates the application and starts the Axum server on the configured address and port.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting pmsync server...");
    
    // Create the application
    let app = create_app(config.clone()).await?;

    // Bind to the configured address
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    
    tracing::info!("Server listening on http://{}", bind_addr);

    // Start the server
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
