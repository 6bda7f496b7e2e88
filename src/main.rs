/// pmsync: project manager assignment service
/// 
/// Main entry point for the pmsync server. Loads configuration from the environment
/// and starts the HTTP server.

use pmsync::{config::Config, server::start_server};

/// Application entry point
/// 
/// The server provides:
/// - Project API at /api/projects/*
/// - Directory administration at /api/users, /api/groups, /api/roles
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3004 and data/pmsync.db)
    let config = Config::default();
    
    // Start the server
    start_server(config).await?;
    
    Ok(())
}
