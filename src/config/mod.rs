/// Configuration management for the pmsync service
/// 
/// Handles server binding, database location, and the well-known policy names
/// (privileged group and role names) that manager assignment resolves at runtime.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration  
    pub database: DatabaseConfig,
    /// Well-known group and role names
    pub policy: PolicyConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// SQLite database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]  
pub struct DatabaseConfig {
    /// Path of the SQLite database file (default: "data/pmsync.db")
    /// Parent directories are created on startup.
    pub path: String,
}

/// Names of the policy objects resolved by name at decision time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Group whose active members are offered as project managers
    pub manager_group: String,
    /// Role granted to the assigned project manager
    pub manager_role: String,
    /// Role the outgoing project manager is demoted to
    pub member_role: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            manager_group: env_or("PMSYNC_MANAGER_GROUP", "GROUP_PROJECT_MANAGERS"),
            manager_role: env_or("PMSYNC_MANAGER_ROLE", "ProjectManager"),
            member_role: env_or("PMSYNC_MEMBER_ROLE", "Member"),
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("PMSYNC_HOST", "0.0.0.0"),
                port: std::env::var("PMSYNC_PORT")
                    .unwrap_or_else(|_| "3004".to_string())
                    .parse()
                    .unwrap_or(3004),
            },
            database: DatabaseConfig {
                path: env_or("PMSYNC_DATABASE_PATH", "data/pmsync.db"),
            },
            policy: PolicyConfig::default(),
        }
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}
