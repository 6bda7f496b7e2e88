/// HTTP API Layer
/// 
/// This module provides the REST API endpoints for project manager assignment.
/// It handles:
/// - Project create/read/update with gated, validated manager changes
/// - The manager selection field of the project edit form
/// - Administrator provisioning of users, groups, roles, and memberships

use crate::assignment::ManagerAssignment;

// Project endpoints (create/get/update, memberships, manager field)
pub mod projects;

// Administrator-only directory endpoints
pub mod directory;

// Acting principal extraction from request headers
pub mod principal;

// HTTP status mapping for assignment errors
pub mod error;

// Re-export router builders
pub use directory::create_directory_routes;
pub use projects::create_project_routes;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Manager assignment service (store, gate, well-known registry, synchronizer)
    pub assignment: ManagerAssignment,
}
