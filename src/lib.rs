/// pmsync: project manager assignment with membership role synchronization
/// 
/// This library assigns a designated manager to each project, gates the change on the
/// `assign_project_manager` capability, and keeps project membership roles in step with
/// the assignment after every committed save.

// Core configuration and setup
pub mod config;

// Typed errors for assignment and membership persistence
pub mod error;

// Project data layer - domain types, SQLite persistence, and schema migrations
pub mod project;

// Policy layer - permission registration and well-known group/role resolution
pub mod policy;

// Manager assignment - authorization gate, validation, two-phase save, role sync
pub mod assignment;

// HTTP API layer - REST endpoints for projects and directory administration
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use assignment::{ManagerAssignment, Principal, SyncReport, SyncStep};
pub use error::{AssignmentError, ValidationError};
pub use project::{Database, Project, Store};
pub use server::start_server;
