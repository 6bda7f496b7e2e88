/// Project data layer
/// 
/// Domain types and SQLite persistence for projects, users, groups, roles,
/// and memberships. Schema changes are applied as versioned migrations.

pub mod database;
pub mod store;
pub mod types;

pub use database::Database;
pub use store::{NewUser, Store};
pub use types::{Membership, Project, ProjectChanges, User};
