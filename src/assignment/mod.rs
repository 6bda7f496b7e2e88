/// Project manager assignment
/// 
/// The save pipeline for a project's manager field:
/// - Authorization gate (`assign_project_manager` capability)
/// - Eligibility validation (manager required once the privileged group exists)
/// - Two-phase save: validate-and-commit, then post-commit role synchronization
/// - Form hook offering the privileged group's active users as candidates

pub mod form_hook;
pub mod gate;
pub mod principal;
pub mod service;
pub mod sync;
pub mod validator;

pub use form_hook::{render_manager_field, ManagerField};
pub use gate::AuthorizationGate;
pub use principal::Principal;
pub use service::{CommittedUpdate, ManagerAssignment, SaveOutcome};
pub use sync::{RoleSynchronizer, SyncReport, SyncStep};
