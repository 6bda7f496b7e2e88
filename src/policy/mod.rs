/// Policy layer
/// 
/// Declares the capabilities the service checks and resolves the well-known
/// group and role names it depends on:
/// - Permission registration (`assign_project_manager`)
/// - Typed well-known handles resolved by name and hot-swapped with ArcSwap

// Capability declarations and the permission registry
pub mod permissions;

// Well-known group/role resolution
pub mod well_known;

pub use permissions::{Capability, PermissionDef, PermissionRegistry};
pub use well_known::{ResolvedHandles, WellKnown, WellKnownRegistry};
