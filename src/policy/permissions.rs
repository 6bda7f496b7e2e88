/// Capability declarations and permission registry
///
/// A capability is a named permission checked against a principal and a project.
/// Roles can only be granted permissions that are registered here.

use serde::Serialize;
use std::fmt;

/// Capabilities checked by this service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Change the project manager field of a project
    AssignProjectManager,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AssignProjectManager => "assign_project_manager",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who may hold a permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// Granted through a role on a project membership (administrators always hold it)
    Member,
    /// Held by administrators only
    Admin,
}

/// A registered permission
#[derive(Debug, Clone, Serialize)]
pub struct PermissionDef {
    pub name: &'static str,
    /// Project actions the permission guards, as "controller#action"
    pub project_actions: Vec<&'static str>,
    pub require: Requirement,
}

/// Registry of every permission known to the service
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    permissions: Vec<PermissionDef>,
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        let mut registry = Self {
            permissions: Vec::new(),
        };
        registry.register(PermissionDef {
            name: Capability::AssignProjectManager.name(),
            project_actions: vec!["projects#edit"],
            require: Requirement::Member,
        });
        registry
    }
}

impl PermissionRegistry {
    /// Register a permission, replacing any previous definition with the same name
    pub fn register(&mut self, permission: PermissionDef) {
        self.permissions.retain(|p| p.name != permission.name);
        self.permissions.push(permission);
    }

    pub fn lookup(&self, name: &str) -> Option<&PermissionDef> {
        self.permissions.iter().find(|p| p.name == name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Requirement for a capability; unregistered capabilities need an administrator
    pub fn requirement(&self, capability: Capability) -> Requirement {
        self.lookup(capability.name())
            .map(|p| p.require)
            .unwrap_or(Requirement::Admin)
    }

    pub fn all(&self) -> &[PermissionDef] {
        &self.permissions
    }
}
