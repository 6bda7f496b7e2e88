/// Authorization gate for project manager assignment
///
/// Decides whether a principal holds a capability on a project. Anonymous and
/// locked principals hold nothing, archived projects allow no edit capability,
/// administrators hold everything else, and members hold what their roles grant.

use crate::assignment::principal::Principal;
use crate::error::ValidationError;
use crate::policy::permissions::{Capability, PermissionRegistry, Requirement};
use crate::project::store;
use crate::project::types::Project;
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    permissions: Arc<PermissionRegistry>,
}

impl AuthorizationGate {
    pub fn new(permissions: Arc<PermissionRegistry>) -> Self {
        Self { permissions }
    }

    pub fn permissions(&self) -> &PermissionRegistry {
        &self.permissions
    }

    /// Whether `principal` holds `capability` on `project`
    pub async fn allowed_to(
        &self,
        conn: &mut SqliteConnection,
        principal: &Principal,
        capability: Capability,
        project: &Project,
    ) -> Result<bool, sqlx::Error> {
        let Some(user) = principal.user() else {
            return Ok(false);
        };
        if !user.is_active() || !project.is_active() {
            return Ok(false);
        }
        if user.admin {
            return Ok(true);
        }

        match self.permissions.requirement(capability) {
            Requirement::Admin => Ok(false),
            Requirement::Member => {
                store::member_holds_permission(conn, user.id, project.id, capability.name()).await
            }
        }
    }

    /// Gate an update of the persisted project on `assign_project_manager`
    ///
    /// Returns the validation error to attach when the principal is denied.
    pub async fn check_assign_permission(
        &self,
        conn: &mut SqliteConnection,
        principal: &Principal,
        project: &Project,
    ) -> Result<Option<ValidationError>, sqlx::Error> {
        if self
            .allowed_to(conn, principal, Capability::AssignProjectManager, project)
            .await?
        {
            return Ok(None);
        }

        tracing::warn!(
            "🚫 User {} may not update project {} without assign_project_manager",
            principal.login(),
            project.identifier
        );
        Ok(Some(ValidationError::NoPermissionToAssignProjectManager))
    }
}
