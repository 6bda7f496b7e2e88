/// Two-phase project save with manager assignment
///
/// Phase one (`validate_and_commit`) runs inside a single transaction: load the
/// persisted project, snapshot its manager, gate the update, validate the candidate,
/// and write. Every update is gated, whichever fields it touches. Any validation error rolls the transaction back.
/// Phase two (`synchronize_roles`) reconciles membership roles after the commit.

use crate::assignment::gate::AuthorizationGate;
use crate::assignment::principal::Principal;
use crate::assignment::sync::{RoleSynchronizer, SyncReport};
use crate::assignment::validator::validate_project;
use crate::config::PolicyConfig;
use crate::error::AssignmentError;
use crate::policy::permissions::PermissionRegistry;
use crate::policy::well_known::WellKnownRegistry;
use crate::project::store::{self, Store};
use crate::project::types::{NewProject, Project, ProjectChanges, ProjectId, UserId};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// A committed project save with the manager it replaced
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedUpdate {
    pub project: Project,
    /// Manager as persisted before this save
    pub previous_manager: Option<UserId>,
}

/// Result of a full save: the committed project and what role sync did
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub project: Project,
    pub sync: SyncReport,
}

/// Manager assignment service shared by the API handlers
#[derive(Debug, Clone)]
pub struct ManagerAssignment {
    store: Store,
    gate: AuthorizationGate,
    well_known: Arc<WellKnownRegistry>,
    synchronizer: RoleSynchronizer,
}

impl ManagerAssignment {
    pub fn new(store: Store, policy: PolicyConfig, permissions: Arc<PermissionRegistry>) -> Self {
        let well_known = Arc::new(WellKnownRegistry::new(policy));
        Self {
            gate: AuthorizationGate::new(permissions),
            synchronizer: RoleSynchronizer::new(store.clone(), Arc::clone(&well_known)),
            store,
            well_known,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn well_known(&self) -> &WellKnownRegistry {
        &self.well_known
    }

    /// Resolve the well-known group and roles and publish them
    pub async fn refresh_well_known(&self) -> Result<crate::policy::ResolvedHandles, AssignmentError> {
        let mut conn = self.store.pool().acquire().await?;
        Ok(self.well_known.reload(&mut conn).await?)
    }

    /// Create a project and synchronize its manager's roles
    ///
    /// Creation runs the eligibility validator but not the authorization gate.
    pub async fn create_project(&self, project: NewProject) -> Result<SaveOutcome, AssignmentError> {
        let mut tx = self.store.begin().await?;

        let now = Utc::now();
        let candidate = Project {
            id: ProjectId(0),
            identifier: project.identifier.clone(),
            name: project.name.clone(),
            status: crate::project::types::ProjectStatus::Active,
            project_manager_id: project.project_manager_id,
            created_on: now,
            updated_on: now,
        };

        let errors = validate_project(&mut tx, &self.well_known, &candidate).await?;
        if !errors.is_empty() {
            tracing::warn!("⚠️ Rejected project '{}': {:?}", project.identifier, errors);
            return Err(AssignmentError::Validation(errors));
        }

        let created = store::insert_project(&mut tx, &project, now)
            .await
            .map_err(|e| conflict_or_storage(e, &project.identifier))?;
        tx.commit().await?;

        tracing::info!("🆕 Created project {} ({})", created.identifier, created.id);

        let sync = self
            .synchronize_roles(created.id, None, created.project_manager_id)
            .await;
        Ok(SaveOutcome { project: created, sync })
    }

    /// Phase one of an update: gate, validate, snapshot, and commit
    pub async fn validate_and_commit(
        &self,
        principal: &Principal,
        project_id: ProjectId,
        changes: &ProjectChanges,
    ) -> Result<CommittedUpdate, AssignmentError> {
        let mut tx = self.store.begin().await?;

        let persisted = store::find_project(&mut tx, project_id)
            .await?
            .ok_or(AssignmentError::ProjectNotFound(project_id))?;
        let previous_manager = persisted.project_manager_id;
        let candidate = changes.apply_to(&persisted);

        let mut errors = Vec::new();
        if let Some(denied) = self.gate.check_assign_permission(&mut tx, principal, &persisted).await? {
            errors.push(denied);
        }
        errors.extend(validate_project(&mut tx, &self.well_known, &candidate).await?);

        if !errors.is_empty() {
            tracing::warn!(
                "⚠️ Rejected update of project {} by {}: {:?}",
                persisted.identifier,
                principal.login(),
                errors
            );
            return Err(AssignmentError::Validation(errors));
        }

        let project = store::update_project(&mut tx, &candidate, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(
            "💾 Updated project {} (manager {:?} -> {:?})",
            project.identifier,
            previous_manager,
            project.project_manager_id
        );

        Ok(CommittedUpdate {
            project,
            previous_manager,
        })
    }

    /// Phase two of a save: reconcile membership roles
    pub async fn synchronize_roles(
        &self,
        project_id: ProjectId,
        previous_manager: Option<UserId>,
        new_manager: Option<UserId>,
    ) -> SyncReport {
        self.synchronizer
            .synchronize(project_id, previous_manager, new_manager)
            .await
    }

    /// Update a project and synchronize roles
    pub async fn update_project(
        &self,
        principal: &Principal,
        project_id: ProjectId,
        changes: &ProjectChanges,
    ) -> Result<SaveOutcome, AssignmentError> {
        let committed = self.validate_and_commit(principal, project_id, changes).await?;
        let sync = self
            .synchronize_roles(
                committed.project.id,
                committed.previous_manager,
                committed.project.project_manager_id,
            )
            .await;

        Ok(SaveOutcome {
            project: committed.project,
            sync,
        })
    }
}

fn conflict_or_storage(error: sqlx::Error, what: &str) -> AssignmentError {
    let unique = error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        AssignmentError::Conflict(format!("'{}' already exists", what))
    } else {
        AssignmentError::Storage(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::project::types::ProjectStatus;
    use crate::project::{Database, NewUser};

    async fn service() -> ManagerAssignment {
        let db = Database::in_memory().await.unwrap();
        ManagerAssignment::new(
            Store::new(&db),
            PolicyConfig::default(),
            Arc::new(PermissionRegistry::default()),
        )
    }

    fn new_project(identifier: &str) -> NewProject {
        NewProject {
            identifier: identifier.to_string(),
            name: identifier.to_uppercase(),
            project_manager_id: None,
        }
    }

    #[tokio::test]
    async fn create_skips_gate_but_validates() {
        let svc = service().await;
        let outcome = svc.create_project(new_project("alpha")).await.unwrap();
        assert_eq!(outcome.project.project_manager_id, None);

        svc.store().create_group("GROUP_PROJECT_MANAGERS").await.unwrap();
        svc.refresh_well_known().await.unwrap();
        let err = svc.create_project(new_project("beta")).await.unwrap_err();
        assert_eq!(err.validation_errors(), &[ValidationError::ProjectManagerBlank]);
    }

    #[tokio::test]
    async fn duplicate_identifier_is_a_conflict() {
        let svc = service().await;
        svc.create_project(new_project("alpha")).await.unwrap();
        let err = svc.create_project(new_project("alpha")).await.unwrap_err();
        assert!(matches!(err, AssignmentError::Conflict(_)));
    }

    #[tokio::test]
    async fn snapshot_reports_persisted_manager() {
        let svc = service().await;
        let mut admin = NewUser::active("root", "Root", "Admin");
        admin.admin = true;
        let admin = Principal::from(svc.store().create_user(&admin).await.unwrap());
        let first = svc.store().create_user(&NewUser::active("a", "A", "One")).await.unwrap();
        let second = svc.store().create_user(&NewUser::active("b", "B", "Two")).await.unwrap();

        let mut project = new_project("alpha");
        project.project_manager_id = Some(first.id);
        let created = svc.create_project(project).await.unwrap().project;

        let committed = svc
            .validate_and_commit(&admin, created.id, &ProjectChanges::assign_manager(Some(second.id)))
            .await
            .unwrap();
        assert_eq!(committed.previous_manager, Some(first.id));
        assert_eq!(committed.project.project_manager_id, Some(second.id));
    }

    #[tokio::test]
    async fn rename_or_archive_without_capability_is_rejected() {
        let svc = service().await;
        let created = svc.create_project(new_project("alpha")).await.unwrap().project;
        let member = svc.store().create_user(&NewUser::active("m", "Mem", "Ber")).await.unwrap();
        let changes = ProjectChanges {
            name: Some("Hijacked".to_string()),
            status: Some(ProjectStatus::Archived),
            ..ProjectChanges::default()
        };

        for principal in [Principal::Anonymous, Principal::from(member)] {
            let err = svc.update_project(&principal, created.id, &changes).await.unwrap_err();
            assert_eq!(err.validation_errors(), &[ValidationError::NoPermissionToAssignProjectManager]);
        }

        let persisted = svc.store().project(created.id).await.unwrap().unwrap();
        assert_eq!(persisted.name, "ALPHA");
        assert_eq!(persisted.status, ProjectStatus::Active);
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let svc = service().await;
        let err = svc
            .update_project(&Principal::Anonymous, ProjectId(99), &ProjectChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssignmentError::ProjectNotFound(ProjectId(99))));
    }
}
