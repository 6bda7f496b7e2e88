/// Post-commit membership role synchronization
///
/// Runs after a project save has committed. The outgoing manager's role set is
/// replaced by exactly {Member}; the incoming manager gains ProjectManager on top of
/// whatever roles they already hold, or receives a new membership with {ProjectManager}.
///
/// Each membership write is its own transaction and nothing here is rolled back with
/// the project save. Failures are logged and reported, never returned as errors.

use crate::policy::well_known::{WellKnown, WellKnownRegistry};
use crate::project::store::Store;
use crate::project::types::{ProjectId, RoleId, UserId};
use serde::Serialize;
use std::sync::Arc;

/// What the synchronizer did for one committed save
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncReport {
    /// A well-known group or role is missing; nothing was touched
    NotProvisioned { missing: String },
    /// Well-known objects could not be resolved
    Aborted { reason: String },
    Applied { steps: Vec<SyncStep> },
}

impl SyncReport {
    pub fn steps(&self) -> &[SyncStep] {
        match self {
            Self::Applied { steps } => steps,
            _ => &[],
        }
    }

    /// Whether any membership write failed
    pub fn has_failures(&self) -> bool {
        matches!(self, Self::Aborted { .. })
            || self.steps().iter().any(|s| matches!(s, SyncStep::Failed { .. }))
    }
}

/// A single reconciliation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncStep {
    /// Previous manager's roles replaced by {Member}
    Demoted { user_id: UserId },
    /// Previous manager had no membership on the project
    NothingToDemote { user_id: UserId },
    /// ProjectManager granted; `created` when a new membership was made
    Promoted { user_id: UserId, created: bool },
    /// New manager already held ProjectManager
    AlreadyManager { user_id: UserId },
    /// The project was saved without a manager
    ManagerMissing,
    Failed { user_id: UserId, reason: String },
}

#[derive(Debug, Clone)]
pub struct RoleSynchronizer {
    store: Store,
    well_known: Arc<WellKnownRegistry>,
}

impl RoleSynchronizer {
    pub fn new(store: Store, well_known: Arc<WellKnownRegistry>) -> Self {
        Self { store, well_known }
    }

    /// Reconcile membership roles for the previous and current manager of a project
    pub async fn synchronize(
        &self,
        project_id: ProjectId,
        previous: Option<UserId>,
        current: Option<UserId>,
    ) -> SyncReport {
        let handles = match self.resolve().await {
            Ok(handles) => handles,
            Err(e) => {
                tracing::error!("❌ Failed to resolve well-known groups and roles for project {}: {}", project_id, e);
                return SyncReport::Aborted { reason: e.to_string() };
            }
        };

        if handles.manager_group.is_none() {
            let name = self.well_known.name(WellKnown::ManagerGroup);
            tracing::info!("Group '{}' does not exist. Skipping role assignment.", name);
            return SyncReport::NotProvisioned { missing: name.to_string() };
        }

        let Some((manager_role, member_role)) = handles.roles() else {
            let missing = if handles.manager_role.is_none() {
                WellKnown::ManagerRole
            } else {
                WellKnown::MemberRole
            };
            return self.missing_role(missing);
        };

        let mut steps = Vec::new();

        if let Some(previous) = previous.filter(|p| Some(*p) != current) {
            steps.push(self.demote(project_id, previous, member_role).await);
        }

        match current {
            Some(manager) => steps.push(self.promote(project_id, manager, manager_role).await),
            None => {
                tracing::error!("Project {} has no project manager. Cannot assign roles.", project_id);
                steps.push(SyncStep::ManagerMissing);
            }
        }

        SyncReport::Applied { steps }
    }

    async fn resolve(&self) -> Result<crate::policy::ResolvedHandles, sqlx::Error> {
        let mut conn = self.store.pool().acquire().await?;
        self.well_known.reload(&mut conn).await
    }

    fn missing_role(&self, role: WellKnown) -> SyncReport {
        let name = self.well_known.name(role);
        tracing::info!("Role '{}' does not exist. Skipping role assignment.", name);
        SyncReport::NotProvisioned { missing: name.to_string() }
    }

    async fn demote(&self, project_id: ProjectId, user_id: UserId, member_role: RoleId) -> SyncStep {
        match self.store.membership(user_id, project_id).await {
            Ok(Some(_)) => match self.store.save_membership(user_id, project_id, &[member_role]).await {
                Ok(_) => {
                    tracing::info!("⬇️ Demoted user {} to member on project {}", user_id, project_id);
                    SyncStep::Demoted { user_id }
                }
                Err(e) => failed(user_id, project_id, e),
            },
            Ok(None) => {
                tracing::debug!("User {} has no membership on project {}; nothing to demote", user_id, project_id);
                SyncStep::NothingToDemote { user_id }
            }
            Err(e) => failed(user_id, project_id, e),
        }
    }

    async fn promote(&self, project_id: ProjectId, user_id: UserId, manager_role: RoleId) -> SyncStep {
        let existing = match self.store.membership(user_id, project_id).await {
            Ok(existing) => existing,
            Err(e) => return failed(user_id, project_id, e),
        };

        let (roles, created) = match existing {
            Some(membership) if membership.has_role(manager_role) => {
                return SyncStep::AlreadyManager { user_id };
            }
            Some(membership) => {
                let mut roles = membership.role_ids;
                roles.push(manager_role);
                (roles, false)
            }
            None => (vec![manager_role], true),
        };

        match self.store.save_membership(user_id, project_id, &roles).await {
            Ok(_) => {
                tracing::info!("✅ Assigned project manager role to user {} on project {}", user_id, project_id);
                SyncStep::Promoted { user_id, created }
            }
            Err(e) => failed(user_id, project_id, e),
        }
    }
}

fn failed(user_id: UserId, project_id: ProjectId, error: impl std::fmt::Display) -> SyncStep {
    tracing::error!(
        "❌ Error assigning project roles to user {} on project {}: {}",
        user_id,
        project_id,
        error
    );
    SyncStep::Failed {
        user_id,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::project::types::{NewProject, Project, Role};
    use crate::project::{Database, NewUser};
    use pretty_assertions::assert_eq;

    struct Fixture {
        store: Store,
        sync: RoleSynchronizer,
        project: Project,
    }

    async fn fixture() -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let store = Store::new(&db);
        let project = store
            .insert_project(&NewProject {
                identifier: "alpha".to_string(),
                name: "Alpha".to_string(),
                project_manager_id: None,
            })
            .await
            .unwrap();
        let registry = Arc::new(WellKnownRegistry::new(PolicyConfig::default()));
        let sync = RoleSynchronizer::new(store.clone(), registry);
        Fixture { store, sync, project }
    }

    async fn provision(f: &Fixture) -> (Role, Role) {
        f.store.create_group("GROUP_PROJECT_MANAGERS").await.unwrap();
        let manager = f.store.create_role("ProjectManager", false).await.unwrap();
        let member = f.store.create_role("Member", false).await.unwrap();
        (manager, member)
    }

    #[tokio::test]
    async fn skips_without_privileged_group() {
        let f = fixture().await;
        let user = f.store.create_user(&NewUser::active("u1", "U", "One")).await.unwrap();

        let report = f.sync.synchronize(f.project.id, None, Some(user.id)).await;
        assert_eq!(
            report,
            SyncReport::NotProvisioned { missing: "GROUP_PROJECT_MANAGERS".to_string() }
        );
        assert!(f.store.project_memberships(f.project.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_when_a_role_is_missing() {
        let f = fixture().await;
        f.store.create_group("GROUP_PROJECT_MANAGERS").await.unwrap();
        f.store.create_role("ProjectManager", false).await.unwrap();
        let user = f.store.create_user(&NewUser::active("u1", "U", "One")).await.unwrap();

        let report = f.sync.synchronize(f.project.id, None, Some(user.id)).await;
        assert_eq!(report, SyncReport::NotProvisioned { missing: "Member".to_string() });
    }

    #[tokio::test]
    async fn demotes_previous_and_creates_membership_for_new_manager() {
        let f = fixture().await;
        let (manager, member) = provision(&f).await;
        let old = f.store.create_user(&NewUser::active("old", "Old", "Manager")).await.unwrap();
        let new = f.store.create_user(&NewUser::active("new", "New", "Manager")).await.unwrap();
        f.store.save_membership(old.id, f.project.id, &[manager.id]).await.unwrap();

        let report = f.sync.synchronize(f.project.id, Some(old.id), Some(new.id)).await;
        assert_eq!(
            report.steps(),
            &[
                SyncStep::Demoted { user_id: old.id },
                SyncStep::Promoted { user_id: new.id, created: true },
            ]
        );

        let old_roles = f.store.membership(old.id, f.project.id).await.unwrap().unwrap().role_ids;
        let new_roles = f.store.membership(new.id, f.project.id).await.unwrap().unwrap().role_ids;
        assert_eq!(old_roles, vec![member.id]);
        assert_eq!(new_roles, vec![manager.id]);
    }

    #[tokio::test]
    async fn demotion_overwrites_other_roles() {
        let f = fixture().await;
        let (manager, member) = provision(&f).await;
        let reviewer = f.store.create_role("Reviewer", false).await.unwrap();
        let old = f.store.create_user(&NewUser::active("old", "Old", "Manager")).await.unwrap();
        let new = f.store.create_user(&NewUser::active("new", "New", "Manager")).await.unwrap();
        f.store
            .save_membership(old.id, f.project.id, &[manager.id, reviewer.id])
            .await
            .unwrap();

        f.sync.synchronize(f.project.id, Some(old.id), Some(new.id)).await;

        let old_roles = f.store.membership(old.id, f.project.id).await.unwrap().unwrap().role_ids;
        assert_eq!(old_roles, vec![member.id]);
    }

    #[tokio::test]
    async fn previous_manager_without_membership_is_left_alone() {
        let f = fixture().await;
        provision(&f).await;
        let old = f.store.create_user(&NewUser::active("old", "Old", "Manager")).await.unwrap();
        let new = f.store.create_user(&NewUser::active("new", "New", "Manager")).await.unwrap();

        let report = f.sync.synchronize(f.project.id, Some(old.id), Some(new.id)).await;
        assert_eq!(report.steps()[0], SyncStep::NothingToDemote { user_id: old.id });
        assert!(f.store.membership(old.id, f.project.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn promotion_preserves_existing_roles_and_is_idempotent() {
        let f = fixture().await;
        let (manager, member) = provision(&f).await;
        let reviewer = f.store.create_role("Reviewer", false).await.unwrap();
        let user = f.store.create_user(&NewUser::active("b", "B", "Lead")).await.unwrap();
        f.store
            .save_membership(user.id, f.project.id, &[member.id, reviewer.id])
            .await
            .unwrap();

        let first = f.sync.synchronize(f.project.id, None, Some(user.id)).await;
        assert_eq!(first.steps(), &[SyncStep::Promoted { user_id: user.id, created: false }]);

        let second = f.sync.synchronize(f.project.id, None, Some(user.id)).await;
        assert_eq!(second.steps(), &[SyncStep::AlreadyManager { user_id: user.id }]);

        let roles = f.store.membership(user.id, f.project.id).await.unwrap().unwrap().role_ids;
        assert_eq!(roles, vec![manager.id, member.id, reviewer.id]);
    }

    #[tokio::test]
    async fn unchanged_manager_keeps_role_set() {
        let f = fixture().await;
        let (manager, _member) = provision(&f).await;
        let user = f.store.create_user(&NewUser::active("a", "A", "Lead")).await.unwrap();
        f.store.save_membership(user.id, f.project.id, &[manager.id]).await.unwrap();

        let report = f.sync.synchronize(f.project.id, Some(user.id), Some(user.id)).await;
        assert_eq!(report.steps(), &[SyncStep::AlreadyManager { user_id: user.id }]);

        let roles = f.store.membership(user.id, f.project.id).await.unwrap().unwrap().role_ids;
        assert_eq!(roles, vec![manager.id]);
    }

    #[tokio::test]
    async fn missing_new_manager_is_reported() {
        let f = fixture().await;
        let (_manager, member) = provision(&f).await;
        let old = f.store.create_user(&NewUser::active("old", "Old", "Manager")).await.unwrap();
        f.store.save_membership(old.id, f.project.id, &[member.id]).await.unwrap();

        let report = f.sync.synchronize(f.project.id, Some(old.id), None).await;
        assert_eq!(
            report.steps(),
            &[SyncStep::Demoted { user_id: old.id }, SyncStep::ManagerMissing]
        );
    }

    #[tokio::test]
    async fn membership_failure_is_reported_not_raised() {
        let f = fixture().await;
        f.store.create_group("GROUP_PROJECT_MANAGERS").await.unwrap();
        // A builtin ProjectManager role cannot be given through a membership
        f.store.create_role("ProjectManager", true).await.unwrap();
        f.store.create_role("Member", false).await.unwrap();
        let user = f.store.create_user(&NewUser::active("a", "A", "Lead")).await.unwrap();

        let report = f.sync.synchronize(f.project.id, None, Some(user.id)).await;
        assert!(report.has_failures());
        assert!(matches!(report.steps(), [SyncStep::Failed { user_id, .. }] if *user_id == user.id));
        assert!(f.store.membership(user.id, f.project.id).await.unwrap().is_none());
    }
}
