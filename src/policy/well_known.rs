/// Well-known group and role resolution
///
/// The privileged group and the two synchronized roles are configured by name and
/// resolved into typed handles. The latest resolution is published through ArcSwap;
/// the validator and the form hook read it without touching the database, and every
/// role synchronization re-resolves and republishes it.

use crate::config::PolicyConfig;
use crate::project::store;
use crate::project::types::{GroupId, RoleId};
use arc_swap::ArcSwap;
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;

/// Named policy objects the service depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnown {
    /// Group whose active members may be offered as managers
    ManagerGroup,
    ManagerRole,
    MemberRole,
}

impl WellKnown {
    pub fn name<'a>(&self, policy: &'a PolicyConfig) -> &'a str {
        match self {
            Self::ManagerGroup => &policy.manager_group,
            Self::ManagerRole => &policy.manager_role,
            Self::MemberRole => &policy.member_role,
        }
    }
}

/// Resolved identities of the well-known objects (None when not provisioned)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedHandles {
    pub manager_group: Option<GroupId>,
    pub manager_role: Option<RoleId>,
    pub member_role: Option<RoleId>,
}

impl ResolvedHandles {
    /// Both synchronized roles, when both exist
    pub fn roles(&self) -> Option<(RoleId, RoleId)> {
        Some((self.manager_role?, self.member_role?))
    }
}

/// Hot-swappable registry of resolved well-known handles
#[derive(Debug)]
pub struct WellKnownRegistry {
    policy: PolicyConfig,
    handles: ArcSwap<ResolvedHandles>,
}

impl WellKnownRegistry {
    pub fn new(policy: PolicyConfig) -> Self {
        Self {
            policy,
            handles: ArcSwap::new(Arc::new(ResolvedHandles::default())),
        }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn name(&self, object: WellKnown) -> &str {
        object.name(&self.policy)
    }

    /// Last published resolution (lock-free read)
    pub fn current(&self) -> Arc<ResolvedHandles> {
        self.handles.load_full()
    }

    /// Re-resolve every handle by name and publish the result
    pub async fn reload(&self, conn: &mut SqliteConnection) -> Result<ResolvedHandles, sqlx::Error> {
        let manager_group = store::find_group_by_name(&mut *conn, self.name(WellKnown::ManagerGroup))
            .await?
            .map(|g| g.id);
        let manager_role = store::find_role_by_name(&mut *conn, self.name(WellKnown::ManagerRole))
            .await?
            .map(|r| r.id);
        let member_role = store::find_role_by_name(&mut *conn, self.name(WellKnown::MemberRole))
            .await?
            .map(|r| r.id);

        let handles = ResolvedHandles {
            manager_group,
            manager_role,
            member_role,
        };

        if *self.handles.load_full() != handles {
            tracing::debug!("🔄 Well-known handles changed: {:?}", handles);
        }
        self.handles.store(Arc::new(handles));

        Ok(handles)
    }
}
