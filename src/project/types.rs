/// Domain type definitions for projects, users, groups, roles, and memberships
///
/// Row types derive `sqlx::FromRow` so the store can map query results directly.
/// Identifiers are transparent newtypes over SQLite integer keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

macro_rules! id_type {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
            #[serde(transparent)]
            #[sqlx(transparent)]
            pub struct $name(pub i64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

id_type!(UserId, GroupId, RoleId, ProjectId, MembershipId);

/// Account status of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Registered,
    Locked,
}

/// A user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub firstname: String,
    pub lastname: String,
    /// Administrators hold every project capability
    pub admin: bool,
    pub status: UserStatus,
}

impl User {
    /// Full display name ("Firstname Lastname")
    pub fn name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// A named collection of users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

/// A named permission bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// Builtin roles describe implicit principals and cannot be given through a membership
    pub builtin: bool,
}

/// Lifecycle status of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Archived,
}

/// A project with an optional designated manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: ProjectId,
    /// URL-safe unique identifier (e.g., "ecommerce")
    pub identifier: String,
    pub name: String,
    pub status: ProjectStatus,
    pub project_manager_id: Option<UserId>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }
}

/// A user's membership on a project with its role set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Membership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    /// Sorted, de-duplicated role ids
    pub role_ids: Vec<RoleId>,
    pub created_on: DateTime<Utc>,
}

impl Membership {
    pub fn has_role(&self, role_id: RoleId) -> bool {
        self.role_ids.contains(&role_id)
    }
}

/// Attributes for a new project
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub project_manager_id: Option<UserId>,
}

/// Changeset for a project update
///
/// `project_manager_id` distinguishes an absent field (`None`) from an explicit
/// assignment (`Some(None)` clears the manager, `Some(Some(id))` sets it).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default, deserialize_with = "present_field")]
    pub project_manager_id: Option<Option<UserId>>,
}

impl ProjectChanges {
    /// Changeset that only assigns the manager
    pub fn assign_manager(manager: Option<UserId>) -> Self {
        Self {
            project_manager_id: Some(manager),
            ..Self::default()
        }
    }

    /// Apply the changeset to a copy of the persisted project
    pub fn apply_to(&self, project: &Project) -> Project {
        let mut candidate = project.clone();
        if let Some(name) = &self.name {
            candidate.name = name.clone();
        }
        if let Some(status) = self.status {
            candidate.status = status;
        }
        if let Some(manager) = self.project_manager_id {
            candidate.project_manager_id = manager;
        }
        candidate
    }
}

/// Deserialize a field that is present (possibly `null`) into `Some(..)`
fn present_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
