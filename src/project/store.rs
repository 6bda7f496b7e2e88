/// Persistence boundary for users, groups, roles, projects, and memberships
///
/// Row-level queries are free functions over `&mut SqliteConnection` so they can run
/// either inside a caller's transaction (validation and commit of a project update)
/// or on a pooled connection (post-commit role synchronization).
/// `Store` wraps the pool and owns the operations that manage their own transaction.

use crate::error::MembershipError;
use crate::project::database::Database;
use crate::project::types::{
    Group, GroupId, Membership, MembershipId, NewProject, Project, ProjectId, Role, RoleId, User,
    UserId, UserStatus,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteConnection};
use sqlx::{Sqlite, Transaction};

const PROJECT_COLUMNS: &str =
    "id, identifier, name, status, project_manager_id, created_on, updated_on";

/// Pool-backed store handle
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

/// Attributes for a new user
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewUser {
    pub login: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default = "default_status")]
    pub status: UserStatus,
}

fn default_status() -> UserStatus {
    UserStatus::Active
}

impl NewUser {
    pub fn active(login: &str, firstname: &str, lastname: &str) -> Self {
        Self {
            login: login.to_string(),
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
            admin: false,
            status: UserStatus::Active,
        }
    }
}

impl Store {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn user(&self, id: UserId) -> Result<Option<User>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        find_user(&mut conn, id).await
    }

    pub async fn project(&self, id: ProjectId) -> Result<Option<Project>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        find_project(&mut conn, id).await
    }

    pub async fn membership(
        &self,
        user_id: UserId,
        project_id: ProjectId,
    ) -> Result<Option<Membership>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        find_membership(&mut conn, user_id, project_id).await
    }

    pub async fn project_memberships(&self, project_id: ProjectId) -> Result<Vec<Membership>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        project_memberships(&mut conn, project_id).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (login, firstname, lastname, admin, status) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&user.login)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(user.admin)
        .bind(user.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id: UserId(id),
            login: user.login.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            admin: user.admin,
            status: user.status,
        })
    }

    pub async fn set_user_status(&self, id: UserId, status: UserStatus) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_group(&self, name: &str) -> Result<Group, sqlx::Error> {
        let id: i64 = sqlx::query_scalar("INSERT INTO groups (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(Group {
            id: GroupId(id),
            name: name.to_string(),
        })
    }

    pub async fn add_group_user(&self, group_id: GroupId, user_id: UserId) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO group_users (group_id, user_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_role(&self, name: &str, builtin: bool) -> Result<Role, sqlx::Error> {
        let id: i64 = sqlx::query_scalar("INSERT INTO roles (name, builtin) VALUES (?, ?) RETURNING id")
            .bind(name)
            .bind(builtin)
            .fetch_one(&self.pool)
            .await?;
        Ok(Role {
            id: RoleId(id),
            name: name.to_string(),
            builtin,
        })
    }

    /// Grant a permission to a role; callers check the name is registered
    pub async fn add_role_permission(&self, role_id: RoleId, permission: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission) VALUES (?, ?)")
            .bind(role_id)
            .bind(permission)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert a project row without running assignment validation
    pub async fn insert_project(&self, project: &NewProject) -> Result<Project, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        insert_project(&mut conn, project, Utc::now()).await
    }

    /// Validate and save a membership's role set
    ///
    /// Creates the (user, project) membership if it does not exist, otherwise
    /// replaces its role set. The write is a single transaction.
    pub async fn save_membership(
        &self,
        user_id: UserId,
        project_id: ProjectId,
        role_ids: &[RoleId],
    ) -> Result<Membership, MembershipError> {
        let mut tx = self.pool.begin().await?;

        let role_ids = normalize_roles(role_ids);
        validate_membership(&mut tx, user_id, &role_ids).await?;

        let member_id = match find_member_id(&mut tx, user_id, project_id).await? {
            Some(id) => {
                sqlx::query("DELETE FROM member_roles WHERE member_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                id
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO members (user_id, project_id, created_on) VALUES (?, ?, ?) RETURNING id",
                )
                .bind(user_id)
                .bind(project_id)
                .bind(Utc::now())
                .fetch_one(&mut *tx)
                .await?;
                MembershipId(id)
            }
        };

        for role_id in &role_ids {
            sqlx::query("INSERT INTO member_roles (member_id, role_id) VALUES (?, ?)")
                .bind(member_id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }

        let membership = find_membership(&mut tx, user_id, project_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;

        Ok(membership)
    }
}

/// Sorted, de-duplicated copy of a role set
pub fn normalize_roles(role_ids: &[RoleId]) -> Vec<RoleId> {
    let mut roles = role_ids.to_vec();
    roles.sort();
    roles.dedup();
    roles
}

async fn validate_membership(
    conn: &mut SqliteConnection,
    user_id: UserId,
    role_ids: &[RoleId],
) -> Result<(), MembershipError> {
    if role_ids.is_empty() {
        return Err(MembershipError::NoRoles);
    }
    if find_user(conn, user_id).await?.is_none() {
        return Err(MembershipError::UnknownUser(user_id));
    }
    for role_id in role_ids {
        let role = find_role(conn, *role_id)
            .await?
            .ok_or(MembershipError::UnknownRole(*role_id))?;
        if role.builtin {
            return Err(MembershipError::RoleNotGivable(role.name));
        }
    }
    Ok(())
}

pub async fn find_user(conn: &mut SqliteConnection, id: UserId) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, login, firstname, lastname, admin, status FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

pub async fn find_group_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>("SELECT id, name FROM groups WHERE name = ?")
        .bind(name)
        .fetch_optional(conn)
        .await
}

/// Active users of a group, ordered by name
pub async fn active_group_users(conn: &mut SqliteConnection, group_id: GroupId) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.login, u.firstname, u.lastname, u.admin, u.status
        FROM users u
        JOIN group_users gu ON gu.user_id = u.id
        WHERE gu.group_id = ? AND u.status = 'active'
        ORDER BY u.firstname, u.lastname, u.id
        "#,
    )
    .bind(group_id)
    .fetch_all(conn)
    .await
}

pub async fn find_role(conn: &mut SqliteConnection, id: RoleId) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT id, name, builtin FROM roles WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn find_role_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT id, name, builtin FROM roles WHERE name = ?")
        .bind(name)
        .fetch_optional(conn)
        .await
}

pub async fn find_project(conn: &mut SqliteConnection, id: ProjectId) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn insert_project(
    conn: &mut SqliteConnection,
    project: &NewProject,
    now: DateTime<Utc>,
) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>(&format!(
        r#"
        INSERT INTO projects (identifier, name, status, project_manager_id, created_on, updated_on)
        VALUES (?, ?, 'active', ?, ?, ?)
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(&project.identifier)
    .bind(&project.name)
    .bind(project.project_manager_id)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
}

/// Persist the mutable fields of a project
pub async fn update_project(
    conn: &mut SqliteConnection,
    project: &Project,
    now: DateTime<Utc>,
) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>(&format!(
        r#"
        UPDATE projects
        SET name = ?, status = ?, project_manager_id = ?, updated_on = ?
        WHERE id = ?
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(&project.name)
    .bind(project.status)
    .bind(project.project_manager_id)
    .bind(now)
    .bind(project.id)
    .fetch_one(conn)
    .await
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: MembershipId,
    user_id: UserId,
    project_id: ProjectId,
    created_on: DateTime<Utc>,
}

async fn find_member_id(
    conn: &mut SqliteConnection,
    user_id: UserId,
    project_id: ProjectId,
) -> Result<Option<MembershipId>, sqlx::Error> {
    sqlx::query_scalar::<_, MembershipId>("SELECT id FROM members WHERE user_id = ? AND project_id = ?")
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(conn)
        .await
}

async fn member_role_ids(conn: &mut SqliteConnection, member_id: MembershipId) -> Result<Vec<RoleId>, sqlx::Error> {
    sqlx::query_scalar::<_, RoleId>("SELECT role_id FROM member_roles WHERE member_id = ? ORDER BY role_id")
        .bind(member_id)
        .fetch_all(conn)
        .await
}

pub async fn find_membership(
    conn: &mut SqliteConnection,
    user_id: UserId,
    project_id: ProjectId,
) -> Result<Option<Membership>, sqlx::Error> {
    let row = sqlx::query_as::<_, MemberRow>(
        "SELECT id, user_id, project_id, created_on FROM members WHERE user_id = ? AND project_id = ?",
    )
    .bind(user_id)
    .bind(project_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let role_ids = member_role_ids(conn, row.id).await?;
            Ok(Some(Membership {
                id: row.id,
                user_id: row.user_id,
                project_id: row.project_id,
                role_ids,
                created_on: row.created_on,
            }))
        }
        None => Ok(None),
    }
}

pub async fn project_memberships(
    conn: &mut SqliteConnection,
    project_id: ProjectId,
) -> Result<Vec<Membership>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MemberRow>(
        "SELECT id, user_id, project_id, created_on FROM members WHERE project_id = ? ORDER BY id",
    )
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut memberships = Vec::with_capacity(rows.len());
    for row in rows {
        let role_ids = member_role_ids(conn, row.id).await?;
        memberships.push(Membership {
            id: row.id,
            user_id: row.user_id,
            project_id: row.project_id,
            role_ids,
            created_on: row.created_on,
        });
    }
    Ok(memberships)
}

pub async fn member_holds_permission(
    conn: &mut SqliteConnection,
    user_id: UserId,
    project_id: ProjectId,
    permission: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM members m
            JOIN member_roles mr ON mr.member_id = m.id
            JOIN roles r ON r.id = mr.role_id
            JOIN role_permissions rp ON rp.role_id = r.id
            WHERE m.user_id = ? AND m.project_id = ? AND rp.permission = ? AND r.builtin = 0
        )
        "#,
    )
    .bind(user_id)
    .bind(project_id)
    .bind(permission)
    .fetch_one(conn)
    .await
}
