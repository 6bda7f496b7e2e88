/// Directory administration endpoints
///
/// Provisioning of users, groups, roles, and memberships. Every endpoint requires an
/// administrator principal. Creating a group or role republishes the well-known handles.

use crate::api::{principal::ActingPrincipal, AppState};
use crate::assignment::Principal;
use crate::error::AssignmentError;
use crate::project::store::NewUser;
use crate::project::types::{Group, GroupId, Membership, ProjectId, Role, RoleId, User, UserId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde::Deserialize;

/// Request body for group creation
#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

/// Request body for adding a user to a group
#[derive(Debug, Deserialize)]
pub struct AddGroupUserRequest {
    pub user_id: UserId,
}

/// Request body for role creation
#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub builtin: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Request body for membership creation or role replacement
#[derive(Debug, Deserialize)]
pub struct SaveMembershipRequest {
    pub user_id: UserId,
    pub role_ids: Vec<RoleId>,
}

/// Create directory administration routes
pub fn create_directory_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(create_user))
        .route("/api/groups", post(create_group))
        .route("/api/groups/{id}/users", post(add_group_user))
        .route("/api/roles", post(create_role))
}

fn require_admin(principal: &Principal) -> Result<(), AssignmentError> {
    if principal.is_admin() {
        Ok(())
    } else {
        tracing::warn!("🚫 {} attempted a directory change", principal.login());
        Err(AssignmentError::Forbidden("administrator required".to_string()))
    }
}

fn unique_violation(error: sqlx::Error, what: String) -> AssignmentError {
    match error.as_database_error() {
        Some(db) if db.is_unique_violation() => AssignmentError::Conflict(format!("{} already exists", what)),
        Some(db) if db.is_foreign_key_violation() => AssignmentError::NotFound(what),
        _ => AssignmentError::Storage(error),
    }
}

/// POST /api/users
async fn create_user(
    State(state): State<AppState>,
    ActingPrincipal(principal): ActingPrincipal,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AssignmentError> {
    require_admin(&principal)?;
    let user = state
        .assignment
        .store()
        .create_user(&payload)
        .await
        .map_err(|e| unique_violation(e, format!("User '{}'", payload.login)))?;
    tracing::info!("👤 Created user {} ({})", user.login, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/groups
async fn create_group(
    State(state): State<AppState>,
    ActingPrincipal(principal): ActingPrincipal,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AssignmentError> {
    require_admin(&principal)?;
    let group = state
        .assignment
        .store()
        .create_group(&payload.name)
        .await
        .map_err(|e| unique_violation(e, format!("Group '{}'", payload.name)))?;
    tracing::info!("👥 Created group {} ({})", group.name, group.id);
    state.assignment.refresh_well_known().await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// POST /api/groups/{id}/users
async fn add_group_user(
    State(state): State<AppState>,
    ActingPrincipal(principal): ActingPrincipal,
    Path(id): Path<i64>,
    Json(payload): Json<AddGroupUserRequest>,
) -> Result<StatusCode, AssignmentError> {
    require_admin(&principal)?;
    state
        .assignment
        .store()
        .add_group_user(GroupId(id), payload.user_id)
        .await
        .map_err(|e| unique_violation(e, format!("Group {} or user {}", id, payload.user_id)))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/roles
///
/// Permissions must be registered.
async fn create_role(
    State(state): State<AppState>,
    ActingPrincipal(principal): ActingPrincipal,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), AssignmentError> {
    require_admin(&principal)?;

    let registry = state.assignment.gate().permissions();
    if let Some(unknown) = payload.permissions.iter().find(|p| !registry.is_registered(p)) {
        return Err(AssignmentError::BadRequest(format!("unknown permission '{}'", unknown)));
    }

    let store = state.assignment.store();
    let role = store
        .create_role(&payload.name, payload.builtin)
        .await
        .map_err(|e| unique_violation(e, format!("Role '{}'", payload.name)))?;
    for permission in &payload.permissions {
        store.add_role_permission(role.id, permission).await?;
    }

    tracing::info!("🎭 Created role {} with permissions {:?}", role.name, payload.permissions);
    state.assignment.refresh_well_known().await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// POST /api/projects/{id}/memberships
///
/// Creates the membership or replaces its role set. Routed with the project endpoints.
pub(crate) async fn save_membership(
    State(state): State<AppState>,
    ActingPrincipal(principal): ActingPrincipal,
    Path(id): Path<i64>,
    Json(payload): Json<SaveMembershipRequest>,
) -> Result<Json<Membership>, AssignmentError> {
    require_admin(&principal)?;
    let store = state.assignment.store();
    let project_id = ProjectId(id);
    if store.project(project_id).await?.is_none() {
        return Err(AssignmentError::ProjectNotFound(project_id));
    }

    let membership = store
        .save_membership(payload.user_id, project_id, &payload.role_ids)
        .await?;
    Ok(Json(membership))
}
