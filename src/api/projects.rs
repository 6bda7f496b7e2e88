/// Project REST API endpoints
///
/// Create, read, and update projects. Updates run the two-phase save: the manager
/// change is gated and validated inside one transaction, then membership roles are
/// synchronized and reported back in the response.

use crate::api::{directory::save_membership, principal::ActingPrincipal, AppState};
use crate::assignment::{render_manager_field, SaveOutcome};
use crate::error::AssignmentError;
use crate::policy::permissions::PermissionDef;
use crate::project::types::{Membership, NewProject, Project, ProjectChanges, ProjectId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
    routing::get,
    Router,
};

/// Create project routes
pub fn create_project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/permissions", get(list_permissions))
        .route("/api/projects", axum::routing::post(create_project))
        .route("/api/projects/{id}", get(get_project).put(update_project))
        .route("/api/projects/{id}/memberships", get(list_memberships).post(save_membership))
        .route("/api/projects/{id}/manager_field", get(manager_field))
}

/// List registered permissions
///
/// GET /api/permissions
async fn list_permissions(State(state): State<AppState>) -> Json<Vec<PermissionDef>> {
    Json(state.assignment.gate().permissions().all().to_vec())
}

/// Create a new project
///
/// POST /api/projects
/// Body: { "identifier": "...", "name": "...", "project_manager_id": 3 }
async fn create_project(
    State(state): State<AppState>,
    ActingPrincipal(principal): ActingPrincipal,
    Json(payload): Json<NewProject>,
) -> Result<(StatusCode, Json<SaveOutcome>), AssignmentError> {
    if principal.user().is_none() {
        return Err(AssignmentError::Forbidden("anonymous users cannot create projects".to_string()));
    }
    if payload.identifier.trim().is_empty() {
        return Err(AssignmentError::BadRequest("identifier is required".to_string()));
    }

    let outcome = state.assignment.create_project(payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Get a project by ID
///
/// GET /api/projects/{id}
async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Project>, AssignmentError> {
    Ok(Json(load_project(&state, ProjectId(id)).await?))
}

/// Update a project
///
/// PUT /api/projects/{id}
/// Body: { "name": "...", "status": "active", "project_manager_id": 3 }
/// Omitting `project_manager_id` leaves the manager untouched; `null` clears it.
async fn update_project(
    State(state): State<AppState>,
    ActingPrincipal(principal): ActingPrincipal,
    Path(id): Path<i64>,
    Json(changes): Json<ProjectChanges>,
) -> Result<Json<SaveOutcome>, AssignmentError> {
    let outcome = state
        .assignment
        .update_project(&principal, ProjectId(id), &changes)
        .await?;
    Ok(Json(outcome))
}

/// List a project's memberships
///
/// GET /api/projects/{id}/memberships
async fn list_memberships(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Membership>>, AssignmentError> {
    let project = load_project(&state, ProjectId(id)).await?;
    Ok(Json(state.assignment.store().project_memberships(project.id).await?))
}

/// Render the manager selection field of the project edit form
///
/// GET /api/projects/{id}/manager_field
/// Returns an empty body when the field is not offered.
async fn manager_field(
    State(state): State<AppState>,
    ActingPrincipal(principal): ActingPrincipal,
    Path(id): Path<i64>,
) -> Result<Html<String>, AssignmentError> {
    let project = load_project(&state, ProjectId(id)).await?;
    let field = render_manager_field(&state.assignment, &principal, &project).await?;
    Ok(Html(field.map(|f| f.to_html()).unwrap_or_default()))
}

async fn load_project(state: &AppState, id: ProjectId) -> Result<Project, AssignmentError> {
    state
        .assignment
        .store()
        .project(id)
        .await?
        .ok_or(AssignmentError::ProjectNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{body_json, request, test_state};
    use crate::project::NewUser;
    use axum::body::Body;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[tokio::test]
    async fn update_without_permission_is_unprocessable() {
        let state = test_state().await;
        let store = state.assignment.store().clone();
        let user = store.create_user(&NewUser::active("nd", "Non", "Director")).await.unwrap();
        let target = store.create_user(&NewUser::active("pm", "Pat", "Manager")).await.unwrap();
        let project = store
            .insert_project(&NewProject {
                identifier: "alpha".to_string(),
                name: "Alpha".to_string(),
                project_manager_id: None,
            })
            .await
            .unwrap();
        let app = create_project_routes().with_state(state);

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                &format!("/api/projects/{}", project.id),
                Some(user.id),
                Body::from(json!({ "project_manager_id": target.id }).to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["errors"][0]["code"], "no_permission_to_assign_project_manager");

        let response = app
            .oneshot(request("GET", &format!("/api/projects/{}", project.id), None, Body::empty()))
            .await
            .unwrap();
        let persisted: Value = body_json(response.into_body()).await;
        assert_eq!(persisted["project_manager_id"], Value::Null);
    }

    #[tokio::test]
    async fn admin_update_returns_sync_report() {
        let state = test_state().await;
        let store = state.assignment.store().clone();
        let mut admin = NewUser::active("root", "Root", "Admin");
        admin.admin = true;
        let admin = store.create_user(&admin).await.unwrap();
        let target = store.create_user(&NewUser::active("pm", "Pat", "Manager")).await.unwrap();
        store.create_group("GROUP_PROJECT_MANAGERS").await.unwrap();
        store.create_role("ProjectManager", false).await.unwrap();
        store.create_role("Member", false).await.unwrap();
        let project = store
            .insert_project(&NewProject {
                identifier: "alpha".to_string(),
                name: "Alpha".to_string(),
                project_manager_id: None,
            })
            .await
            .unwrap();
        let app = create_project_routes().with_state(state);

        let response = app
            .oneshot(request(
                "PUT",
                &format!("/api/projects/{}", project.id),
                Some(admin.id),
                Body::from(json!({ "project_manager_id": target.id }).to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["project"]["project_manager_id"], json!(target.id));
        assert_eq!(body["sync"]["status"], "applied");
        assert_eq!(body["sync"]["steps"][0]["action"], "promoted");
        assert_eq!(body["sync"]["steps"][0]["created"], true);
    }

    #[tokio::test]
    async fn unknown_principal_is_unauthorized() {
        let app = create_project_routes().with_state(test_state().await);
        let response = app
            .oneshot(request("GET", "/api/projects/1/manager_field", Some(crate::project::types::UserId(77)), Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn anonymous_cannot_create_and_missing_project_is_not_found() {
        let app = create_project_routes().with_state(test_state().await);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/projects",
                None,
                Body::from(json!({ "identifier": "x", "name": "X" }).to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request("GET", "/api/projects/42", None, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn manager_field_is_empty_for_anonymous() {
        let state = test_state().await;
        let project = state
            .assignment
            .store()
            .insert_project(&NewProject {
                identifier: "alpha".to_string(),
                name: "Alpha".to_string(),
                project_manager_id: None,
            })
            .await
            .unwrap();
        let app = create_project_routes().with_state(state);

        let response = app
            .oneshot(request("GET", &format!("/api/projects/{}/manager_field", project.id), None, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = http_body_util::BodyExt::collect(response.into_body()).await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }
}
