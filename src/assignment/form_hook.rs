/// Project edit form hook
///
/// Contributes the manager selection field to the project edit form. This is the
/// only place candidates are filtered by privileged group membership.

use crate::assignment::principal::Principal;
use crate::assignment::service::ManagerAssignment;
use crate::policy::permissions::Capability;
use crate::policy::well_known::WellKnown;
use crate::project::store;
use crate::project::types::{Project, User, UserId};
use serde::Serialize;

/// A selectable manager candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub id: UserId,
    pub name: String,
}

impl From<&User> for Candidate {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name(),
        }
    }
}

/// The manager selection field contributed to the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerField {
    pub selected: Option<UserId>,
    pub candidates: Vec<Candidate>,
}

impl ManagerField {
    /// Render the field as an HTML fragment
    pub fn to_html(&self) -> String {
        let mut html = String::from(
            "<p><label for=\"project_project_manager_id\">Project manager</label>\
             <select name=\"project[project_manager_id]\" id=\"project_project_manager_id\">\
             <option value=\"\"></option>",
        );
        for candidate in &self.candidates {
            let selected = if self.selected == Some(candidate.id) {
                " selected=\"selected\""
            } else {
                ""
            };
            html.push_str(&format!(
                "<option value=\"{}\"{}>{}</option>",
                candidate.id,
                selected,
                html_escape::encode_text(&candidate.name)
            ));
        }
        html.push_str("</select></p>");
        html
    }
}

/// Build the manager field for `principal` editing `project`
///
/// Returns `None` (no markup) when the principal may not assign the manager, or the
/// privileged group is missing or has no active members.
pub async fn render_manager_field(
    assignment: &ManagerAssignment,
    principal: &Principal,
    project: &Project,
) -> Result<Option<ManagerField>, sqlx::Error> {
    let mut conn = assignment.store().pool().acquire().await?;

    let allowed = assignment
        .gate()
        .allowed_to(&mut conn, principal, Capability::AssignProjectManager, project)
        .await?;
    if !allowed {
        tracing::info!(
            "User {} does not have permission to assign project manager",
            principal.login()
        );
        return Ok(None);
    }

    let group_name = assignment.well_known().name(WellKnown::ManagerGroup);
    let users = match assignment.well_known().current().manager_group {
        Some(group_id) => store::active_group_users(&mut conn, group_id).await?,
        None => Vec::new(),
    };

    if users.is_empty() {
        tracing::info!("Group '{}' does not exist or has no active users", group_name);
        return Ok(None);
    }

    Ok(Some(ManagerField {
        selected: project.project_manager_id,
        candidates: users.iter().map(Candidate::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::policy::permissions::PermissionRegistry;
    use crate::project::types::{NewProject, UserStatus};
    use crate::project::{Database, NewUser};
    use std::sync::Arc;

    async fn setup() -> (ManagerAssignment, Principal, Project) {
        let db = Database::in_memory().await.unwrap();
        let svc = ManagerAssignment::new(
            crate::project::Store::new(&db),
            PolicyConfig::default(),
            Arc::new(PermissionRegistry::default()),
        );
        let mut admin = NewUser::active("root", "Root", "Admin");
        admin.admin = true;
        let admin = Principal::from(svc.store().create_user(&admin).await.unwrap());
        let project = svc
            .store()
            .insert_project(&NewProject {
                identifier: "alpha".to_string(),
                name: "Alpha".to_string(),
                project_manager_id: None,
            })
            .await
            .unwrap();
        (svc, admin, project)
    }

    #[tokio::test]
    async fn no_markup_without_permission() {
        let (svc, _admin, project) = setup().await;
        let group = svc.store().create_group("GROUP_PROJECT_MANAGERS").await.unwrap();
        svc.refresh_well_known().await.unwrap();
        let user = svc.store().create_user(&NewUser::active("pm", "Pat", "Manager")).await.unwrap();
        svc.store().add_group_user(group.id, user.id).await.unwrap();

        let field = render_manager_field(&svc, &Principal::from(user), &project).await.unwrap();
        assert_eq!(field, None);
    }

    #[tokio::test]
    async fn no_markup_without_group_or_active_members() {
        let (svc, admin, project) = setup().await;
        assert_eq!(render_manager_field(&svc, &admin, &project).await.unwrap(), None);

        let group = svc.store().create_group("GROUP_PROJECT_MANAGERS").await.unwrap();
        svc.refresh_well_known().await.unwrap();
        assert_eq!(render_manager_field(&svc, &admin, &project).await.unwrap(), None);

        let locked = svc.store().create_user(&NewUser::active("gone", "Gone", "User")).await.unwrap();
        svc.store().add_group_user(group.id, locked.id).await.unwrap();
        svc.store().set_user_status(locked.id, UserStatus::Locked).await.unwrap();
        assert_eq!(render_manager_field(&svc, &admin, &project).await.unwrap(), None);
    }

    #[tokio::test]
    async fn lists_active_group_members() {
        let (svc, admin, mut project) = setup().await;
        let group = svc.store().create_group("GROUP_PROJECT_MANAGERS").await.unwrap();
        svc.refresh_well_known().await.unwrap();
        let pat = svc.store().create_user(&NewUser::active("pm", "Pat", "Manager")).await.unwrap();
        svc.store().add_group_user(group.id, pat.id).await.unwrap();
        project.project_manager_id = Some(pat.id);

        let field = render_manager_field(&svc, &admin, &project).await.unwrap().unwrap();
        assert_eq!(
            field.candidates,
            vec![Candidate { id: pat.id, name: "Pat Manager".to_string() }]
        );

        let html = field.to_html();
        assert!(html.contains(&format!("<option value=\"{}\" selected=\"selected\">Pat Manager</option>", pat.id)));
    }

    #[test]
    fn candidate_names_are_escaped() {
        let field = ManagerField {
            selected: None,
            candidates: vec![Candidate { id: UserId(1), name: "<b>Bob</b> & Co".to_string() }],
        };
        assert!(field.to_html().contains("&lt;b&gt;Bob&lt;/b&gt; &amp; Co"));
    }
}
