/// Eligibility validation for project saves
///
/// A manager is required only once the privileged group is provisioned, as last
/// published by the well-known registry. The
/// candidate's own group membership is not checked here; only the form hook
/// filters candidates by group.

use crate::error::ValidationError;
use crate::policy::well_known::{WellKnown, WellKnownRegistry};
use crate::project::store;
use crate::project::types::Project;
use sqlx::sqlite::SqliteConnection;

/// Collect every validation error for a candidate project state
pub async fn validate_project(
    conn: &mut SqliteConnection,
    well_known: &WellKnownRegistry,
    candidate: &Project,
) -> Result<Vec<ValidationError>, sqlx::Error> {
    let mut errors = Vec::new();

    if candidate.name.trim().is_empty() {
        errors.push(ValidationError::NameBlank);
    }

    match candidate.project_manager_id {
        Some(manager_id) => {
            if store::find_user(&mut *conn, manager_id).await?.is_none() {
                errors.push(ValidationError::ProjectManagerNotFound);
            }
        }
        None => {
            if well_known.current().manager_group.is_some() {
                errors.push(ValidationError::ProjectManagerBlank);
            } else {
                tracing::info!(
                    "Group '{}' does not exist. Skipping project manager validation.",
                    well_known.name(WellKnown::ManagerGroup)
                );
            }
        }
    }

    Ok(errors)
}
