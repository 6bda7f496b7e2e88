//! Typed errors for manager assignment and membership persistence.
//!
//! - `ValidationError`: a single user-visible reason a project save was rejected
//! - `AssignmentError`: failures of project create/update and directory operations
//! - `MembershipError`: failures saving a membership record

use crate::project::types::{ProjectId, RoleId, UserId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A user-visible validation failure attached to a project save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    /// The acting principal lacks `assign_project_manager` on the project
    NoPermissionToAssignProjectManager,
    /// The privileged group exists but no manager is set
    ProjectManagerBlank,
    /// The candidate manager id does not reference an existing user
    ProjectManagerNotFound,
    NameBlank,
}

impl ValidationError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoPermissionToAssignProjectManager => {
                "You are not allowed to assign the project manager"
            }
            Self::ProjectManagerBlank => "Project manager cannot be blank",
            Self::ProjectManagerNotFound => "Project manager does not exist",
            Self::NameBlank => "Name cannot be blank",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Errors from project create/update and directory operations
#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("Validation failed: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    #[error("Project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssignmentError {
    /// The validation errors carried by this error, if any
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }
}

/// Errors from saving a membership record
#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("Membership must hold at least one role")]
    NoRoles,

    #[error("User {0} does not exist")]
    UnknownUser(UserId),

    #[error("Role {0} does not exist")]
    UnknownRole(RoleId),

    #[error("Role '{0}' is builtin and cannot be given through a membership")]
    RoleNotGivable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::message)
        .collect::<Vec<_>>()
        .join(", ")
}
