/// HTTP mapping for assignment errors

use crate::error::{AssignmentError, MembershipError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

impl IntoResponse for AssignmentError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ProjectNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Membership(MembershipError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Membership(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Storage(_) | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            Self::Validation(errors) => json!({
                "errors": errors
                    .iter()
                    .map(|e| json!({ "code": e, "message": e.message() }))
                    .collect::<Vec<_>>()
            }),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("❌ Request failed: {}", self);
                json!({ "error": "internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
