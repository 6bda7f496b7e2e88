/// Acting principal extraction
///
/// The acting user is named by the `X-Principal-Id` header; requests without it act
/// as the anonymous principal.

use crate::api::AppState;
use crate::assignment::Principal;
use crate::project::types::UserId;
use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode};

pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Principal resolved from the request headers
#[derive(Debug, Clone)]
pub struct ActingPrincipal(pub Principal);

impl FromRequestParts<AppState> for ActingPrincipal {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(PRINCIPAL_HEADER) else {
            return Ok(Self(Principal::Anonymous));
        };

        let id: i64 = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .ok_or(StatusCode::BAD_REQUEST)?;

        match state.assignment.store().user(UserId(id)).await {
            Ok(Some(user)) => Ok(Self(Principal::User(user))),
            Ok(None) => {
                tracing::warn!("🔒 Unknown principal id {}", id);
                Err(StatusCode::UNAUTHORIZED)
            }
            Err(e) => {
                tracing::error!("Failed to load principal {}: {}", id, e);
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
