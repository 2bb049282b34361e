//! `GatewayIdentity` extractor: reads the user id the upstream gateway
//! injects after authenticating the request.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use messenger_core::error::AppError;
use messenger_core::types::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller, as asserted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayIdentity(pub UserId);

impl FromRequestParts<AppState> for GatewayIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = state.config.server.identity_header.as_str();
        let raw = parts
            .headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::authentication(format!("Missing {header} header")))?;

        let user_id = raw
            .trim()
            .parse::<UserId>()
            .map_err(|_| AppError::authentication(format!("Invalid {header} header")))?;
        if user_id.is_nil() {
            return Err(AppError::authentication(format!("Invalid {header} header")).into());
        }

        Ok(Self(user_id))
    }
}
