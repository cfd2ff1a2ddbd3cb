use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::auth::jwt;
use crate::state::AppState;

/// JWT claims carried by every authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Display name at token issue time
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Axum extractor: pulls `Authorization: Bearer <token>` and validates it.
impl FromRequestParts<AppState> for Claims {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        jwt::validate_access_token(&state.jwt_secret, token).map_err(|_| StatusCode::UNAUTHORIZED)
    }
}
