//! Bearer-token guard for the admin API.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use keyhub_core::error::KeyHubError;
use std::sync::Arc;

use crate::routes::error_response;
use crate::server::AppState;

/// Axum middleware that requires `Authorization: Bearer <jwt>` with the admin role.
pub async fn require_admin(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return error_response(KeyHubError::Unauthorized);
    };

    match state.tokens.validate_token(token) {
        Ok(claims) if claims.is_admin() => next.run(request).await,
        Ok(claims) => {
            tracing::warn!("Non-admin {} tried {}", claims.email, request.uri().path());
            error_response(KeyHubError::Forbidden)
        }
        Err(e) => error_response(e),
    }
}
