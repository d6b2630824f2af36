//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::auth::{bearer_token, verify_token, Claims};
use crate::web::state::AppState;

/// Middleware that validates the bearer token and extracts its claims.
///
/// If valid, inserts the `Claims` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the authorization header
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Parse the bearer token
    let token = bearer_token(header_value).ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Verify signature and expiry
    let claims = verify_token(token, &state.config.jwt_secret).map_err(|e| {
        warn!("Rejected bearer token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    // 4. Insert the claims into request extensions
    req.extensions_mut().insert(claims);

    // 5. Continue to the handler
    Ok(next.run(req).await)
}

/// Middleware that only lets callers with the `Admin` role through.
///
/// Must run after `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, StatusCode> {
    let claims = req.extensions().get::<Claims>().ok_or_else(|| {
        error!("require_admin ran without verified claims");
        StatusCode::UNAUTHORIZED
    })?;

    if !claims.is_admin() {
        warn!("Login '{}' attempted an admin-only route", claims.sub);
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
