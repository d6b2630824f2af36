//! services/api/src/web/logs.rs
//!
//! Admin-only access to the audit log.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::web::auth::Claims;
use crate::web::rest::LogEntryView;
use crate::web::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearLogsResponse {
    pub deleted: u64,
}

/// List every audit record, newest first.
#[utoipa::path(
    get,
    path = "/Log",
    responses(
        (status = 200, description = "All audit records", body = [LogEntryView]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an admin"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_logs_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entries = state.db.list_log_entries().await.map_err(|e| {
        error!("Failed to retrieve logs from the database: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    })?;

    let views: Vec<LogEntryView> = entries.into_iter().map(LogEntryView::from).collect();
    Ok(Json(views))
}

/// Delete every audit record.
#[utoipa::path(
    delete,
    path = "/Log",
    responses(
        (status = 200, description = "Number of deleted records", body = ClearLogsResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an admin"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = []))
)]
pub async fn clear_logs_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let deleted = state.db.clear_log_entries().await.map_err(|e| {
        error!("Failed to clear logs: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    })?;

    info!("Login '{}' cleared {} log entries", claims.sub, deleted);
    Ok(Json(ClearLogsResponse { deleted }))
}
