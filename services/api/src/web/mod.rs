pub mod auth;
pub mod logs;
pub mod middleware;
pub mod rest;
pub mod schedule;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::{require_admin, require_auth};
pub use state::AppState;

/// Builds the API router. Every route requires a verified bearer token and the
/// `/Log` routes additionally require the `Admin` role.
pub fn router(app_state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route(
            "/Log",
            get(logs::list_logs_handler).delete(logs::clear_logs_handler),
        )
        .layer(axum_middleware::from_fn(require_admin));

    Router::new()
        .route(
            "/Class/UpdateClassroom/{class_id}/Classroom/{classroom_id}",
            put(schedule::update_classroom_handler),
        )
        .route(
            "/Period/ChangePeriod/{class_id}/{combination}",
            post(schedule::change_period_handler),
        )
        .route("/Class/ChangeTeacher", post(schedule::change_teacher_handler))
        .merge(admin_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state)
}
