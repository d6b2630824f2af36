//! services/api/src/web/schedule.rs
//!
//! The reassignment endpoints: classroom, period and teacher of a class.
//!
//! Each handler delegates to the `Scheduler`; duplicate pairs and conflicts come
//! back as 200 responses carrying the offending set, errors map to 4xx/5xx.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::web::auth::Claims;
use crate::web::rest::{schedule_error_response, ScheduleChangeResponse};
use crate::web::state::AppState;

/// Query string of `POST /Class/ChangeTeacher`.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ChangeTeacherParams {
    /// The class to reassign.
    pub class_id: i32,
    /// The teacher who will teach it.
    pub new_teacher_id: i32,
}

/// Move a class into another classroom.
///
/// Returns the classes already using one of the class's slots in that room, or
/// a success message once the move and its audit record are written.
#[utoipa::path(
    put,
    path = "/Class/UpdateClassroom/{classId}/Classroom/{classroomId}",
    params(
        ("classId" = i32, Path, description = "The class to move."),
        ("classroomId" = i32, Path, description = "The target classroom.")
    ),
    responses(
        (status = 200, description = "Applied, unchanged, or the conflicting classes", body = ScheduleChangeResponse),
        (status = 401, description = "Missing token or acting login"),
        (status = 404, description = "Class or classroom not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_classroom_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path((class_id, classroom_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .scheduler
        .update_classroom(class_id, classroom_id, claims.actor_id())
        .await
        .map_err(|e| {
            schedule_error_response(
                e,
                &format!("Failed to update classroom for class with ID: {}", class_id),
            )
        })?;

    Ok(Json(ScheduleChangeResponse::from_outcome(
        outcome,
        "Classroom updated successfully.",
    )))
}

/// Change the period encoding of a class.
///
/// `combination` is one or more pairs such as `2T4(P005)` joined by `-`, or
/// `REMOTA`. Repeated pairs are reported first, then conflicts with the other
/// classes in the class's classroom.
#[utoipa::path(
    post,
    path = "/Period/ChangePeriod/{classId}/{combination}",
    params(
        ("classId" = i32, Path, description = "The class whose period changes."),
        ("combination" = String, Path, description = "The new period, e.g. 2T4(P005)-3T4(P005).")
    ),
    responses(
        (status = 200, description = "Applied, unchanged, duplicate pairs, or conflicting classes", body = ScheduleChangeResponse),
        (status = 400, description = "Malformed period encoding"),
        (status = 401, description = "Missing token or acting login"),
        (status = 404, description = "Class not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_period_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path((class_id, combination)): Path<(i32, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .scheduler
        .change_period(class_id, &combination, claims.actor_id())
        .await
        .map_err(|e| {
            schedule_error_response(
                e,
                &format!("Failed to change period for combination: {}", combination),
            )
        })?;

    Ok(Json(ScheduleChangeResponse::from_outcome(
        outcome,
        "Period updated successfully.",
    )))
}

/// Assign a class to another teacher.
#[utoipa::path(
    post,
    path = "/Class/ChangeTeacher",
    params(ChangeTeacherParams),
    responses(
        (status = 200, description = "Applied or unchanged", body = ScheduleChangeResponse),
        (status = 401, description = "Missing token or acting login"),
        (status = 404, description = "Class or teacher not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_teacher_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ChangeTeacherParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .scheduler
        .change_teacher(params.class_id, params.new_teacher_id, claims.actor_id())
        .await
        .map_err(|e| {
            schedule_error_response(
                e,
                &format!("Failed to change teacher for class with ID: {}", params.class_id),
            )
        })?;

    Ok(Json(ScheduleChangeResponse::from_outcome(
        outcome,
        "Teacher updated successfully.",
    )))
}
