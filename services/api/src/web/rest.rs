//! services/api/src/web/rest.rs
//!
//! Contains the shared REST payloads, the mapping from scheduling errors to HTTP
//! responses, and the master definition for the OpenAPI specification.

use axum::http::StatusCode;
use class_schedule_core::{Class, LogEntry, ScheduleChange, ScheduleError, ScheduleOutcome};
use serde::Serialize;
use tracing::error;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::web::logs;
use crate::web::schedule;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        schedule::update_classroom_handler,
        schedule::change_period_handler,
        schedule::change_teacher_handler,
        logs::list_logs_handler,
        logs::clear_logs_handler,
    ),
    components(
        schemas(ClassView, LogEntryView, ScheduleChangeResponse, logs::ClearLogsResponse)
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Class Schedule API", description = "Classroom, period and teacher reassignment with an audit log.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by every protected path.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A class as returned in conflict lists.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClassView {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub period: String,
    pub slot_count: i32,
    pub teacher_id: i32,
    pub classroom_id: Option<i32>,
}

impl From<Class> for ClassView {
    fn from(class: Class) -> Self {
        Self {
            id: class.id,
            name: class.name,
            code: class.code,
            period: class.period,
            slot_count: class.slot_count,
            teacher_id: class.teacher_id,
            classroom_id: class.classroom_id,
        }
    }
}

/// One audit record. Only the old/new fields matching `kind` are present.
#[derive(Debug, Serialize, ToSchema)]
pub struct LogEntryView {
    pub id: i32,
    /// RFC 3339 / ISO-8601 UTC timestamp.
    pub logged_at: String,
    pub kind: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_new: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classroom_old_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classroom_new_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_old_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_new_id: Option<i32>,
    pub login_id: i32,
    pub teacher_id: i32,
    pub class_id: i32,
}

impl From<LogEntry> for LogEntryView {
    fn from(entry: LogEntry) -> Self {
        let kind = entry.change.kind().to_string();
        let mut view = Self {
            id: entry.id,
            logged_at: entry.logged_at.to_rfc3339(),
            kind,
            description: entry.description,
            period_old: None,
            period_new: None,
            classroom_old_id: None,
            classroom_new_id: None,
            teacher_old_id: None,
            teacher_new_id: None,
            login_id: entry.login_id,
            teacher_id: entry.teacher_id,
            class_id: entry.class_id,
        };
        match entry.change {
            ScheduleChange::Period { old, new } => {
                view.period_old = Some(old);
                view.period_new = Some(new);
            }
            ScheduleChange::Classroom { old, new } => {
                view.classroom_old_id = old;
                view.classroom_new_id = Some(new);
            }
            ScheduleChange::Teacher { old, new } => {
                view.teacher_old_id = Some(old);
                view.teacher_new_id = Some(new);
            }
        }
        view
    }
}

/// The outcome of a reassignment request. Rejections are normal 200 responses.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScheduleChangeResponse {
    Applied { message: String, log: LogEntryView },
    Unchanged { message: String },
    Duplicates { pairs: Vec<String> },
    Conflicts { classes: Vec<ClassView> },
}

impl ScheduleChangeResponse {
    pub fn from_outcome(outcome: ScheduleOutcome, success_message: &str) -> Self {
        match outcome {
            ScheduleOutcome::Applied(entry) => ScheduleChangeResponse::Applied {
                message: success_message.to_string(),
                log: entry.into(),
            },
            ScheduleOutcome::Unchanged => ScheduleChangeResponse::Unchanged {
                message: "Nothing to change.".to_string(),
            },
            ScheduleOutcome::Duplicates(pairs) => ScheduleChangeResponse::Duplicates {
                pairs: pairs.into_iter().map(|p| p.to_string()).collect(),
            },
            ScheduleOutcome::Conflicts(classes) => ScheduleChangeResponse::Conflicts {
                classes: classes.into_iter().map(ClassView::from).collect(),
            },
        }
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a scheduling error to its HTTP status; persistence failures are logged
/// and hidden behind a generic message.
pub fn schedule_error_response(err: ScheduleError, context: &str) -> (StatusCode, String) {
    match err {
        ScheduleError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        ScheduleError::InvalidPeriod(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        ScheduleError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            "User ID not found in token.".to_string(),
        ),
        ScheduleError::Persistence(msg) => {
            error!("{}: {}", context, msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}
