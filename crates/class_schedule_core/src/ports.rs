//! crates/class_schedule_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! The scheduling flow only ever talks to storage through `DatabaseService`,
//! so the same logic runs against PostgreSQL in production and the in-memory
//! store in tests.

use async_trait::async_trait;

use crate::domain::{Class, Classroom, LogEntry, Login, NewLogEntry, ScheduleChange, Teacher};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Lookups ---
    async fn get_class(&self, class_id: i32) -> PortResult<Class>;

    async fn get_classroom(&self, classroom_id: i32) -> PortResult<Classroom>;

    async fn get_teacher(&self, teacher_id: i32) -> PortResult<Teacher>;

    async fn get_login(&self, login_id: i32) -> PortResult<Login>;

    /// Every class currently assigned to the given classroom.
    async fn list_classes_in_classroom(&self, classroom_id: i32) -> PortResult<Vec<Class>>;

    // --- Schedule Mutations ---

    /// Applies `change` to the class and appends `entry` to the log as one unit of work.
    ///
    /// Implementations must write either both or neither. Only the column named by
    /// the change is updated, so concurrent changes to other fields are not lost.
    async fn apply_change(
        &self,
        class_id: i32,
        change: &ScheduleChange,
        entry: NewLogEntry,
    ) -> PortResult<LogEntry>;

    // --- Audit Log ---

    /// All log entries, newest first.
    async fn list_log_entries(&self) -> PortResult<Vec<LogEntry>>;

    /// Removes every log entry and returns how many were deleted.
    async fn clear_log_entries(&self) -> PortResult<u64>;
}
