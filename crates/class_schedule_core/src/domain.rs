//! crates/class_schedule_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};

/// Represents a class offering and where/when it is taught.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub id: i32,
    pub name: String,
    pub code: String,
    /// The period encoding, e.g. `2T4(P005)-3T4(P005)` or `REMOTA`.
    pub period: String,
    /// Number of pair-tokens in `period`; zero for remote classes.
    pub slot_count: i32,
    pub teacher_id: i32,
    pub classroom_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classroom {
    pub id: i32,
    pub name: String,
    pub capacity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teacher {
    pub id: i32,
    pub name: String,
    pub department_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Department {
    pub id: i32,
    pub name: String,
}

// Only the fields the scheduling flow needs; credentials never leave the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub id: i32,
    pub username: String,
    pub is_admin: bool,
}

/// The single schedule field a mutation changes, with its before/after values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleChange {
    Period { old: String, new: String },
    Classroom { old: Option<i32>, new: i32 },
    Teacher { old: i32, new: i32 },
}

impl ScheduleChange {
    /// A short, stable name for the kind of change, used as the `kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            ScheduleChange::Period { .. } => "period",
            ScheduleChange::Classroom { .. } => "classroom",
            ScheduleChange::Teacher { .. } => "teacher",
        }
    }
}

/// An audit record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub logged_at: DateTime<Utc>,
    pub description: String,
    pub change: ScheduleChange,
    pub login_id: i32,
    pub teacher_id: i32,
    pub class_id: i32,
}

/// A persisted, append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: i32,
    pub logged_at: DateTime<Utc>,
    pub description: String,
    pub change: ScheduleChange,
    pub login_id: i32,
    pub teacher_id: i32,
    pub class_id: i32,
}

impl LogEntry {
    pub fn from_new(id: i32, entry: NewLogEntry) -> Self {
        Self {
            id,
            logged_at: entry.logged_at,
            description: entry.description,
            change: entry.change,
            login_id: entry.login_id,
            teacher_id: entry.teacher_id,
            class_id: entry.class_id,
        }
    }
}
