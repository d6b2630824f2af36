//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use class_schedule_core::domain::{
    Class, Classroom, LogEntry, Login, NewLogEntry, ScheduleChange, Teacher,
};
use class_schedule_core::period::stored_tokens;
use class_schedule_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const CLASS_COLUMNS: &str = "id, name, code, period, slot_count, teacher_id, classroom_id";

#[derive(FromRow)]
struct ClassRecord {
    id: i32,
    name: String,
    code: String,
    period: String,
    slot_count: i32,
    teacher_id: i32,
    classroom_id: Option<i32>,
}
impl ClassRecord {
    fn to_domain(self) -> Class {
        Class {
            id: self.id,
            name: self.name,
            code: self.code,
            period: self.period,
            slot_count: self.slot_count,
            teacher_id: self.teacher_id,
            classroom_id: self.classroom_id,
        }
    }
}

#[derive(FromRow)]
struct ClassroomRecord {
    id: i32,
    name: String,
    capacity: i32,
}
impl ClassroomRecord {
    fn to_domain(self) -> Classroom {
        Classroom {
            id: self.id,
            name: self.name,
            capacity: self.capacity,
        }
    }
}

#[derive(FromRow)]
struct TeacherRecord {
    id: i32,
    name: String,
    department_id: i32,
}
impl TeacherRecord {
    fn to_domain(self) -> Teacher {
        Teacher {
            id: self.id,
            name: self.name,
            department_id: self.department_id,
        }
    }
}

#[derive(FromRow)]
struct LoginRecord {
    id: i32,
    username: String,
    is_admin: bool,
}
impl LoginRecord {
    fn to_domain(self) -> Login {
        Login {
            id: self.id,
            username: self.username,
            is_admin: self.is_admin,
        }
    }
}

const LOG_COLUMNS: &str = "id, logged_at, kind, description, period_old, period_new, \
     classroom_old_id, classroom_new_id, teacher_old_id, teacher_new_id, \
     login_id, teacher_id, class_id";

#[derive(FromRow)]
struct LogRecord {
    id: i32,
    logged_at: DateTime<Utc>,
    kind: String,
    description: String,
    period_old: Option<String>,
    period_new: Option<String>,
    classroom_old_id: Option<i32>,
    classroom_new_id: Option<i32>,
    teacher_old_id: Option<i32>,
    teacher_new_id: Option<i32>,
    login_id: i32,
    teacher_id: i32,
    class_id: i32,
}
impl LogRecord {
    fn to_domain(self) -> PortResult<LogEntry> {
        let malformed = || PortError::Unexpected(format!("log {} has malformed {} columns", self.id, self.kind));
        let change = match self.kind.as_str() {
            "period" => ScheduleChange::Period {
                old: self.period_old.clone().ok_or_else(malformed)?,
                new: self.period_new.clone().ok_or_else(malformed)?,
            },
            "classroom" => ScheduleChange::Classroom {
                old: self.classroom_old_id,
                new: self.classroom_new_id.ok_or_else(malformed)?,
            },
            "teacher" => ScheduleChange::Teacher {
                old: self.teacher_old_id.ok_or_else(malformed)?,
                new: self.teacher_new_id.ok_or_else(malformed)?,
            },
            other => {
                return Err(PortError::Unexpected(format!(
                    "log {} has unknown kind '{}'",
                    self.id, other
                )))
            }
        };

        Ok(LogEntry {
            id: self.id,
            logged_at: self.logged_at,
            description: self.description,
            change,
            login_id: self.login_id,
            teacher_id: self.teacher_id,
            class_id: self.class_id,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_class(&self, class_id: i32) -> PortResult<Class> {
        let record = sqlx::query_as::<_, ClassRecord>(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1"
        ))
        .bind(class_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Class {} not found", class_id)))?;
        Ok(record.to_domain())
    }

    async fn get_classroom(&self, classroom_id: i32) -> PortResult<Classroom> {
        let record = sqlx::query_as::<_, ClassroomRecord>(
            "SELECT id, name, capacity FROM classrooms WHERE id = $1",
        )
        .bind(classroom_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Classroom {} not found", classroom_id)))?;
        Ok(record.to_domain())
    }

    async fn get_teacher(&self, teacher_id: i32) -> PortResult<Teacher> {
        let record = sqlx::query_as::<_, TeacherRecord>(
            "SELECT id, name, department_id FROM teachers WHERE id = $1",
        )
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Teacher {} not found", teacher_id)))?;
        Ok(record.to_domain())
    }

    async fn get_login(&self, login_id: i32) -> PortResult<Login> {
        let record = sqlx::query_as::<_, LoginRecord>(
            "SELECT id, username, is_admin FROM logins WHERE id = $1",
        )
        .bind(login_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Login {} not found", login_id)))?;
        Ok(record.to_domain())
    }

    async fn list_classes_in_classroom(&self, classroom_id: i32) -> PortResult<Vec<Class>> {
        let records = sqlx::query_as::<_, ClassRecord>(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes WHERE classroom_id = $1 ORDER BY id"
        ))
        .bind(classroom_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn apply_change(
        &self,
        class_id: i32,
        change: &ScheduleChange,
        entry: NewLogEntry,
    ) -> PortResult<LogEntry> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // The transaction rolls back on drop if any statement below fails.
        let updated = match change {
            ScheduleChange::Period { new, .. } => {
                sqlx::query("UPDATE classes SET period = $1, slot_count = $2 WHERE id = $3")
                    .bind(new.as_str())
                    .bind(stored_tokens(new).len() as i32)
                    .bind(class_id)
                    .execute(&mut *tx)
                    .await
            }
            ScheduleChange::Classroom { new, .. } => {
                sqlx::query("UPDATE classes SET classroom_id = $1 WHERE id = $2")
                    .bind(*new)
                    .bind(class_id)
                    .execute(&mut *tx)
                    .await
            }
            ScheduleChange::Teacher { new, .. } => {
                sqlx::query("UPDATE classes SET teacher_id = $1 WHERE id = $2")
                    .bind(*new)
                    .bind(class_id)
                    .execute(&mut *tx)
                    .await
            }
        }
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Class {} not found", class_id)));
        }

        let (period_old, period_new, classroom_old_id, classroom_new_id, teacher_old_id, teacher_new_id) =
            match change {
                ScheduleChange::Period { old, new } => {
                    (Some(old.clone()), Some(new.clone()), None, None, None, None)
                }
                ScheduleChange::Classroom { old, new } => (None, None, *old, Some(*new), None, None),
                ScheduleChange::Teacher { old, new } => (None, None, None, None, Some(*old), Some(*new)),
            };

        let log_id: i32 = sqlx::query_scalar(
            "INSERT INTO logs (logged_at, kind, description, period_old, period_new, \
             classroom_old_id, classroom_new_id, teacher_old_id, teacher_new_id, \
             login_id, teacher_id, class_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING id",
        )
        .bind(entry.logged_at)
        .bind(entry.change.kind())
        .bind(entry.description.as_str())
        .bind(period_old)
        .bind(period_new)
        .bind(classroom_old_id)
        .bind(classroom_new_id)
        .bind(teacher_old_id)
        .bind(teacher_new_id)
        .bind(entry.login_id)
        .bind(entry.teacher_id)
        .bind(entry.class_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(LogEntry::from_new(log_id, entry))
    }

    async fn list_log_entries(&self) -> PortResult<Vec<LogEntry>> {
        let records = sqlx::query_as::<_, LogRecord>(&format!(
            "SELECT {LOG_COLUMNS} FROM logs ORDER BY logged_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn clear_log_entries(&self) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM logs")
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
