//! crates/class_schedule_core/src/memory.rs
//!
//! An in-memory implementation of the `DatabaseService` port.
//!
//! It enforces the same foreign keys and the same all-or-nothing semantics for
//! `apply_change` as the PostgreSQL adapter. Only compiled for tests and under
//! the `test-support` feature.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    Class, Classroom, Department, LogEntry, Login, NewLogEntry, ScheduleChange, Teacher,
};
use crate::period::stored_tokens;
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Default)]
struct Tables {
    departments: BTreeMap<i32, Department>,
    teachers: BTreeMap<i32, Teacher>,
    classrooms: BTreeMap<i32, Classroom>,
    logins: BTreeMap<i32, Login>,
    classes: BTreeMap<i32, Class>,
    logs: Vec<LogEntry>,
    next_log_id: i32,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `apply_change` fail before writing anything.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_department(&self, department: Department) {
        let mut tables = self.tables.write().await;
        tables.departments.insert(department.id, department);
    }

    pub async fn insert_teacher(&self, teacher: Teacher) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.departments.contains_key(&teacher.department_id) {
            return Err(PortError::NotFound(format!(
                "Department {} not found",
                teacher.department_id
            )));
        }
        tables.teachers.insert(teacher.id, teacher);
        Ok(())
    }

    pub async fn insert_classroom(&self, classroom: Classroom) {
        let mut tables = self.tables.write().await;
        tables.classrooms.insert(classroom.id, classroom);
    }

    pub async fn insert_login(&self, login: Login) {
        let mut tables = self.tables.write().await;
        tables.logins.insert(login.id, login);
    }

    pub async fn insert_class(&self, class: Class) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.teachers.contains_key(&class.teacher_id) {
            return Err(PortError::NotFound(format!("Teacher {} not found", class.teacher_id)));
        }
        if let Some(classroom_id) = class.classroom_id {
            if !tables.classrooms.contains_key(&classroom_id) {
                return Err(PortError::NotFound(format!("Classroom {} not found", classroom_id)));
            }
        }
        tables.classes.insert(class.id, class);
        Ok(())
    }
}

fn not_found<T>(kind: &str, id: i32) -> PortResult<T> {
    Err(PortError::NotFound(format!("{} {} not found", kind, id)))
}

#[async_trait]
impl DatabaseService for InMemoryStore {
    async fn get_class(&self, class_id: i32) -> PortResult<Class> {
        let tables = self.tables.read().await;
        match tables.classes.get(&class_id) {
            Some(class) => Ok(class.clone()),
            None => not_found("Class", class_id),
        }
    }

    async fn get_classroom(&self, classroom_id: i32) -> PortResult<Classroom> {
        let tables = self.tables.read().await;
        match tables.classrooms.get(&classroom_id) {
            Some(classroom) => Ok(classroom.clone()),
            None => not_found("Classroom", classroom_id),
        }
    }

    async fn get_teacher(&self, teacher_id: i32) -> PortResult<Teacher> {
        let tables = self.tables.read().await;
        match tables.teachers.get(&teacher_id) {
            Some(teacher) => Ok(teacher.clone()),
            None => not_found("Teacher", teacher_id),
        }
    }

    async fn get_login(&self, login_id: i32) -> PortResult<Login> {
        let tables = self.tables.read().await;
        match tables.logins.get(&login_id) {
            Some(login) => Ok(login.clone()),
            None => not_found("Login", login_id),
        }
    }

    async fn list_classes_in_classroom(&self, classroom_id: i32) -> PortResult<Vec<Class>> {
        let tables = self.tables.read().await;
        Ok(tables
            .classes
            .values()
            .filter(|class| class.classroom_id == Some(classroom_id))
            .cloned()
            .collect())
    }

    async fn apply_change(
        &self,
        class_id: i32,
        change: &ScheduleChange,
        entry: NewLogEntry,
    ) -> PortResult<LogEntry> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("write failure injected".to_string()));
        }

        let mut tables = self.tables.write().await;

        // Validate every reference before touching any table.
        if !tables.classes.contains_key(&class_id) {
            return not_found("Class", class_id);
        }
        if !tables.logins.contains_key(&entry.login_id) {
            return Err(PortError::Unexpected(format!(
                "log references unknown login {}",
                entry.login_id
            )));
        }
        if !tables.teachers.contains_key(&entry.teacher_id) {
            return Err(PortError::Unexpected(format!(
                "log references unknown teacher {}",
                entry.teacher_id
            )));
        }
        match change {
            ScheduleChange::Classroom { new, .. } if !tables.classrooms.contains_key(new) => {
                return not_found("Classroom", *new);
            }
            ScheduleChange::Teacher { new, .. } if !tables.teachers.contains_key(new) => {
                return not_found("Teacher", *new);
            }
            _ => {}
        }

        tables.next_log_id += 1;
        let log_id = tables.next_log_id;

        if let Some(class) = tables.classes.get_mut(&class_id) {
            match change {
                ScheduleChange::Period { new, .. } => {
                    class.slot_count = stored_tokens(new).len() as i32;
                    class.period = new.clone();
                }
                ScheduleChange::Classroom { new, .. } => class.classroom_id = Some(*new),
                ScheduleChange::Teacher { new, .. } => class.teacher_id = *new,
            }
        }

        let logged = LogEntry::from_new(log_id, entry);
        tables.logs.push(logged.clone());
        Ok(logged)
    }

    async fn list_log_entries(&self) -> PortResult<Vec<LogEntry>> {
        let tables = self.tables.read().await;
        let mut entries = tables.logs.clone();
        entries.sort_by(|a, b| b.logged_at.cmp(&a.logged_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn clear_log_entries(&self) -> PortResult<u64> {
        let mut tables = self.tables.write().await;
        let deleted = tables.logs.len() as u64;
        tables.logs.clear();
        Ok(deleted)
    }
}
