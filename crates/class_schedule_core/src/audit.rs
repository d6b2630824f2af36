//! crates/class_schedule_core/src/audit.rs
//!
//! Builds the audit record that accompanies every schedule mutation.

use chrono::{DateTime, Utc};

use crate::domain::{Class, NewLogEntry, ScheduleChange};

/// Describes a change in a single human-readable line.
pub fn describe(change: &ScheduleChange) -> String {
    match change {
        ScheduleChange::Period { old, new } => format!("Period changed from {old} to {new}"),
        ScheduleChange::Classroom { old: Some(old), new } => {
            format!("Classroom changed from {old} to {new}")
        }
        ScheduleChange::Classroom { old: None, new } => format!("Classroom set to {new}"),
        ScheduleChange::Teacher { old, new } => format!("Teacher changed from {old} to {new}"),
    }
}

/// Builds the log entry for `change` applied to `class` by `login_id`.
///
/// The affected teacher is the one teaching the class after the change.
pub fn build_entry(
    class: &Class,
    change: ScheduleChange,
    login_id: i32,
    logged_at: DateTime<Utc>,
) -> NewLogEntry {
    let teacher_id = match &change {
        ScheduleChange::Teacher { new, .. } => *new,
        _ => class.teacher_id,
    };

    NewLogEntry {
        logged_at,
        description: describe(&change),
        change,
        login_id,
        teacher_id,
        class_id: class.id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn class() -> Class {
        Class {
            id: 7,
            name: "Algorithms".to_string(),
            code: "ALG01".to_string(),
            period: "2T4(P005)".to_string(),
            slot_count: 1,
            teacher_id: 3,
            classroom_id: Some(10),
        }
    }

    #[test]
    fn period_entry_carries_old_and_new_values() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let change = ScheduleChange::Period {
            old: "2T4(P005)".to_string(),
            new: "3M2(P005)".to_string(),
        };
        let entry = build_entry(&class(), change.clone(), 42, at);

        assert_eq!(entry.change, change);
        assert_eq!(entry.login_id, 42);
        assert_eq!(entry.teacher_id, 3);
        assert_eq!(entry.class_id, 7);
        assert_eq!(entry.logged_at, at);
        assert_eq!(entry.description, "Period changed from 2T4(P005) to 3M2(P005)");
    }

    #[test]
    fn teacher_entry_references_the_new_teacher() {
        let entry = build_entry(
            &class(),
            ScheduleChange::Teacher { old: 3, new: 9 },
            1,
            Utc::now(),
        );
        assert_eq!(entry.teacher_id, 9);
        assert_eq!(entry.description, "Teacher changed from 3 to 9");
    }

    #[test]
    fn first_classroom_assignment_is_described() {
        let change = ScheduleChange::Classroom { old: None, new: 11 };
        assert_eq!(describe(&change), "Classroom set to 11");
    }
}
