//! crates/class_schedule_core/src/scheduler.rs
//!
//! Orchestrates the three schedule mutations: moving a class to another
//! classroom, changing its period, and changing its teacher.
//!
//! Every mutation runs lookup, validation, authorization and then a single
//! `apply_change` call that writes the field and its audit record together.
//! Every mutation holds the per-classroom lock of the class from the moment
//! it reads the class until the write has committed. Two requests can never
//! both pass the conflict check for the same slot, and the old value in each
//! audit record is the value the write replaced.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::audit;
use crate::conflict;
use crate::domain::{Class, LogEntry, Login, ScheduleChange};
use crate::period::{PairToken, PeriodEncoding, PeriodError};
use crate::ports::{DatabaseService, PortError};

/// The login id carried by the caller's verified token.
pub type ActorId = i32;

//=========================================================================================
// Outcomes and Errors
//=========================================================================================

/// The non-exceptional results of a schedule mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The change was written together with this audit record.
    Applied(LogEntry),
    /// The class already had the requested value; nothing was written.
    Unchanged,
    /// The submitted combination repeats these pairs; nothing was written.
    Duplicates(Vec<PairToken>),
    /// These classes already occupy the requested slots; nothing was written.
    Conflicts(Vec<Class>),
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    InvalidPeriod(#[from] PeriodError),
    #[error("Acting login could not be resolved")]
    Unauthorized,
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl From<PortError> for ScheduleError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => ScheduleError::NotFound(what),
            PortError::Unexpected(msg) => ScheduleError::Persistence(msg),
        }
    }
}

//=========================================================================================
// Per-Classroom Serialization
//=========================================================================================

/// Lock key for a classroom; `None` stands for classes without a room.
type RoomKey = Option<i32>;

#[derive(Default)]
struct ClassroomLocks {
    slots: Mutex<HashMap<RoomKey, Arc<Mutex<()>>>>,
}

impl ClassroomLocks {
    /// Acquires the locks for all `keys` in ascending order, so two callers
    /// locking overlapping sets can not deadlock.
    async fn acquire(&self, mut keys: Vec<RoomKey>) -> Vec<OwnedMutexGuard<()>> {
        keys.sort();
        keys.dedup();

        let handles: Vec<Arc<Mutex<()>>> = {
            let mut slots = self.slots.lock().await;
            keys.iter()
                .map(|key| slots.entry(*key).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }
        guards
    }
}

//=========================================================================================
// Scheduler
//=========================================================================================

pub struct Scheduler {
    db: Arc<dyn DatabaseService>,
    locks: ClassroomLocks,
}

impl Scheduler {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self {
            db,
            locks: ClassroomLocks::default(),
        }
    }

    /// Moves a class into `classroom_id` unless another class there shares a slot.
    pub async fn update_classroom(
        &self,
        class_id: i32,
        classroom_id: i32,
        actor: Option<ActorId>,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        self.db.get_class(class_id).await?;
        self.db.get_classroom(classroom_id).await?;

        let (class, _guards) = self.lock_class(class_id, Some(classroom_id)).await?;

        let conflicts =
            conflict::check_classroom(self.db.as_ref(), classroom_id, class.id, &class.period)
                .await?;
        if !conflicts.is_empty() {
            warn!(
                "Class {} can not move to classroom {}: {} conflicting classes",
                class.id,
                classroom_id,
                conflicts.len()
            );
            return Ok(ScheduleOutcome::Conflicts(conflicts));
        }

        let login = self.authorize(actor).await?;
        if class.classroom_id == Some(classroom_id) {
            return Ok(ScheduleOutcome::Unchanged);
        }

        let change = ScheduleChange::Classroom {
            old: class.classroom_id,
            new: classroom_id,
        };
        self.apply(&class, change, &login).await
    }

    /// Replaces the period encoding of a class with `combination`.
    ///
    /// Repeated pairs are reported before anything else is checked. If the class
    /// has a classroom, the new pairs are then checked against its other residents.
    pub async fn change_period(
        &self,
        class_id: i32,
        combination: &str,
        actor: Option<ActorId>,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        self.db.get_class(class_id).await?;

        let encoding = PeriodEncoding::parse(combination)?;
        let duplicates = encoding.duplicates();
        if !duplicates.is_empty() {
            warn!("Rejected period for class {}: repeated pairs {:?}", class_id, duplicates);
            return Ok(ScheduleOutcome::Duplicates(duplicates));
        }
        let new_period = encoding.to_string();

        let (class, _guards) = self.lock_class(class_id, None).await?;

        if let Some(classroom_id) = class.classroom_id {
            let conflicts =
                conflict::check_classroom(self.db.as_ref(), classroom_id, class.id, &new_period)
                    .await?;
            if !conflicts.is_empty() {
                warn!(
                    "Rejected period for class {}: {} conflicting classes in classroom {}",
                    class.id,
                    conflicts.len(),
                    classroom_id
                );
                return Ok(ScheduleOutcome::Conflicts(conflicts));
            }
        }

        let login = self.authorize(actor).await?;
        if class.period == new_period {
            return Ok(ScheduleOutcome::Unchanged);
        }

        let change = ScheduleChange::Period {
            old: class.period.clone(),
            new: new_period,
        };
        self.apply(&class, change, &login).await
    }

    /// Assigns a class to another teacher.
    ///
    /// No slots change, so there is no conflict check. The class's room lock is
    /// still held so the recorded old teacher is the one being replaced.
    pub async fn change_teacher(
        &self,
        class_id: i32,
        teacher_id: i32,
        actor: Option<ActorId>,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        self.db.get_class(class_id).await?;
        self.db.get_teacher(teacher_id).await?;

        let (class, _guards) = self.lock_class(class_id, None).await?;

        let login = self.authorize(actor).await?;
        if class.teacher_id == teacher_id {
            return Ok(ScheduleOutcome::Unchanged);
        }

        let change = ScheduleChange::Teacher {
            old: class.teacher_id,
            new: teacher_id,
        };
        self.apply(&class, change, &login).await
    }

    /// Resolves the acting login; a missing or unknown actor fails closed.
    async fn authorize(&self, actor: Option<ActorId>) -> Result<Login, ScheduleError> {
        let actor = actor.ok_or(ScheduleError::Unauthorized)?;
        match self.db.get_login(actor).await {
            Ok(login) => Ok(login),
            Err(PortError::NotFound(_)) => {
                warn!("Token names login {} which does not exist", actor);
                Err(ScheduleError::Unauthorized)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply(
        &self,
        class: &Class,
        change: ScheduleChange,
        login: &Login,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let entry = audit::build_entry(class, change.clone(), login.id, Utc::now());
        let logged = self.db.apply_change(class.id, &change, entry).await?;
        info!(
            "{} (class {}, by {}, log {})",
            logged.description, class.id, login.username, logged.id
        );
        Ok(ScheduleOutcome::Applied(logged))
    }

    /// Locks the class's current room (plus `target`, if any) and returns the
    /// class as read under those locks.
    ///
    /// The class may have moved between the unlocked read and acquiring the
    /// locks; in that case the locks are released and taken again for its new room.
    async fn lock_class(
        &self,
        class_id: i32,
        target: Option<i32>,
    ) -> Result<(Class, Vec<OwnedMutexGuard<()>>), ScheduleError> {
        let mut room = self.db.get_class(class_id).await?.classroom_id;
        loop {
            let mut keys = vec![room];
            if let Some(target) = target {
                keys.push(Some(target));
            }
            let guards = self.locks.acquire(keys).await;

            let class = self.db.get_class(class_id).await?;
            if class.classroom_id == room {
                return Ok((class, guards));
            }
            room = class.classroom_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Classroom, Department, NewLogEntry, Teacher};
    use crate::memory::InMemoryStore;
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use std::time::Duration;

    const ACTOR: ActorId = 1;

    fn class(id: i32, period: &str, classroom_id: Option<i32>) -> Class {
        Class {
            id,
            name: format!("Class {id}"),
            code: format!("C{id}"),
            period: period.to_string(),
            slot_count: 1,
            teacher_id: 1,
            classroom_id,
        }
    }

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_department(Department { id: 1, name: "DACOM".to_string() })
            .await;
        for id in [1, 2] {
            store
                .insert_teacher(Teacher { id, name: format!("Teacher {id}"), department_id: 1 })
                .await
                .unwrap();
        }
        for id in [10, 11] {
            store
                .insert_classroom(Classroom { id, name: format!("P{id:03}"), capacity: 40 })
                .await;
        }
        store
            .insert_login(Login { id: ACTOR, username: "secretary".to_string(), is_admin: false })
            .await;
        store
    }

    fn scheduler(store: &Arc<InMemoryStore>) -> Scheduler {
        Scheduler::new(store.clone())
    }

    /// Delays every class read, widening the window between reading a class
    /// and writing its change.
    struct SlowReads(Arc<InMemoryStore>);

    #[async_trait]
    impl DatabaseService for SlowReads {
        async fn get_class(&self, class_id: i32) -> PortResult<Class> {
            let class = self.0.get_class(class_id).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
            class
        }

        async fn get_classroom(&self, classroom_id: i32) -> PortResult<Classroom> {
            self.0.get_classroom(classroom_id).await
        }

        async fn get_teacher(&self, teacher_id: i32) -> PortResult<Teacher> {
            self.0.get_teacher(teacher_id).await
        }

        async fn get_login(&self, login_id: i32) -> PortResult<Login> {
            self.0.get_login(login_id).await
        }

        async fn list_classes_in_classroom(&self, classroom_id: i32) -> PortResult<Vec<Class>> {
            self.0.list_classes_in_classroom(classroom_id).await
        }

        async fn apply_change(
            &self,
            class_id: i32,
            change: &ScheduleChange,
            entry: NewLogEntry,
        ) -> PortResult<LogEntry> {
            self.0.apply_change(class_id, change, entry).await
        }

        async fn list_log_entries(&self) -> PortResult<Vec<LogEntry>> {
            self.0.list_log_entries().await
        }

        async fn clear_log_entries(&self) -> PortResult<u64> {
            self.0.clear_log_entries().await
        }
    }

    #[tokio::test]
    async fn repeated_pairs_are_reported_and_nothing_changes() {
        let store = seeded_store().await;
        store.insert_class(class(1, "3M1(P010)", None)).await.unwrap();

        let outcome = scheduler(&store)
            .change_period(1, "2T4(P005)-2T4(P005)", Some(ACTOR))
            .await
            .unwrap();

        match outcome {
            ScheduleOutcome::Duplicates(pairs) => {
                assert_eq!(pairs.iter().map(|p| p.as_str()).collect::<Vec<_>>(), vec!["2T4(P005)"]);
            }
            other => panic!("expected duplicates, got {:?}", other),
        }
        assert_eq!(store.get_class(1).await.unwrap().period, "3M1(P010)");
        assert!(store.list_log_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn moving_into_an_occupied_slot_reports_the_occupant() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", Some(10))).await.unwrap();
        store.insert_class(class(2, "2T4(P005)", None)).await.unwrap();

        let outcome = scheduler(&store).update_classroom(2, 10, Some(ACTOR)).await.unwrap();

        match outcome {
            ScheduleOutcome::Conflicts(classes) => {
                assert_eq!(classes.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);
            }
            other => panic!("expected conflicts, got {:?}", other),
        }
        assert_eq!(store.get_class(2).await.unwrap().classroom_id, None);
        assert!(store.list_log_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn moving_into_a_free_classroom_writes_one_log_entry() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", Some(10))).await.unwrap();
        store.insert_class(class(2, "2T4(P005)", Some(10))).await.unwrap();

        let outcome = scheduler(&store).update_classroom(2, 11, Some(ACTOR)).await.unwrap();

        let logged = match outcome {
            ScheduleOutcome::Applied(entry) => entry,
            other => panic!("expected applied, got {:?}", other),
        };
        assert_eq!(logged.change, ScheduleChange::Classroom { old: Some(10), new: 11 });
        assert_eq!(logged.login_id, ACTOR);
        assert_eq!(logged.class_id, 2);
        assert_eq!(store.get_class(2).await.unwrap().classroom_id, Some(11));
        assert_eq!(store.list_log_entries().await.unwrap(), vec![logged]);
    }

    #[tokio::test]
    async fn missing_actor_is_rejected_without_side_effects() {
        let store = seeded_store().await;
        store.insert_class(class(2, "2T4(P005)", None)).await.unwrap();
        let scheduler = scheduler(&store);

        let err = scheduler.update_classroom(2, 11, None).await.unwrap_err();
        assert!(matches!(err, ScheduleError::Unauthorized));

        let err = scheduler.change_teacher(2, 2, Some(99)).await.unwrap_err();
        assert!(matches!(err, ScheduleError::Unauthorized));

        assert_eq!(store.get_class(2).await.unwrap(), class(2, "2T4(P005)", None));
        assert!(store.list_log_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn period_change_records_old_and_new_values() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", Some(10))).await.unwrap();

        let outcome = scheduler(&store)
            .change_period(1, "3M1(P005) - 3M2(P005)", Some(ACTOR))
            .await
            .unwrap();

        let logged = match outcome {
            ScheduleOutcome::Applied(entry) => entry,
            other => panic!("expected applied, got {:?}", other),
        };
        assert_eq!(
            logged.change,
            ScheduleChange::Period {
                old: "2T4(P005)".to_string(),
                new: "3M1(P005)-3M2(P005)".to_string(),
            }
        );
        let updated = store.get_class(1).await.unwrap();
        assert_eq!(updated.period, "3M1(P005)-3M2(P005)");
        assert_eq!(updated.slot_count, 2);
    }

    #[tokio::test]
    async fn period_change_is_checked_against_the_current_classroom() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", Some(10))).await.unwrap();
        store.insert_class(class(2, "3M1(P005)", Some(10))).await.unwrap();

        let outcome = scheduler(&store)
            .change_period(2, "2T4(P005)", Some(ACTOR))
            .await
            .unwrap();

        assert!(matches!(outcome, ScheduleOutcome::Conflicts(ref c) if c.len() == 1 && c[0].id == 1));
        assert_eq!(store.get_class(2).await.unwrap().period, "3M1(P005)");
    }

    #[tokio::test]
    async fn duplicates_take_priority_over_conflicts() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", Some(10))).await.unwrap();
        store.insert_class(class(2, "3M1(P005)", Some(10))).await.unwrap();

        let outcome = scheduler(&store)
            .change_period(2, "2T4(P005)-2T4(P005)", Some(ACTOR))
            .await
            .unwrap();

        assert!(matches!(outcome, ScheduleOutcome::Duplicates(_)));
    }

    #[tokio::test]
    async fn unknown_entities_are_not_found() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", None)).await.unwrap();
        let scheduler = scheduler(&store);

        assert!(matches!(
            scheduler.update_classroom(404, 10, Some(ACTOR)).await,
            Err(ScheduleError::NotFound(_))
        ));
        assert!(matches!(
            scheduler.update_classroom(1, 404, Some(ACTOR)).await,
            Err(ScheduleError::NotFound(_))
        ));
        assert!(matches!(
            scheduler.change_period(404, "2T4(P005)", Some(ACTOR)).await,
            Err(ScheduleError::NotFound(_))
        ));
        assert!(matches!(
            scheduler.change_teacher(1, 404, Some(ACTOR)).await,
            Err(ScheduleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_encoding_is_rejected() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", None)).await.unwrap();

        let err = scheduler(&store)
            .change_period(1, "2T4(P005)--", Some(ACTOR))
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidPeriod(_)));
    }

    #[tokio::test]
    async fn teacher_change_is_logged_against_the_new_teacher() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", Some(10))).await.unwrap();

        let outcome = scheduler(&store).change_teacher(1, 2, Some(ACTOR)).await.unwrap();

        let logged = match outcome {
            ScheduleOutcome::Applied(entry) => entry,
            other => panic!("expected applied, got {:?}", other),
        };
        assert_eq!(logged.change, ScheduleChange::Teacher { old: 1, new: 2 });
        assert_eq!(logged.teacher_id, 2);
        assert_eq!(store.get_class(1).await.unwrap().teacher_id, 2);
    }

    #[tokio::test]
    async fn requesting_the_current_value_writes_nothing() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", Some(10))).await.unwrap();
        let scheduler = scheduler(&store);

        assert_eq!(
            scheduler.update_classroom(1, 10, Some(ACTOR)).await.unwrap(),
            ScheduleOutcome::Unchanged
        );
        assert_eq!(
            scheduler.change_teacher(1, 1, Some(ACTOR)).await.unwrap(),
            ScheduleOutcome::Unchanged
        );
        assert!(store.list_log_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_leaves_class_and_log_untouched() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", None)).await.unwrap();
        store.set_fail_writes(true);

        let err = scheduler(&store).update_classroom(1, 10, Some(ACTOR)).await.unwrap_err();

        assert!(matches!(err, ScheduleError::Persistence(_)));
        assert_eq!(store.get_class(1).await.unwrap().classroom_id, None);
        assert!(store.list_log_entries().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_moves_into_one_slot_admit_exactly_one() {
        let store = seeded_store().await;
        store.insert_class(class(1, "2T4(P005)", None)).await.unwrap();
        store.insert_class(class(2, "2T4(P005)", Some(11))).await.unwrap();
        let scheduler = Arc::new(scheduler(&store));

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.update_classroom(1, 10, Some(ACTOR)).await })
        };
        let second = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.update_classroom(2, 10, Some(ACTOR)).await })
        };
        let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];

        let applied = outcomes
            .iter()
            .filter(|o| matches!(o, ScheduleOutcome::Applied(_)))
            .count();
        let conflicted = outcomes
            .iter()
            .filter(|o| matches!(o, ScheduleOutcome::Conflicts(_)))
            .count();
        assert_eq!((applied, conflicted), (1, 1));
        assert_eq!(store.list_classes_in_classroom(10).await.unwrap().len(), 1);
        assert_eq!(store.list_log_entries().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_teacher_changes_record_the_teacher_they_replaced() {
        let store = seeded_store().await;
        store
            .insert_teacher(Teacher { id: 3, name: "Teacher 3".to_string(), department_id: 1 })
            .await
            .unwrap();
        store.insert_class(class(1, "2T4(P005)", Some(10))).await.unwrap();
        let scheduler = Arc::new(Scheduler::new(Arc::new(SlowReads(store.clone()))));

        let handles: Vec<_> = [2, 3]
            .into_iter()
            .map(|teacher_id| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move { scheduler.change_teacher(1, teacher_id, Some(ACTOR)).await })
            })
            .collect();
        for handle in handles {
            assert!(matches!(handle.await.unwrap().unwrap(), ScheduleOutcome::Applied(_)));
        }

        let mut logs = store.list_log_entries().await.unwrap();
        logs.sort_by_key(|entry| entry.id);
        let changes: Vec<(i32, i32)> = logs
            .iter()
            .map(|entry| match entry.change {
                ScheduleChange::Teacher { old, new } => (old, new),
                ref other => panic!("expected a teacher change, got {:?}", other),
            })
            .collect();
        assert_eq!(changes.len(), 2);
        let (earliest, latest) = (changes[0], changes[1]);
        assert_eq!(earliest.0, 1);
        assert_eq!(latest.0, earliest.1);
        assert_eq!(store.get_class(1).await.unwrap().teacher_id, latest.1);
    }
}
