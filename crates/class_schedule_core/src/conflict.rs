//! crates/class_schedule_core/src/conflict.rs
//!
//! Detects classes that would share a room slot with a candidate assignment.

use crate::domain::Class;
use crate::period::stored_tokens;
use crate::ports::{DatabaseService, PortResult};

/// Returns the residents whose pair-tokens intersect `candidate_period`.
///
/// The candidate itself is excluded by id, so re-checking a class against the
/// room it already sits in never reports it as its own conflict.
pub fn find_conflicts(candidate_id: i32, candidate_period: &str, residents: Vec<Class>) -> Vec<Class> {
    let candidate_tokens = stored_tokens(candidate_period);
    if candidate_tokens.is_empty() {
        return Vec::new();
    }

    residents
        .into_iter()
        .filter(|resident| resident.id != candidate_id)
        .filter(|resident| {
            stored_tokens(&resident.period)
                .iter()
                .any(|token| candidate_tokens.contains(token))
        })
        .collect()
}

/// Loads the classes assigned to `classroom_id` and returns those conflicting
/// with the candidate. Fails with `NotFound` if the classroom does not exist.
pub async fn check_classroom(
    db: &dyn DatabaseService,
    classroom_id: i32,
    candidate_id: i32,
    candidate_period: &str,
) -> PortResult<Vec<Class>> {
    db.get_classroom(classroom_id).await?;
    let residents = db.list_classes_in_classroom(classroom_id).await?;
    Ok(find_conflicts(candidate_id, candidate_period, residents))
}
