//! Threshold badges over a learner's completed-lesson count.
//!
//! Rules are a static table; adding a badge is adding an entry. Grants go
//! through the store's insert-if-absent so re-evaluation never duplicates.

use chrono::{DateTime, Utc};

use owlet_db::models::Learner;
use owlet_db::store::{EngineStore, StoreError};

#[derive(Debug, Clone, Copy)]
pub struct BadgeRule {
    pub code: &'static str,
    pub title: &'static str,
    /// Completed-lesson count at which the badge is earned.
    pub min_completed_lessons: i64,
}

pub const BADGE_RULES: &[BadgeRule] = &[
    BadgeRule {
        code: "FIRST_LESSON",
        title: "First Lesson!",
        min_completed_lessons: 1,
    },
    BadgeRule {
        code: "FIVE_LESSONS",
        title: "High Five",
        min_completed_lessons: 5,
    },
];

/// The rules a learner with `completed_lessons` finished lessons has
/// earned. Pure — count in, rules out.
pub fn earned_badges(completed_lessons: i64) -> Vec<&'static BadgeRule> {
    BADGE_RULES
        .iter()
        .filter(|rule| completed_lessons >= rule.min_completed_lessons)
        .collect()
}

/// Evaluate the rules against the learner's current completed count and
/// grant whatever is newly earned. Returns the newly granted codes.
pub async fn evaluate_and_grant(
    store: &dyn EngineStore,
    learner: Learner,
    now: DateTime<Utc>,
) -> Result<Vec<&'static str>, StoreError> {
    let completed = store.completed_lesson_count(learner).await?;

    let mut granted = Vec::new();
    for rule in earned_badges(completed) {
        if store.grant_badge(learner, rule.code, now).await? {
            tracing::info!(badge = rule.code, "badge granted");
            granted.push(rule.code);
        }
    }

    Ok(granted)
}
