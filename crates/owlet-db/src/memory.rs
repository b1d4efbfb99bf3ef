//! An in-memory store with the same semantics as the Postgres one.
//!
//! Used by the integration tests and as the fallback when no
//! `DATABASE_URL` is configured — the services always run the single
//! trait-shaped code path, never a separate "mock mode".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::models::{
    AnswerRow, Attempt, Learner, LessonTree, ProgressRow, ProgressStatus, QuestionContext,
    ReviewItem, UserBadge, XpEvent,
};
use crate::store::{ContentStore, EngineStore, StoreResult};

#[derive(Debug, Default)]
struct Inner {
    children: HashMap<Uuid, Uuid>,
    lessons: HashMap<Uuid, LessonTree>,
    attempts: HashMap<Uuid, Attempt>,
    answers: HashMap<(Uuid, Uuid), AnswerRow>,
    review_items: HashMap<(Learner, Uuid), ReviewItem>,
    progress: HashMap<(Learner, Uuid), ProgressRow>,
    xp_events: Vec<XpEvent>,
    badges: Vec<UserBadge>,
}

/// Mutex-guarded maps mirroring the database tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a child profile under a guardian account.
    pub fn insert_child(&self, child_id: Uuid, guardian_account_id: Uuid) {
        self.lock().children.insert(child_id, guardian_account_id);
    }

    /// Register a lesson tree as published content.
    pub fn insert_lesson(&self, lesson: LessonTree) {
        self.lock().lessons.insert(lesson.id, lesson);
    }

    /// All XP events for a learner, in append order.
    pub fn xp_events_for(&self, learner: Learner) -> Vec<XpEvent> {
        self.lock()
            .xp_events
            .iter()
            .filter(|e| Learner::from_columns(e.account_id, e.child_id) == Some(learner))
            .cloned()
            .collect()
    }

    /// The progress row for (learner, lesson), if any.
    pub fn progress_for(&self, learner: Learner, lesson_id: Uuid) -> Option<ProgressRow> {
        self.lock().progress.get(&(learner, lesson_id)).cloned()
    }

    /// Badge codes granted to a learner.
    pub fn badges_for(&self, learner: Learner) -> Vec<String> {
        self.lock()
            .badges
            .iter()
            .filter(|b| Learner::from_columns(b.account_id, b.child_id) == Some(learner))
            .map(|b| b.code.clone())
            .collect()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn lesson_tree(&self, lesson_id: Uuid) -> StoreResult<Option<LessonTree>> {
        Ok(self.lock().lessons.get(&lesson_id).cloned())
    }

    async fn question_context(&self, question_id: Uuid) -> StoreResult<Option<QuestionContext>> {
        let inner = self.lock();
        for lesson in inner.lessons.values() {
            if let Some((activity, question)) = lesson.find_question(question_id) {
                return Ok(Some(QuestionContext {
                    question: question.clone(),
                    kind: activity.kind,
                    activity_title: activity.title.clone(),
                    lesson_id: lesson.id,
                    lesson_title: lesson.title.clone(),
                }));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl EngineStore for MemoryStore {
    async fn child_guardian(&self, child_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(self.lock().children.get(&child_id).copied())
    }

    async fn create_attempt(
        &self,
        learner: Learner,
        lesson_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> StoreResult<Attempt> {
        let attempt = Attempt {
            id: Uuid::new_v4(),
            account_id: learner.account_id(),
            child_id: learner.child_id(),
            lesson_id,
            started_at,
            completed_at: None,
            score: None,
            duration_sec: None,
        };
        self.lock().attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn attempt(&self, attempt_id: Uuid) -> StoreResult<Option<Attempt>> {
        Ok(self.lock().attempts.get(&attempt_id).cloned())
    }

    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        response: serde_json::Value,
        is_correct: bool,
    ) -> StoreResult<()> {
        self.lock().answers.insert(
            (attempt_id, question_id),
            AnswerRow {
                attempt_id,
                question_id,
                response,
                is_correct,
            },
        );
        Ok(())
    }

    async fn answers(&self, attempt_id: Uuid) -> StoreResult<Vec<AnswerRow>> {
        Ok(self
            .lock()
            .answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        score: f64,
        duration_sec: i32,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut inner = self.lock();
        match inner.attempts.get_mut(&attempt_id) {
            Some(attempt) if attempt.completed_at.is_none() => {
                attempt.completed_at = Some(completed_at);
                attempt.score = Some(score);
                attempt.duration_sec = Some(duration_sec);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn upsert_progress(
        &self,
        learner: Learner,
        lesson_id: Uuid,
        status: ProgressStatus,
        stars: i16,
        mastery: f64,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.lock().progress.insert(
            (learner, lesson_id),
            ProgressRow {
                account_id: learner.account_id(),
                child_id: learner.child_id(),
                lesson_id,
                status,
                stars,
                mastery,
                updated_at,
            },
        );
        Ok(())
    }

    async fn completed_lesson_count(&self, learner: Learner) -> StoreResult<i64> {
        Ok(self
            .lock()
            .progress
            .iter()
            .filter(|((l, _), row)| *l == learner && row.status == ProgressStatus::Completed)
            .count() as i64)
    }

    async fn progress_updated_since(
        &self,
        learner: Learner,
        since: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self
            .lock()
            .progress
            .iter()
            .any(|((l, _), row)| *l == learner && row.updated_at >= since))
    }

    async fn append_xp_event(
        &self,
        learner: Learner,
        amount: i32,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.lock().xp_events.push(XpEvent {
            account_id: learner.account_id(),
            child_id: learner.child_id(),
            amount,
            reason: reason.to_string(),
            created_at,
        });
        Ok(())
    }

    async fn grant_badge(
        &self,
        learner: Learner,
        code: &str,
        granted_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut inner = self.lock();
        let already = inner
            .badges
            .iter()
            .any(|b| Learner::from_columns(b.account_id, b.child_id) == Some(learner) && b.code == code);
        if already {
            return Ok(false);
        }
        inner.badges.push(UserBadge {
            account_id: learner.account_id(),
            child_id: learner.child_id(),
            code: code.to_string(),
            granted_at,
        });
        Ok(true)
    }

    async fn review_item(
        &self,
        learner: Learner,
        question_id: Uuid,
    ) -> StoreResult<Option<ReviewItem>> {
        Ok(self.lock().review_items.get(&(learner, question_id)).cloned())
    }

    async fn insert_review_item_if_absent(&self, item: &ReviewItem) -> StoreResult<bool> {
        let Some(learner) = item.learner() else {
            return Ok(false);
        };
        let mut inner = self.lock();
        let key = (learner, item.question_id);
        if inner.review_items.contains_key(&key) {
            return Ok(false);
        }
        inner.review_items.insert(key, item.clone());
        Ok(true)
    }

    async fn update_review_item(
        &self,
        learner: Learner,
        question_id: Uuid,
        box_no: i16,
        due_at: DateTime<Utc>,
        lapses: i32,
        last_grade: Option<i16>,
    ) -> StoreResult<()> {
        if let Some(item) = self.lock().review_items.get_mut(&(learner, question_id)) {
            item.box_no = box_no;
            item.due_at = due_at;
            item.lapses = lapses;
            item.last_grade = last_grade;
        }
        Ok(())
    }

    async fn due_review_items(
        &self,
        learner: Learner,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ReviewItem>> {
        let mut due: Vec<ReviewItem> = self
            .lock()
            .review_items
            .iter()
            .filter(|((l, _), item)| *l == learner && item.due_at <= now)
            .map(|(_, item)| item.clone())
            .collect();
        due.sort_by_key(|item| item.due_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn due_review_count(&self, learner: Learner, now: DateTime<Utc>) -> StoreResult<i64> {
        Ok(self
            .lock()
            .review_items
            .iter()
            .filter(|((l, _), item)| *l == learner && item.due_at <= now)
            .count() as i64)
    }

    async fn box_histogram(&self, learner: Learner) -> StoreResult<[i64; 5]> {
        let mut histogram = [0i64; 5];
        for ((l, _), item) in self.lock().review_items.iter() {
            if *l == learner && (1..=5).contains(&item.box_no) {
                histogram[(item.box_no - 1) as usize] += 1;
            }
        }
        Ok(histogram)
    }
}
