//! Persistence-collaborator traits the engine services are written
//! against. The Postgres implementation lives in [`crate::postgres`]; the
//! in-memory implementation (tests, no-database deployments) in
//! [`crate::memory`]. There is exactly one business-logic code path —
//! everything store-specific hides behind these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AnswerRow, Attempt, Learner, LessonTree, ProgressStatus, QuestionContext, ReviewItem,
};

/// Errors surfaced by a store implementation. Callers treat anything here
/// as an internal "operation failed" — the interesting error taxonomy
/// (not-found, unauthorized, validation) belongs to the service layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store error: {0}")]
    Other(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to the published learning content tree.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch a lesson with all its activities, questions and options.
    async fn lesson_tree(&self, lesson_id: Uuid) -> StoreResult<Option<LessonTree>>;

    /// Fetch a single question with its activity/lesson display context.
    async fn question_context(&self, question_id: Uuid) -> StoreResult<Option<QuestionContext>>;
}

/// Mutable state owned by the review engine: attempts, answers, review
/// items, progress, the XP ledger and badge grants.
#[async_trait]
pub trait EngineStore: Send + Sync {
    // --- guardianship ---

    /// The guardian account id of a child profile, if the child exists.
    async fn child_guardian(&self, child_id: Uuid) -> StoreResult<Option<Uuid>>;

    // --- attempts & answers ---

    async fn create_attempt(
        &self,
        learner: Learner,
        lesson_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> StoreResult<Attempt>;

    async fn attempt(&self, attempt_id: Uuid) -> StoreResult<Option<Attempt>>;

    /// Insert or overwrite the answer for (attempt, question).
    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        response: serde_json::Value,
        is_correct: bool,
    ) -> StoreResult<()>;

    async fn answers(&self, attempt_id: Uuid) -> StoreResult<Vec<AnswerRow>>;

    /// The finalize-once guard: set `completed_at`/`score`/`duration_sec`
    /// only if the attempt is still open. Returns whether this call won
    /// the guard — concurrent duplicate finishes see `false` and must not
    /// re-apply side effects.
    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        score: f64,
        duration_sec: i32,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    // --- progress, XP, badges ---

    async fn upsert_progress(
        &self,
        learner: Learner,
        lesson_id: Uuid,
        status: ProgressStatus,
        stars: i16,
        mastery: f64,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Count of lessons this learner has completed (progress rows with
    /// `completed` status).
    async fn completed_lesson_count(&self, learner: Learner) -> StoreResult<i64>;

    /// Whether any progress row for this learner was updated at or after
    /// `since`. Backs the recency streak heuristic.
    async fn progress_updated_since(
        &self,
        learner: Learner,
        since: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn append_xp_event(
        &self,
        learner: Learner,
        amount: i32,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Grant a badge if not already granted. Returns whether the grant is
    /// new — re-evaluation never duplicates.
    async fn grant_badge(
        &self,
        learner: Learner,
        code: &str,
        granted_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    // --- review items ---

    async fn review_item(
        &self,
        learner: Learner,
        question_id: Uuid,
    ) -> StoreResult<Option<ReviewItem>>;

    /// Create a review item unless one already exists for its
    /// (learner, question). Returns whether a row was inserted — `false`
    /// means a concurrent writer (or an earlier attempt) got there first.
    async fn insert_review_item_if_absent(&self, item: &ReviewItem) -> StoreResult<bool>;

    /// Persist a grading transition onto an existing review item.
    async fn update_review_item(
        &self,
        learner: Learner,
        question_id: Uuid,
        box_no: i16,
        due_at: DateTime<Utc>,
        lapses: i32,
        last_grade: Option<i16>,
    ) -> StoreResult<()>;

    /// Review items due at or before `now`, ordered ascending by due
    /// time, truncated to `limit`.
    async fn due_review_items(
        &self,
        learner: Learner,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ReviewItem>>;

    /// Count of due items, ignoring any limit.
    async fn due_review_count(&self, learner: Learner, now: DateTime<Utc>) -> StoreResult<i64>;

    /// Count of all review items per box 1–5 regardless of due status,
    /// indexed as `[box1, box2, box3, box4, box5]`.
    async fn box_histogram(&self, learner: Learner) -> StoreResult<[i64; 5]>;
}
