//! Selecting and grading due review items.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use owlet_db::store::{ContentStore, EngineStore};
use owlet_srs::ReviewGrade;

use crate::error::ApiError;
use crate::learner;
use crate::metrics;

use super::model::{GradeResponse, ReviewQueueItem, ReviewQueueResponse};

pub const DEFAULT_QUEUE_LIMIT: i64 = 10;
const MIN_QUEUE_LIMIT: i64 = 1;
const MAX_QUEUE_LIMIT: i64 = 50;

pub struct ReviewService {
    store: Arc<dyn EngineStore>,
    content: Arc<dyn ContentStore>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn EngineStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { store, content }
    }

    pub fn from_state(state: &crate::ApiState) -> Self {
        Self::new(state.store.clone(), state.content.clone())
    }

    /// The learner's due items, oldest due first, enriched for display,
    /// plus the total due count and the box histogram.
    pub async fn queue(
        &self,
        caller: Uuid,
        child_id: Option<Uuid>,
        limit: Option<i64>,
    ) -> Result<ReviewQueueResponse, ApiError> {
        let learner = learner::resolve(self.store.as_ref(), caller, child_id).await?;
        let now = Utc::now();
        let limit = limit
            .unwrap_or(DEFAULT_QUEUE_LIMIT)
            .clamp(MIN_QUEUE_LIMIT, MAX_QUEUE_LIMIT);

        let due = self.store.due_review_items(learner, now, limit).await?;
        let total_due = self.store.due_review_count(learner, now).await?;
        let boxes = self.store.box_histogram(learner).await?;

        let mut items = Vec::with_capacity(due.len());
        for item in due {
            match self.content.question_context(item.question_id).await? {
                Some(ctx) => items.push(ReviewQueueItem {
                    question_id: item.question_id,
                    prompt: ctx.question.prompt,
                    activity_kind: ctx.kind,
                    activity_title: ctx.activity_title,
                    lesson_id: ctx.lesson_id,
                    lesson_title: ctx.lesson_title,
                    box_no: item.box_no,
                    due_at: item.due_at,
                    lapses: item.lapses,
                }),
                None => {
                    // Content was removed from under the item; keep the
                    // queue serving.
                    tracing::warn!(
                        question_id = %item.question_id,
                        "review item has no question context; dropping from page"
                    );
                }
            }
        }

        Ok(ReviewQueueResponse {
            items,
            total_due,
            boxes: boxes.into(),
        })
    }

    /// Grade the learner's review item for a question and persist the
    /// Leitner transition.
    pub async fn grade(
        &self,
        caller: Uuid,
        child_id: Option<Uuid>,
        question_id: Uuid,
        grade_value: i16,
    ) -> Result<GradeResponse, ApiError> {
        let learner = learner::resolve(self.store.as_ref(), caller, child_id).await?;
        let grade = ReviewGrade::from_value(grade_value)
            .map_err(|err| ApiError::Validation(err.to_string()))?;
        let now = Utc::now();

        let item = self
            .store
            .review_item(learner, question_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("no review item for question {question_id}"))
            })?;

        let transition = owlet_srs::apply_grade(item.box_no, item.lapses, grade, now);

        self.store
            .update_review_item(
                learner,
                question_id,
                transition.box_no,
                transition.due_at,
                transition.lapses,
                Some(grade.value()),
            )
            .await?;

        // The item is now due in the future, so a fresh count excludes it.
        let remaining_due = self.store.due_review_count(learner, now).await?;

        metrics::record_review_graded(grade.value());
        tracing::info!(
            question_id = %question_id,
            grade = grade.value(),
            box_no = transition.box_no,
            "review item graded"
        );

        Ok(GradeResponse {
            question_id,
            box_no: transition.box_no,
            due_at: transition.due_at,
            lapses: transition.lapses,
            last_grade: grade.value(),
            feedback: owlet_srs::feedback(grade, transition.box_no, transition.lapses),
            remaining_due,
        })
    }
}
