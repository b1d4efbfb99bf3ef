//! Attempt lifecycle: `open → completed`, one way.
//!
//! Finalization is guarded by a conditional update on `completed_at` so a
//! duplicate (or concurrently racing) finish never re-awards XP or
//! re-grants badges; the losing call answers from stored state and writes
//! nothing. Badge evaluation and review seeding are deliberately
//! non-fatal: the score/XP/progress the learner just earned must survive
//! a hiccup in either.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use owlet_db::models::{AnswerRow, Attempt, Learner, ProgressStatus, ReviewItem};
use owlet_db::store::{ContentStore, EngineStore, StoreError};
use owlet_srs::ReviewGrade;

use crate::error::ApiError;
use crate::learner;
use crate::metrics;
use crate::scoring;

use super::model::{
    AnswerReview, AttemptOutcome, AttemptStarted, SkipReason, SkippedAnswer, SubmitAnswersResponse,
    SubmittedAnswer,
};

/// Score at or above which a lesson counts as completed (and the XP bonus
/// applies).
const COMPLETION_THRESHOLD: f64 = 70.0;
/// XP per correct answer.
const XP_PER_CORRECT: i32 = 5;
/// Flat bonus for clearing the completion threshold.
const XP_COMPLETION_BONUS: i32 = 10;
/// XP ledger reason for attempt finalization.
const XP_REASON: &str = "lesson_attempt";

pub struct AttemptService {
    store: Arc<dyn EngineStore>,
    content: Arc<dyn ContentStore>,
}

impl AttemptService {
    pub fn new(store: Arc<dyn EngineStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { store, content }
    }

    pub fn from_state(state: &crate::ApiState) -> Self {
        Self::new(state.store.clone(), state.content.clone())
    }

    /// Start an attempt on a published lesson, for the guardian themselves
    /// or one of their child profiles.
    pub async fn start(
        &self,
        caller: Uuid,
        lesson_id: Uuid,
        child_id: Option<Uuid>,
    ) -> Result<AttemptStarted, ApiError> {
        let learner = learner::resolve(self.store.as_ref(), caller, child_id).await?;

        let lesson = self
            .content
            .lesson_tree(lesson_id)
            .await?
            .filter(|lesson| lesson.published)
            .ok_or_else(|| {
                ApiError::NotFound(format!("lesson {lesson_id} does not exist or is unpublished"))
            })?;

        let attempt = self
            .store
            .create_attempt(learner, lesson.id, Utc::now())
            .await?;

        tracing::info!(attempt_id = %attempt.id, lesson_id = %lesson.id, "attempt started");

        Ok(AttemptStarted {
            attempt_id: attempt.id,
            lesson_id: lesson.id,
            started_at: attempt.started_at,
        })
    }

    /// Score and store a batch of answers for an open attempt. May be
    /// called repeatedly; a later submission for the same question
    /// overwrites the earlier one. Answers for questions outside the
    /// lesson tree are skipped and reported, never fatal.
    pub async fn submit_answers(
        &self,
        caller: Uuid,
        attempt_id: Uuid,
        answers: Vec<SubmittedAnswer>,
    ) -> Result<SubmitAnswersResponse, ApiError> {
        let (attempt, _) = self.owned_attempt(caller, attempt_id).await?;

        if attempt.completed_at.is_some() {
            return Err(ApiError::Validation(
                "attempt is already completed".to_string(),
            ));
        }

        let lesson = self
            .content
            .lesson_tree(attempt.lesson_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("lesson {} does not exist", attempt.lesson_id))
            })?;

        let mut reviews = Vec::with_capacity(answers.len());
        for submitted in answers {
            let review = match lesson.find_question(submitted.question_id) {
                None => AnswerReview::Skipped {
                    question_id: submitted.question_id,
                    reason: SkipReason::UnknownQuestion,
                },
                Some((activity, question)) => {
                    let is_correct =
                        scoring::score_answer(activity.kind, question, &submitted.response);

                    let payload = serde_json::to_value(&submitted.response)
                        .map_err(|err| StoreError::Other(err.to_string()))?;
                    self.store
                        .upsert_answer(attempt_id, question.id, payload, is_correct)
                        .await?;

                    metrics::record_answer_scored(activity.kind.as_str(), is_correct);
                    AnswerReview::Scored {
                        question_id: question.id,
                        is_correct,
                    }
                }
            };
            reviews.push(review);
        }

        let mut scored = 0;
        let mut skipped = Vec::new();
        for review in reviews {
            match review {
                AnswerReview::Scored { .. } => scored += 1,
                AnswerReview::Skipped {
                    question_id,
                    reason,
                } => {
                    tracing::warn!(
                        attempt_id = %attempt_id,
                        question_id = %question_id,
                        reason = reason.as_str(),
                        "skipping answer"
                    );
                    skipped.push(SkippedAnswer {
                        question_id,
                        reason: reason.as_str().to_string(),
                    });
                }
            }
        }

        Ok(SubmitAnswersResponse { scored, skipped })
    }

    /// Finalize an attempt: compute duration, score, XP, stars, progress
    /// and streak; append the XP event; evaluate badges; seed review
    /// items. Idempotent — a second finish returns the stored outcome and
    /// performs no writes.
    pub async fn finish(&self, caller: Uuid, attempt_id: Uuid) -> Result<AttemptOutcome, ApiError> {
        let now = Utc::now();
        let (attempt, learner) = self.owned_attempt(caller, attempt_id).await?;

        let lesson = self
            .content
            .lesson_tree(attempt.lesson_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("lesson {} does not exist", attempt.lesson_id))
            })?;

        let answers = self.store.answers(attempt_id).await?;
        let total_questions = lesson.question_count();
        let correct_answers = answers.iter().filter(|a| a.is_correct).count();
        let score = if total_questions == 0 {
            0.0
        } else {
            100.0 * correct_answers as f64 / total_questions as f64
        };
        let duration_sec = (now - attempt.started_at).num_seconds().max(0) as i32;

        // Streak is a recency signal, not consecutive-day tracking: 2 if
        // anything was practiced in the trailing 24h before this
        // finalize, else 1.
        let streak = if self
            .store
            .progress_updated_since(learner, now - Duration::hours(24))
            .await?
        {
            2
        } else {
            1
        };

        let finalized = self
            .store
            .complete_attempt(attempt_id, score, duration_sec, now)
            .await?;

        if !finalized {
            // Lost the guard: the attempt was already finalized. Answer
            // from stored state without touching XP, badges or reviews.
            let stored = self
                .store
                .attempt(attempt_id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("attempt {attempt_id} does not exist")))?;
            let stored_score = stored.score.unwrap_or(score);

            tracing::info!(attempt_id = %attempt_id, "attempt already finalized; returning stored outcome");

            return Ok(AttemptOutcome {
                score: stored_score.round() as i32,
                xp_awarded: xp_for(stored_score, correct_answers),
                streak,
                correct_answers,
                total_questions,
            });
        }

        let xp_awarded = xp_for(score, correct_answers);
        let status = if score >= COMPLETION_THRESHOLD {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        };

        self.store
            .upsert_progress(learner, lesson.id, status, stars_for(score), score / 100.0, now)
            .await?;
        self.store
            .append_xp_event(learner, xp_awarded, XP_REASON, now)
            .await?;

        if let Err(err) = crate::badge::evaluate_and_grant(self.store.as_ref(), learner, now).await
        {
            tracing::warn!(error = %err, "badge evaluation failed; finish continues");
        }

        for answer in &answers {
            if let Err(err) = self.seed_review(learner, answer, now).await {
                tracing::warn!(
                    question_id = %answer.question_id,
                    error = %err,
                    "review seeding failed; finish continues"
                );
            }
        }

        metrics::record_attempt_finalized(score);
        tracing::info!(
            attempt_id = %attempt_id,
            score = score,
            xp = xp_awarded,
            "attempt finalized"
        );

        Ok(AttemptOutcome {
            score: score.round() as i32,
            xp_awarded,
            streak,
            correct_answers,
            total_questions,
        })
    }

    /// Seed the review schedule for one answered question.
    ///
    /// First encounter creates the item (box 2 if correct, box 1 with a
    /// lapse if not). A fresh mistake on an existing item re-runs the
    /// "again" transition whatever its box; a fresh correct answer leaves
    /// it alone — only explicit review grading moves an item up.
    async fn seed_review(
        &self,
        learner: Learner,
        answer: &AnswerRow,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self.store.review_item(learner, answer.question_id).await? {
            Some(item) => {
                if !answer.is_correct {
                    self.demote(learner, &item, now).await?;
                }
            }
            None => {
                let seed = owlet_srs::seed_new(answer.is_correct, now);
                let item = ReviewItem::new(
                    learner,
                    answer.question_id,
                    seed.box_no,
                    seed.due_at,
                    seed.lapses,
                    None,
                );
                let inserted = self.store.insert_review_item_if_absent(&item).await?;
                if !inserted && !answer.is_correct {
                    // Lost a concurrent create race; demote whatever won.
                    if let Some(existing) =
                        self.store.review_item(learner, answer.question_id).await?
                    {
                        self.demote(learner, &existing, now).await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn demote(
        &self,
        learner: Learner,
        item: &ReviewItem,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let t = owlet_srs::apply_grade(item.box_no, item.lapses, ReviewGrade::Again, now);
        self.store
            .update_review_item(
                learner,
                item.question_id,
                t.box_no,
                t.due_at,
                t.lapses,
                item.last_grade,
            )
            .await
    }

    /// Fetch an attempt and check the caller may act on it: it is theirs,
    /// or it belongs to a child they are the guardian of.
    async fn owned_attempt(
        &self,
        caller: Uuid,
        attempt_id: Uuid,
    ) -> Result<(Attempt, Learner), ApiError> {
        let attempt = self
            .store
            .attempt(attempt_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("attempt {attempt_id} does not exist")))?;

        let learner = attempt
            .learner()
            .ok_or_else(|| StoreError::Other(format!("attempt {attempt_id} has no owner")))?;

        match learner {
            Learner::Account(account) if account == caller => {}
            Learner::Account(_) => {
                return Err(ApiError::Auth(
                    "You do not own this attempt".to_string(),
                ));
            }
            Learner::Child(child) => {
                let guardian = self.store.child_guardian(child).await?;
                if guardian != Some(caller) {
                    return Err(ApiError::Auth(
                        "You are not the guardian of this attempt's child profile".to_string(),
                    ));
                }
            }
        }

        Ok((attempt, learner))
    }
}

/// XP for a finalized attempt: 5 per correct answer plus a 10-point bonus
/// at or above the completion threshold.
fn xp_for(score: f64, correct_answers: usize) -> i32 {
    let bonus = if score >= COMPLETION_THRESHOLD {
        XP_COMPLETION_BONUS
    } else {
        0
    };
    XP_PER_CORRECT * correct_answers as i32 + bonus
}

/// Stars for a finalized attempt: 3 at 90+, 2 at 80+, 1 at 70+, else 0.
fn stars_for(score: f64) -> i16 {
    if score >= 90.0 {
        3
    } else if score >= 80.0 {
        2
    } else if score >= COMPLETION_THRESHOLD {
        1
    } else {
        0
    }
}
