//! The Postgres-backed store, on top of sqlx.
//!
//! Uniqueness-sensitive writes (answers, review items, progress, badge
//! grants) go through `ON CONFLICT` so concurrent submissions cannot
//! create duplicate rows, and the finalize-once guard is a conditional
//! `UPDATE` rather than a read-then-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    ActivityKind, ActivityNode, AnswerRow, Attempt, Learner, LessonTree, ProgressStatus, Question,
    QuestionContext, QuestionOption, ReviewItem,
};
use crate::store::{ContentStore, EngineStore, StoreResult};

/// Store implementation backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn lesson_tree(&self, lesson_id: Uuid) -> StoreResult<Option<LessonTree>> {
        let lesson: Option<(Uuid, String, bool)> = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT id, title, published
                FROM lessons
                WHERE id = $1
            "#,
        )
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, title, published)) = lesson else {
            return Ok(None);
        };

        let activities: Vec<(Uuid, String, String)> = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT id, kind, title
                FROM activities
                WHERE lesson_id = $1
                ORDER BY position, id
            "#,
        )
        .bind(lesson_id)
        .fetch_all(&self.pool)
        .await?;

        let activity_ids: Vec<Uuid> = activities.iter().map(|(id, _, _)| *id).collect();

        let questions: Vec<(Uuid, Uuid, String, serde_json::Value)> = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT id, activity_id, prompt, answer_key
                FROM questions
                WHERE activity_id = ANY($1)
                ORDER BY position, id
            "#,
        )
        .bind(&activity_ids)
        .fetch_all(&self.pool)
        .await?;

        let question_ids: Vec<Uuid> = questions.iter().map(|(id, _, _, _)| *id).collect();

        let options: Vec<(Uuid, Uuid, String, bool)> = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT id, question_id, label, is_correct
                FROM question_options
                WHERE question_id = ANY($1)
                ORDER BY position, id
            "#,
        )
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut options_by_question: HashMap<Uuid, Vec<QuestionOption>> = HashMap::new();
        for (id, question_id, label, is_correct) in options {
            options_by_question
                .entry(question_id)
                .or_default()
                .push(QuestionOption {
                    id,
                    label,
                    is_correct,
                });
        }

        let mut questions_by_activity: HashMap<Uuid, Vec<Question>> = HashMap::new();
        for (id, activity_id, prompt, answer_key) in questions {
            questions_by_activity
                .entry(activity_id)
                .or_default()
                .push(Question {
                    id,
                    prompt,
                    answer_key,
                    options: options_by_question.remove(&id).unwrap_or_default(),
                });
        }

        let activities = activities
            .into_iter()
            .map(|(id, kind, title)| ActivityNode {
                id,
                kind: ActivityKind::parse(&kind),
                title,
                questions: questions_by_activity.remove(&id).unwrap_or_default(),
            })
            .collect();

        Ok(Some(LessonTree {
            id,
            title,
            published,
            activities,
        }))
    }

    async fn question_context(&self, question_id: Uuid) -> StoreResult<Option<QuestionContext>> {
        let row: Option<(Uuid, String, serde_json::Value, String, String, Uuid, String)> =
            sqlx::query_as(
                // language=PostgreSQL
                r#"
                    SELECT
                        q.id,
                        q.prompt,
                        q.answer_key,
                        a.kind,
                        a.title AS activity_title,
                        l.id AS lesson_id,
                        l.title AS lesson_title
                    FROM questions q
                    JOIN activities a ON a.id = q.activity_id
                    JOIN lessons l ON l.id = a.lesson_id
                    WHERE q.id = $1
                "#,
            )
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some((id, prompt, answer_key, kind, activity_title, lesson_id, lesson_title)) = row
        else {
            return Ok(None);
        };

        let options: Vec<(Uuid, String, bool)> = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT id, label, is_correct
                FROM question_options
                WHERE question_id = $1
                ORDER BY position, id
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(QuestionContext {
            question: Question {
                id,
                prompt,
                answer_key,
                options: options
                    .into_iter()
                    .map(|(id, label, is_correct)| QuestionOption {
                        id,
                        label,
                        is_correct,
                    })
                    .collect(),
            },
            kind: ActivityKind::parse(&kind),
            activity_title,
            lesson_id,
            lesson_title,
        }))
    }
}

#[async_trait]
impl EngineStore for PgStore {
    async fn child_guardian(&self, child_id: Uuid) -> StoreResult<Option<Uuid>> {
        let guardian: Option<Uuid> = sqlx::query_scalar(
            // language=PostgreSQL
            r#"
                SELECT account_id
                FROM children
                WHERE id = $1
            "#,
        )
        .bind(child_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(guardian)
    }

    async fn create_attempt(
        &self,
        learner: Learner,
        lesson_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> StoreResult<Attempt> {
        let attempt = sqlx::query_as(
            // language=PostgreSQL
            r#"
                INSERT INTO attempts (id, account_id, child_id, lesson_id, started_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, account_id, child_id, lesson_id, started_at,
                          completed_at, score, duration_sec
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(learner.account_id())
        .bind(learner.child_id())
        .bind(lesson_id)
        .bind(started_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn attempt(&self, attempt_id: Uuid) -> StoreResult<Option<Attempt>> {
        let attempt = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT id, account_id, child_id, lesson_id, started_at,
                       completed_at, score, duration_sec
                FROM attempts
                WHERE id = $1
            "#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        response: serde_json::Value,
        is_correct: bool,
    ) -> StoreResult<()> {
        sqlx::query(
            // language=PostgreSQL
            r#"
                INSERT INTO answers (attempt_id, question_id, response, is_correct)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (attempt_id, question_id)
                DO UPDATE SET
                    response = $3,
                    is_correct = $4,
                    updated_at = NOW()
            "#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(response)
        .bind(is_correct)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn answers(&self, attempt_id: Uuid) -> StoreResult<Vec<AnswerRow>> {
        let rows = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT attempt_id, question_id, response, is_correct
                FROM answers
                WHERE attempt_id = $1
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        score: f64,
        duration_sec: i32,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        // The conditional update IS the idempotency guard: only the call
        // that flips completed_at from NULL owns the finalize side effects.
        let result = sqlx::query(
            // language=PostgreSQL
            r#"
                UPDATE attempts
                SET completed_at = $2,
                    score = $3,
                    duration_sec = $4
                WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(attempt_id)
        .bind(completed_at)
        .bind(score)
        .bind(duration_sec)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
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
        sqlx::query(
            // language=PostgreSQL
            r#"
                INSERT INTO progress (account_id, child_id, lesson_id, status, stars, mastery, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (account_id, child_id, lesson_id)
                DO UPDATE SET
                    status = $4,
                    stars = $5,
                    mastery = $6,
                    updated_at = $7
            "#,
        )
        .bind(learner.account_id())
        .bind(learner.child_id())
        .bind(lesson_id)
        .bind(status.as_str())
        .bind(stars)
        .bind(mastery)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn completed_lesson_count(&self, learner: Learner) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            // language=PostgreSQL
            r#"
                SELECT COUNT(*)
                FROM progress
                WHERE account_id IS NOT DISTINCT FROM $1
                  AND child_id IS NOT DISTINCT FROM $2
                  AND status = 'completed'
            "#,
        )
        .bind(learner.account_id())
        .bind(learner.child_id())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn progress_updated_since(
        &self,
        learner: Learner,
        since: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            // language=PostgreSQL
            r#"
                SELECT EXISTS(
                    SELECT 1 FROM progress
                    WHERE account_id IS NOT DISTINCT FROM $1
                      AND child_id IS NOT DISTINCT FROM $2
                      AND updated_at >= $3
                )
            "#,
        )
        .bind(learner.account_id())
        .bind(learner.child_id())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn append_xp_event(
        &self,
        learner: Learner,
        amount: i32,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            // language=PostgreSQL
            r#"
                INSERT INTO xp_events (id, account_id, child_id, amount, reason, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(learner.account_id())
        .bind(learner.child_id())
        .bind(amount)
        .bind(reason)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn grant_badge(
        &self,
        learner: Learner,
        code: &str,
        granted_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            // language=PostgreSQL
            r#"
                INSERT INTO user_badges (account_id, child_id, code, granted_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (account_id, child_id, code) DO NOTHING
            "#,
        )
        .bind(learner.account_id())
        .bind(learner.child_id())
        .bind(code)
        .bind(granted_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn review_item(
        &self,
        learner: Learner,
        question_id: Uuid,
    ) -> StoreResult<Option<ReviewItem>> {
        let item = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT account_id, child_id, question_id, box_no, due_at, lapses, last_grade
                FROM review_items
                WHERE account_id IS NOT DISTINCT FROM $1
                  AND child_id IS NOT DISTINCT FROM $2
                  AND question_id = $3
            "#,
        )
        .bind(learner.account_id())
        .bind(learner.child_id())
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn insert_review_item_if_absent(&self, item: &ReviewItem) -> StoreResult<bool> {
        let result = sqlx::query(
            // language=PostgreSQL
            r#"
                INSERT INTO review_items (account_id, child_id, question_id, box_no, due_at, lapses, last_grade)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (account_id, child_id, question_id) DO NOTHING
            "#,
        )
        .bind(item.account_id)
        .bind(item.child_id)
        .bind(item.question_id)
        .bind(item.box_no)
        .bind(item.due_at)
        .bind(item.lapses)
        .bind(item.last_grade)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
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
        sqlx::query(
            // language=PostgreSQL
            r#"
                UPDATE review_items
                SET box_no = $4,
                    due_at = $5,
                    lapses = $6,
                    last_grade = $7,
                    updated_at = NOW()
                WHERE account_id IS NOT DISTINCT FROM $1
                  AND child_id IS NOT DISTINCT FROM $2
                  AND question_id = $3
            "#,
        )
        .bind(learner.account_id())
        .bind(learner.child_id())
        .bind(question_id)
        .bind(box_no)
        .bind(due_at)
        .bind(lapses)
        .bind(last_grade)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn due_review_items(
        &self,
        learner: Learner,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ReviewItem>> {
        let items = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT account_id, child_id, question_id, box_no, due_at, lapses, last_grade
                FROM review_items
                WHERE account_id IS NOT DISTINCT FROM $1
                  AND child_id IS NOT DISTINCT FROM $2
                  AND due_at <= $3
                ORDER BY due_at
                LIMIT $4
            "#,
        )
        .bind(learner.account_id())
        .bind(learner.child_id())
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn due_review_count(&self, learner: Learner, now: DateTime<Utc>) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            // language=PostgreSQL
            r#"
                SELECT COUNT(*)
                FROM review_items
                WHERE account_id IS NOT DISTINCT FROM $1
                  AND child_id IS NOT DISTINCT FROM $2
                  AND due_at <= $3
            "#,
        )
        .bind(learner.account_id())
        .bind(learner.child_id())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn box_histogram(&self, learner: Learner) -> StoreResult<[i64; 5]> {
        let rows: Vec<(i16, i64)> = sqlx::query_as(
            // language=PostgreSQL
            r#"
                SELECT box_no, COUNT(*)
                FROM review_items
                WHERE account_id IS NOT DISTINCT FROM $1
                  AND child_id IS NOT DISTINCT FROM $2
                GROUP BY box_no
            "#,
        )
        .bind(learner.account_id())
        .bind(learner.child_id())
        .fetch_all(&self.pool)
        .await?;

        let mut histogram = [0i64; 5];
        for (box_no, count) in rows {
            if (1..=5).contains(&box_no) {
                histogram[(box_no - 1) as usize] = count;
            }
        }
        Ok(histogram)
    }
}
