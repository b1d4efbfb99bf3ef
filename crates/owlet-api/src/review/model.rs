use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use owlet_db::models::ActivityKind;

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    pub child_id: Option<Uuid>,
    /// Page size, default 10, clamped into 1–50.
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReviewQueueResponse {
    pub items: Vec<ReviewQueueItem>,
    /// Count of everything due, ignoring the limit.
    pub total_due: i64,
    /// All of the learner's items per box, due or not.
    pub boxes: BoxDistribution,
}

/// A due review item enriched with its display context.
#[derive(Debug, Serialize)]
pub struct ReviewQueueItem {
    pub question_id: Uuid,
    pub prompt: String,
    pub activity_kind: ActivityKind,
    pub activity_title: String,
    pub lesson_id: Uuid,
    pub lesson_title: String,
    #[serde(rename = "box")]
    pub box_no: i16,
    pub due_at: DateTime<Utc>,
    pub lapses: i32,
}

#[derive(Debug, Default, Serialize)]
pub struct BoxDistribution {
    pub box1: i64,
    pub box2: i64,
    pub box3: i64,
    pub box4: i64,
    pub box5: i64,
}

impl From<[i64; 5]> for BoxDistribution {
    fn from(counts: [i64; 5]) -> Self {
        Self {
            box1: counts[0],
            box2: counts[1],
            box3: counts[2],
            box4: counts[3],
            box5: counts[4],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub child_id: Option<Uuid>,
    /// Recall grade, 0 (again) through 3 (easy).
    pub grade: i16,
}

#[derive(Debug, Serialize)]
pub struct GradeResponse {
    pub question_id: Uuid,
    #[serde(rename = "box")]
    pub box_no: i16,
    pub due_at: DateTime<Utc>,
    pub lapses: i32,
    pub last_grade: i16,
    pub feedback: String,
    /// Items still due after this one was rescheduled.
    pub remaining_due: i64,
}
