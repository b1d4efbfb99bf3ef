use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::AnswerPayload;

#[derive(Debug, Deserialize)]
pub struct StartAttemptRequest {
    pub lesson_id: Uuid,
    /// Act as this child profile; omitted means the guardian practices
    /// themselves.
    pub child_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AttemptStarted {
    pub attempt_id: Uuid,
    pub lesson_id: Uuid,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<SubmittedAnswer>,
}

/// One answer in a submission batch. The payload is the kind-tagged
/// response union, flattened next to the question id:
/// `{"question_id": "...", "kind": "order", "sequence": [...]}`.
#[derive(Debug, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    #[serde(flatten)]
    pub response: AnswerPayload,
}

/// Per-answer outcome of a submission: scored against the key, or skipped
/// with a reason. Skips are reported, never fatal.
#[derive(Debug)]
pub enum AnswerReview {
    Scored { question_id: Uuid, is_correct: bool },
    Skipped { question_id: Uuid, reason: SkipReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The question id does not exist in the attempt's lesson tree.
    UnknownQuestion,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownQuestion => "unknown question",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswersResponse {
    /// Count of answers scored and stored.
    pub scored: usize,
    pub skipped: Vec<SkippedAnswer>,
}

#[derive(Debug, Serialize)]
pub struct SkippedAnswer {
    pub question_id: Uuid,
    pub reason: String,
}

/// The finalization result returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptOutcome {
    /// Percentage score, rounded to the nearest integer.
    pub score: i32,
    pub xp_awarded: i32,
    pub streak: i32,
    pub correct_answers: usize,
    pub total_questions: usize,
}
