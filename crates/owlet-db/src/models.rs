use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of exercise an activity presents.
///
/// Stored as text in the content tables; kinds this service does not know
/// about deserialize to [`ActivityKind::Unknown`] so new client-side
/// activity types never break scoring — they just score incorrect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    QuizMcq,
    ListenChoose,
    MatchPairs,
    FillBlank,
    Order,
    #[serde(other)]
    Unknown,
}

impl ActivityKind {
    /// Parse the database representation. Unrecognized kinds map to
    /// [`Self::Unknown`] rather than erroring.
    pub fn parse(s: &str) -> Self {
        match s {
            "quiz_mcq" => Self::QuizMcq,
            "listen_choose" => Self::ListenChoose,
            "match_pairs" => Self::MatchPairs,
            "fill_blank" => Self::FillBlank,
            "order" => Self::Order,
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuizMcq => "quiz_mcq",
            Self::ListenChoose => "listen_choose",
            Self::MatchPairs => "match_pairs",
            Self::FillBlank => "fill_blank",
            Self::Order => "order",
            Self::Unknown => "unknown",
        }
    }
}

/// The identity an attempt, review item, progress row or XP event belongs
/// to: either a guardian account practicing directly, or one of their
/// child profiles. Exactly one — the type makes the invariant structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Learner {
    Account(Uuid),
    Child(Uuid),
}

impl Learner {
    /// The `account_id` column value for this learner.
    pub const fn account_id(self) -> Option<Uuid> {
        match self {
            Self::Account(id) => Some(id),
            Self::Child(_) => None,
        }
    }

    /// The `child_id` column value for this learner.
    pub const fn child_id(self) -> Option<Uuid> {
        match self {
            Self::Account(_) => None,
            Self::Child(id) => Some(id),
        }
    }

    /// Rebuild a learner from the nullable column pair. `None` means the
    /// row violates the exactly-one-owner constraint.
    pub const fn from_columns(account_id: Option<Uuid>, child_id: Option<Uuid>) -> Option<Self> {
        match (account_id, child_id) {
            (Some(id), None) => Some(Self::Account(id)),
            (None, Some(id)) => Some(Self::Child(id)),
            _ => None,
        }
    }
}

/// A child profile under a guardian account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildProfile {
    pub id: Uuid,
    /// The guardian's account id.
    pub account_id: Uuid,
    pub display_name: String,
}

/// One lesson-taking session.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Attempt {
    pub id: Uuid,
    pub account_id: Option<Uuid>,
    pub child_id: Option<Uuid>,
    pub lesson_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, by the finalize-once guard.
    pub completed_at: Option<DateTime<Utc>>,
    /// Percentage score 0–100, set at finalization.
    pub score: Option<f64>,
    pub duration_sec: Option<i32>,
}

impl Attempt {
    /// The learner who owns this attempt, or `None` for a row that
    /// violates the exactly-one-owner invariant.
    pub const fn learner(&self) -> Option<Learner> {
        Learner::from_columns(self.account_id, self.child_id)
    }
}

/// One submitted answer, keyed by (attempt, question). Resubmission
/// before finalization overwrites the previous row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AnswerRow {
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    /// The tagged response payload as submitted, stored verbatim.
    pub response: serde_json::Value,
    pub is_correct: bool,
}

/// A Leitner review item, unique per (learner, question).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewItem {
    pub account_id: Option<Uuid>,
    pub child_id: Option<Uuid>,
    pub question_id: Uuid,
    /// Current Leitner box, 1–5.
    pub box_no: i16,
    pub due_at: DateTime<Utc>,
    pub lapses: i32,
    /// The last explicit review grade (0–3), if the item has been graded.
    pub last_grade: Option<i16>,
}

impl ReviewItem {
    pub const fn new(
        learner: Learner,
        question_id: Uuid,
        box_no: i16,
        due_at: DateTime<Utc>,
        lapses: i32,
        last_grade: Option<i16>,
    ) -> Self {
        Self {
            account_id: learner.account_id(),
            child_id: learner.child_id(),
            question_id,
            box_no,
            due_at,
            lapses,
            last_grade,
        }
    }

    pub const fn learner(&self) -> Option<Learner> {
        Learner::from_columns(self.account_id, self.child_id)
    }
}

/// Lesson completion state for a learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn parse(s: &str) -> Self {
        if s == "completed" {
            Self::Completed
        } else {
            Self::InProgress
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// Per-(learner, lesson) progress. The last finalization wins — no
/// monotonic-improvement rule.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressRow {
    pub account_id: Option<Uuid>,
    pub child_id: Option<Uuid>,
    pub lesson_id: Uuid,
    pub status: ProgressStatus,
    pub stars: i16,
    /// 0.0–1.0, the most recent attempt's percentage score.
    pub mastery: f64,
    pub updated_at: DateTime<Utc>,
}

/// Append-only XP ledger entry.
#[derive(Debug, Clone, Serialize)]
pub struct XpEvent {
    pub account_id: Option<Uuid>,
    pub child_id: Option<Uuid>,
    pub amount: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// A badge granted to a learner. At most one per (learner, code).
#[derive(Debug, Clone, Serialize)]
pub struct UserBadge {
    pub account_id: Option<Uuid>,
    pub child_id: Option<Uuid>,
    pub code: String,
    pub granted_at: DateTime<Utc>,
}

// --- Content tree (read-only collaborator) ---

/// A lesson with its full activity/question/option tree, as the scorer
/// and finalizer consume it.
#[derive(Debug, Clone, Serialize)]
pub struct LessonTree {
    pub id: Uuid,
    pub title: String,
    pub published: bool,
    pub activities: Vec<ActivityNode>,
}

impl LessonTree {
    /// Total question count across all activities.
    pub fn question_count(&self) -> usize {
        self.activities.iter().map(|a| a.questions.len()).sum()
    }

    /// Locate a question anywhere in the tree, with its activity.
    pub fn find_question(&self, question_id: Uuid) -> Option<(&ActivityNode, &Question)> {
        self.activities.iter().find_map(|activity| {
            activity
                .questions
                .iter()
                .find(|q| q.id == question_id)
                .map(|q| (activity, q))
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityNode {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: Uuid,
    pub prompt: String,
    /// Kind-specific answer key (e.g. `{"correct": [...]}` or
    /// `{"pairs": [...]}`), interpreted by the scorer.
    pub answer_key: serde_json::Value,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionOption {
    pub id: Uuid,
    pub label: String,
    pub is_correct: bool,
}

/// A single question with enough surrounding context to display in the
/// review queue.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionContext {
    pub question: Question,
    pub kind: ActivityKind,
    pub activity_title: String,
    pub lesson_id: Uuid,
    pub lesson_title: String,
}
