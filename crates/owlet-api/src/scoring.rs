//! Answer scoring for every activity kind.
//!
//! Grading must be strict enough to verify real knowledge but forgiving
//! where children genuinely fumble: fill-blank comparison ignores case and
//! surrounding whitespace and tolerates a single-character typo. Anything
//! the scorer cannot make sense of — an unknown activity kind, a payload
//! that does not match the question's kind, a broken answer key — scores
//! incorrect rather than erroring: a content bug must never fail a
//! child's lesson.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;

use owlet_db::models::{ActivityKind, Question};

/// A submitted response, tagged by activity kind.
///
/// Wire shape: `{"kind": "fill_blank", "blanks": ["cat", "ran"]}` and so
/// on. The tag must match the question's activity kind to score correct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerPayload {
    /// Selected option labels; order is irrelevant.
    QuizMcq { selected: Vec<String> },
    /// The single selected option label.
    ListenChoose { selected: String },
    /// Matched (left, right) pairs; order is irrelevant.
    MatchPairs { pairs: Vec<PairAnswer> },
    /// One entry per blank, in blank order.
    FillBlank { blanks: Vec<String> },
    /// The submitted ordering.
    Order { sequence: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairAnswer {
    pub left: String,
    pub right: String,
}

/// Answer key for kinds keyed on a `correct` list (listen_choose, order).
#[derive(Debug, Deserialize)]
struct CorrectKey {
    #[serde(default)]
    correct: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PairsKey {
    #[serde(default)]
    pairs: Vec<PairAnswer>,
}

#[derive(Debug, Deserialize)]
struct BlanksKey {
    #[serde(default)]
    blanks: Vec<String>,
}

/// Score a response against a question. Pure — no side effects, no I/O.
pub fn score_answer(kind: ActivityKind, question: &Question, response: &AnswerPayload) -> bool {
    match (kind, response) {
        (ActivityKind::QuizMcq, AnswerPayload::QuizMcq { selected }) => {
            // Exact set equality with the options flagged correct: extra
            // or missing selections both fail.
            let expected: BTreeSet<&str> = question
                .options
                .iter()
                .filter(|o| o.is_correct)
                .map(|o| o.label.as_str())
                .collect();
            let submitted: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
            expected == submitted
        }
        (ActivityKind::ListenChoose, AnswerPayload::ListenChoose { selected }) => {
            match parse_key::<CorrectKey>(question) {
                Some(key) => key.correct.first() == Some(selected),
                None => false,
            }
        }
        (ActivityKind::MatchPairs, AnswerPayload::MatchPairs { pairs }) => {
            match parse_key::<PairsKey>(question) {
                Some(key) => {
                    // Set equality over pairs: same cardinality, and every
                    // key pair present somewhere in the submission.
                    pairs.len() == key.pairs.len()
                        && key.pairs.iter().all(|pair| pairs.contains(pair))
                }
                None => false,
            }
        }
        (ActivityKind::FillBlank, AnswerPayload::FillBlank { blanks }) => {
            match parse_key::<BlanksKey>(question) {
                Some(key) => {
                    blanks.len() == key.blanks.len()
                        && key
                            .blanks
                            .iter()
                            .zip(blanks)
                            .all(|(expected, given)| blank_matches(expected, given))
                }
                None => false,
            }
        }
        (ActivityKind::Order, AnswerPayload::Order { sequence }) => {
            match parse_key::<CorrectKey>(question) {
                Some(key) => *sequence == key.correct,
                None => false,
            }
        }
        // Unknown kind, or a payload whose tag does not match the
        // question's kind: fail-safe incorrect.
        _ => false,
    }
}

fn parse_key<T: DeserializeOwned>(question: &Question) -> Option<T> {
    match serde_json::from_value(question.answer_key.clone()) {
        Ok(key) => Some(key),
        Err(err) => {
            tracing::warn!(question_id = %question.id, error = %err, "unparsable answer key");
            None
        }
    }
}

/// Compare one fill-blank entry against its expected string: lowercase and
/// trim both sides, then accept exact equality or edit distance ≤ 1. An
/// empty (or whitespace-only) submission is always incorrect.
fn blank_matches(expected: &str, given: &str) -> bool {
    let expected = expected.trim().to_lowercase();
    let given = given.trim().to_lowercase();

    if given.is_empty() {
        return false;
    }

    expected == given || levenshtein(&expected, &given) <= 1
}

/// Standard dynamic-programming Levenshtein distance; insertion, deletion
/// and substitution each cost 1. Only ever used as the ≤1 typo threshold.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b_len {
        matrix[0][j] = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}
