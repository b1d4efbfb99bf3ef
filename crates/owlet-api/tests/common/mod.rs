use std::sync::Arc;

use uuid::Uuid;

use owlet_api::attempt::AttemptService;
use owlet_api::attempt::model::SubmittedAnswer;
use owlet_api::review::ReviewService;
use owlet_api::scoring::{AnswerPayload, PairAnswer};
use owlet_db::memory::MemoryStore;
use owlet_db::models::{
    ActivityKind, ActivityNode, LessonTree, Question, QuestionOption,
};
use serde_json::json;

/// A test fixture around the in-memory store: seed content and children,
/// hand out services, inspect what the engine wrote.
pub struct TestWorld {
    pub store: Arc<MemoryStore>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn attempts(&self) -> AttemptService {
        AttemptService::new(self.store.clone(), self.store.clone())
    }

    pub fn reviews(&self) -> ReviewService {
        ReviewService::new(self.store.clone(), self.store.clone())
    }
}

/// Build a lesson tree one activity at a time.
pub struct LessonBuilder {
    lesson: LessonTree,
}

impl LessonBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            lesson: LessonTree {
                id: Uuid::new_v4(),
                title: title.to_string(),
                published: true,
                activities: Vec::new(),
            },
        }
    }

    pub fn unpublished(mut self) -> Self {
        self.lesson.published = false;
        self
    }

    pub fn activity(mut self, kind: ActivityKind, questions: Vec<Question>) -> Self {
        self.lesson.activities.push(ActivityNode {
            id: Uuid::new_v4(),
            kind,
            title: format!("Activity {}", self.lesson.activities.len() + 1),
            questions,
        });
        self
    }

    pub fn build(self) -> LessonTree {
        self.lesson
    }
}

fn option(label: &str, is_correct: bool) -> QuestionOption {
    QuestionOption {
        id: Uuid::new_v4(),
        label: label.to_string(),
        is_correct,
    }
}

pub fn mcq_question(prompt: &str, correct: &[&str], incorrect: &[&str]) -> Question {
    let mut options: Vec<QuestionOption> =
        correct.iter().map(|label| option(label, true)).collect();
    options.extend(incorrect.iter().map(|label| option(label, false)));

    Question {
        id: Uuid::new_v4(),
        prompt: prompt.to_string(),
        answer_key: json!({}),
        options,
    }
}

pub fn listen_question(prompt: &str, correct: &str, distractors: &[&str]) -> Question {
    let mut options = vec![option(correct, true)];
    options.extend(distractors.iter().map(|label| option(label, false)));

    Question {
        id: Uuid::new_v4(),
        prompt: prompt.to_string(),
        answer_key: json!({ "correct": [correct] }),
        options,
    }
}

pub fn fill_blank_question(prompt: &str, blanks: &[&str]) -> Question {
    Question {
        id: Uuid::new_v4(),
        prompt: prompt.to_string(),
        answer_key: json!({ "blanks": blanks }),
        options: Vec::new(),
    }
}

pub fn order_question(prompt: &str, sequence: &[&str]) -> Question {
    Question {
        id: Uuid::new_v4(),
        prompt: prompt.to_string(),
        answer_key: json!({ "correct": sequence }),
        options: Vec::new(),
    }
}

pub fn pairs_question(prompt: &str, pairs: &[(&str, &str)]) -> Question {
    let pairs: Vec<serde_json::Value> = pairs
        .iter()
        .map(|(left, right)| json!({ "left": left, "right": right }))
        .collect();

    Question {
        id: Uuid::new_v4(),
        prompt: prompt.to_string(),
        answer_key: json!({ "pairs": pairs }),
        options: Vec::new(),
    }
}

// --- submitted-answer helpers ---

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

pub fn mcq_answer(question_id: Uuid, selected: &[&str]) -> SubmittedAnswer {
    SubmittedAnswer {
        question_id,
        response: AnswerPayload::QuizMcq {
            selected: strings(selected),
        },
    }
}

pub fn listen_answer(question_id: Uuid, selected: &str) -> SubmittedAnswer {
    SubmittedAnswer {
        question_id,
        response: AnswerPayload::ListenChoose {
            selected: selected.to_string(),
        },
    }
}

pub fn fill_blank_answer(question_id: Uuid, blanks: &[&str]) -> SubmittedAnswer {
    SubmittedAnswer {
        question_id,
        response: AnswerPayload::FillBlank {
            blanks: strings(blanks),
        },
    }
}

pub fn order_answer(question_id: Uuid, sequence: &[&str]) -> SubmittedAnswer {
    SubmittedAnswer {
        question_id,
        response: AnswerPayload::Order {
            sequence: strings(sequence),
        },
    }
}

pub fn pairs_answer(question_id: Uuid, pairs: &[(&str, &str)]) -> SubmittedAnswer {
    SubmittedAnswer {
        question_id,
        response: AnswerPayload::MatchPairs {
            pairs: pairs
                .iter()
                .map(|(left, right)| PairAnswer {
                    left: (*left).to_string(),
                    right: (*right).to_string(),
                })
                .collect(),
        },
    }
}

/// A published four-question lesson (one activity per kind except pairs)
/// together with its question ids in activity order.
pub fn four_question_lesson() -> (LessonTree, Vec<Uuid>) {
    let mcq = mcq_question("Which are colours?", &["red", "blue"], &["cat"]);
    let listen = listen_question("Tap what you hear", "dog", &["dig", "dug"]);
    let blank = fill_blank_question("The ___ sat on the mat", &["cat"]);
    let order = order_question("Put the words in order", &["I", "like", "cats"]);
    let ids = vec![mcq.id, listen.id, blank.id, order.id];

    let lesson = LessonBuilder::new("Animals 1")
        .activity(ActivityKind::QuizMcq, vec![mcq])
        .activity(ActivityKind::ListenChoose, vec![listen])
        .activity(ActivityKind::FillBlank, vec![blank])
        .activity(ActivityKind::Order, vec![order])
        .build();

    (lesson, ids)
}
