//! Leitner-box scheduling for Owlet review items.
//!
//! This crate provides the core spaced-repetition state machine used to
//! schedule question reviews: grade transitions between boxes 1–5, the seed
//! state for freshly-answered questions, and the feedback lines shown to
//! the learner after grading.
//!
//! Everything here is pure: callers pass the current time in, nothing does
//! I/O, and the same inputs always produce the same transition.

use chrono::{DateTime, Duration, Timelike, Utc};

/// Lowest Leitner box (reviewed most often).
pub const BOX_MIN: i16 = 1;
/// Highest Leitner box (mastered, reviewed rarely).
pub const BOX_MAX: i16 = 5;

/// Wall-clock hour (UTC reference time) that every due date is pinned to.
pub const DUE_HOUR: u32 = 9;

/// A recall grade submitted for a review item.
///
/// The numeric values 0–3 are the wire representation; anything outside
/// that range is a validation error, never silently clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewGrade {
    /// 0 — wrong, start over.
    Again,
    /// 1 — recalled with difficulty.
    Hard,
    /// 2 — recalled correctly.
    Good,
    /// 3 — recalled instantly.
    Easy,
}

/// Error for grade values outside 0–3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid review grade {0}: must be between 0 (again) and 3 (easy)")]
pub struct InvalidGrade(pub i16);

impl ReviewGrade {
    /// Parse a wire value into a grade.
    pub const fn from_value(value: i16) -> Result<Self, InvalidGrade> {
        match value {
            0 => Ok(Self::Again),
            1 => Ok(Self::Hard),
            2 => Ok(Self::Good),
            3 => Ok(Self::Easy),
            other => Err(InvalidGrade(other)),
        }
    }

    /// The wire value of this grade.
    pub const fn value(self) -> i16 {
        match self {
            Self::Again => 0,
            Self::Hard => 1,
            Self::Good => 2,
            Self::Easy => 3,
        }
    }
}

/// The result of applying a grade (or seeding) to a review item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The item's new box, always within 1–5.
    pub box_no: i16,
    /// When the item is next due, pinned to 09:00.
    pub due_at: DateTime<Utc>,
    /// The item's new lapse count.
    pub lapses: i32,
}

/// Apply a recall grade to an item currently in `box_no` with `lapses`
/// recorded lapses.
///
/// | grade | new box            | lapses | days until due |
/// |-------|--------------------|--------|----------------|
/// | Again | 1                  | +1     | 1              |
/// | Hard  | unchanged          | same   | current box    |
/// | Good  | min(5, current+1)  | same   | new box × 2    |
/// | Easy  | min(5, current+2)  | same   | new box × 3    |
///
/// A `box_no` outside 1–5 (a corrupt row) is clamped before the transition
/// so the result is always in range.
pub fn apply_grade(box_no: i16, lapses: i32, grade: ReviewGrade, now: DateTime<Utc>) -> Transition {
    let current = box_no.clamp(BOX_MIN, BOX_MAX);

    match grade {
        ReviewGrade::Again => Transition {
            box_no: BOX_MIN,
            due_at: due_after(now, 1),
            lapses: lapses + 1,
        },
        ReviewGrade::Hard => Transition {
            box_no: current,
            due_at: due_after(now, i64::from(current)),
            lapses,
        },
        ReviewGrade::Good => {
            let next = (current + 1).min(BOX_MAX);
            Transition {
                box_no: next,
                due_at: due_after(now, i64::from(next) * 2),
                lapses,
            }
        }
        ReviewGrade::Easy => {
            let next = (current + 2).min(BOX_MAX);
            Transition {
                box_no: next,
                due_at: due_after(now, i64::from(next) * 3),
                lapses,
            }
        }
    }
}

/// The seed state for a question answered for the first time in a lesson.
///
/// A correct first answer starts in box 2 (due in 2 days); an incorrect
/// one starts in box 1 (due tomorrow) and already counts one lapse.
pub fn seed_new(correct: bool, now: DateTime<Utc>) -> Transition {
    if correct {
        Transition {
            box_no: 2,
            due_at: due_after(now, 2),
            lapses: 0,
        }
    } else {
        Transition {
            box_no: BOX_MIN,
            due_at: due_after(now, 1),
            lapses: 1,
        }
    }
}

/// Compute a due date `days` ahead of `now`, normalized to 09:00.
///
/// Normalizing to a fixed morning hour keeps "due today" stable across a
/// session instead of drifting by the minute the item was graded at.
pub fn due_after(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let target = now + Duration::days(days);
    target
        .with_hour(DUE_HOUR)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(target)
}

/// The feedback line shown after grading, keyed by grade, resulting box
/// and lapse count. Presentational only — scheduling never reads it.
pub fn feedback(grade: ReviewGrade, box_no: i16, lapses: i32) -> String {
    match grade {
        ReviewGrade::Again if lapses <= 1 => {
            "No worries — back to box 1 for a fresh start. You'll get it next time!".to_string()
        }
        ReviewGrade::Again => format!(
            "Tricky one! Back to box 1 — that's {lapses} stumbles now, so we'll practice it more often."
        ),
        ReviewGrade::Hard => {
            format!("Almost there — this one stays in box {box_no} a little longer.")
        }
        ReviewGrade::Good if box_no >= BOX_MAX => {
            "Mastered! This one moves to box 5 — you won't see it for a good while.".to_string()
        }
        ReviewGrade::Good => format!("Nice work! Moving up to box {box_no}."),
        ReviewGrade::Easy if box_no >= BOX_MAX => {
            "Too easy! Straight into box 5 — that's mastered.".to_string()
        }
        ReviewGrade::Easy => format!("Brilliant! Jumping ahead to box {box_no}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn grade_values_round_trip() {
        for value in 0..=3 {
            let grade = ReviewGrade::from_value(value).unwrap();
            assert_eq!(grade.value(), value);
        }
    }

    #[test]
    fn out_of_range_grades_are_rejected() {
        assert_eq!(ReviewGrade::from_value(-1), Err(InvalidGrade(-1)));
        assert_eq!(ReviewGrade::from_value(4), Err(InvalidGrade(4)));
        assert_eq!(ReviewGrade::from_value(42), Err(InvalidGrade(42)));
    }

    #[test]
    fn again_always_resets_to_box_one() {
        let now = at(2025, 3, 10, 15);
        for box_no in BOX_MIN..=BOX_MAX {
            let t = apply_grade(box_no, 0, ReviewGrade::Again, now);
            assert_eq!(t.box_no, 1);
            assert_eq!(t.lapses, 1);
            assert_eq!(t.due_at, at(2025, 3, 11, 9));
        }
    }

    #[test]
    fn new_box_is_always_in_range() {
        let now = at(2025, 3, 10, 15);
        for box_no in BOX_MIN..=BOX_MAX {
            for value in 0..=3 {
                let grade = ReviewGrade::from_value(value).unwrap();
                let t = apply_grade(box_no, 2, grade, now);
                assert!(
                    (BOX_MIN..=BOX_MAX).contains(&t.box_no),
                    "box {box_no} grade {value} produced box {}",
                    t.box_no
                );
            }
        }
    }

    #[test]
    fn hard_keeps_the_box_and_waits_box_days() {
        let now = at(2025, 3, 10, 15);
        let t = apply_grade(3, 2, ReviewGrade::Hard, now);
        assert_eq!(t.box_no, 3);
        assert_eq!(t.lapses, 2);
        assert_eq!(t.due_at, at(2025, 3, 13, 9));
    }

    #[test]
    fn good_from_box_three_is_due_in_eight_days() {
        let now = at(2025, 3, 10, 15);
        let t = apply_grade(3, 0, ReviewGrade::Good, now);
        assert_eq!(t.box_no, 4);
        assert_eq!(t.lapses, 0);
        // 4 × 2 = 8 days out, pinned to 09:00
        assert_eq!(t.due_at, at(2025, 3, 18, 9));
    }

    #[test]
    fn good_saturates_at_box_five() {
        let now = at(2025, 3, 10, 15);
        let t = apply_grade(5, 0, ReviewGrade::Good, now);
        assert_eq!(t.box_no, 5);
        assert_eq!(t.due_at, at(2025, 3, 20, 9));
    }

    #[test]
    fn easy_skips_a_box_and_saturates() {
        let now = at(2025, 3, 10, 15);

        let t = apply_grade(1, 0, ReviewGrade::Easy, now);
        assert_eq!(t.box_no, 3);
        assert_eq!(t.due_at, at(2025, 3, 19, 9)); // 3 × 3 = 9 days

        let t = apply_grade(4, 0, ReviewGrade::Easy, now);
        assert_eq!(t.box_no, 5);
        assert_eq!(t.due_at, at(2025, 3, 25, 9)); // 5 × 3 = 15 days
    }

    #[test]
    fn corrupt_box_is_clamped_before_transition() {
        let now = at(2025, 3, 10, 15);
        let t = apply_grade(9, 0, ReviewGrade::Good, now);
        assert_eq!(t.box_no, 5);
        let t = apply_grade(0, 0, ReviewGrade::Hard, now);
        assert_eq!(t.box_no, 1);
        assert_eq!(t.due_at, at(2025, 3, 11, 9));
    }

    #[test]
    fn seed_correct_starts_in_box_two() {
        let now = at(2025, 3, 10, 15);
        let t = seed_new(true, now);
        assert_eq!(t.box_no, 2);
        assert_eq!(t.lapses, 0);
        assert_eq!(t.due_at, at(2025, 3, 12, 9));
    }

    #[test]
    fn seed_incorrect_starts_in_box_one_with_a_lapse() {
        let now = at(2025, 3, 10, 15);
        let t = seed_new(false, now);
        assert_eq!(t.box_no, 1);
        assert_eq!(t.lapses, 1);
        assert_eq!(t.due_at, at(2025, 3, 11, 9));
    }

    #[test]
    fn due_dates_are_pinned_to_nine_am() {
        let late = Utc.with_ymd_and_hms(2025, 3, 10, 23, 47, 12).unwrap();
        let due = due_after(late, 1);
        assert_eq!(due, at(2025, 3, 11, 9));

        let early = Utc.with_ymd_and_hms(2025, 3, 10, 0, 5, 0).unwrap();
        let due = due_after(early, 1);
        assert_eq!(due, at(2025, 3, 11, 9));
    }

    #[test]
    fn feedback_mentions_mastery_at_box_five() {
        assert!(feedback(ReviewGrade::Good, 5, 0).contains("Mastered"));
        assert!(feedback(ReviewGrade::Easy, 5, 0).contains("mastered"));
        assert!(!feedback(ReviewGrade::Good, 4, 0).contains("astered"));
    }

    #[test]
    fn feedback_is_deterministic() {
        assert_eq!(
            feedback(ReviewGrade::Hard, 2, 1),
            feedback(ReviewGrade::Hard, 2, 1)
        );
        assert_ne!(
            feedback(ReviewGrade::Again, 1, 1),
            feedback(ReviewGrade::Again, 1, 3)
        );
    }
}
