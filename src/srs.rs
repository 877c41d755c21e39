use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{ReviewGrade, Word};

/// Interval seeds for a word's first review, in days.
const FIRST_INTERVAL_FORGOT: f64 = 1.0;
const FIRST_INTERVAL_HARD: f64 = 1.0;
const FIRST_INTERVAL_EASY: f64 = 4.0;

const HARD_MULTIPLIER: f64 = 1.2;
const EASY_MULTIPLIER: f64 = 2.5;
const MIN_INTERVAL: f64 = 1.0;

/// Leitner-style scheduler over a float day interval. The curve keeps two
/// guarantees: FORGOT never grows the interval, EASY always grows it.
#[derive(Debug, Clone, Default)]
pub struct SrsScheduler;

impl SrsScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Advance the word's review state for one graded review.
    pub fn update_srs(&self, word: &mut Word, grade: ReviewGrade, now: DateTime<Utc>) {
        let previous = word.interval_days;
        let next = if previous <= 0.0 {
            match grade {
                ReviewGrade::Forgot => FIRST_INTERVAL_FORGOT,
                ReviewGrade::Hard => FIRST_INTERVAL_HARD,
                ReviewGrade::Easy | ReviewGrade::Learned => FIRST_INTERVAL_EASY,
            }
        } else {
            match grade {
                // Shrinks, clamped so a short interval does not grow back.
                ReviewGrade::Forgot => (previous * 0.5).max(MIN_INTERVAL).min(previous),
                ReviewGrade::Hard => (previous * HARD_MULTIPLIER).max(MIN_INTERVAL),
                ReviewGrade::Easy | ReviewGrade::Learned => {
                    (previous * EASY_MULTIPLIER).max(MIN_INTERVAL)
                }
            }
        };

        word.interval_days = next;
        word.last_grade = Some(grade);
        word.last_review = Some(now);
        word.next_review = Some(now + Duration::seconds((next * 86_400.0) as i64));
    }

    /// Clear review state back to "never reviewed".
    pub fn reset_progress(&self, word: &mut Word) {
        word.last_grade = None;
        word.last_review = None;
        word.next_review = None;
        word.interval_days = 0.0;
        word.history.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Overdue,
    Today,
    Soon,
    Later,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemainingTime {
    pub label: String,
    pub urgency: Urgency,
}

/// Presentation helper: how long until a scheduled review is due.
pub fn remaining_time(next_review: DateTime<Utc>, now: DateTime<Utc>) -> RemainingTime {
    let remaining = next_review - now;
    if remaining <= Duration::zero() {
        return RemainingTime {
            label: "due now".to_string(),
            urgency: Urgency::Overdue,
        };
    }
    let hours = remaining.num_hours();
    if hours < 24 {
        RemainingTime {
            label: format!("in {} h", hours.max(1)),
            urgency: Urgency::Today,
        }
    } else if hours < 72 {
        RemainingTime {
            label: format!("in {} d", remaining.num_days()),
            urgency: Urgency::Soon,
        }
    } else {
        RemainingTime {
            label: format!("in {} d", remaining.num_days()),
            urgency: Urgency::Later,
        }
    }
}
