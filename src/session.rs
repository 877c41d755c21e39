use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{Preferences, ReviewGrade, Word};

/// How long a finished session lingers before it is retired. The retire
/// task must be cancellable if the session is torn down first.
pub const FINISH_LINGER: Duration = Duration::from_millis(2500);

/// The practice focus chosen for one word within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Standard,
    Spelling,
    Meaning,
    Phonetic,
    Preposition,
    Irregular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Intro,
    InProgress,
    Finished,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub word_id: Uuid,
    pub grade: ReviewGrade,
}

/// What the UI needs to present the current word.
#[derive(Debug, Clone, Serialize)]
pub struct SessionCard {
    pub word: Word,
    pub mode: SessionMode,
    /// History-less words skip grading controls; only "mark learned" applies.
    pub is_new: bool,
    pub position: usize,
    pub total: usize,
}

/// Pick the challenge focus for one word. Cumulative-probability buckets,
/// not independent rolls.
pub fn pick_mode<R: Rng>(word: &Word, forced: Option<SessionMode>, rng: &mut R) -> SessionMode {
    if let Some(mode) = forced {
        // A forced preposition focus is meaningless without patterns.
        if mode == SessionMode::Preposition && !word.prepositions.iter().any(|p| !p.is_ignored) {
            return SessionMode::Standard;
        }
        return mode;
    }

    if word.irregular_forms.is_some() && rng.gen_bool(0.3) {
        return SessionMode::Irregular;
    }
    if word.prepositions.iter().any(|p| !p.is_ignored) && rng.gen_bool(0.4) {
        return SessionMode::Preposition;
    }

    let roll: f64 = rng.gen();
    let mode = if roll < 0.15 {
        SessionMode::Standard
    } else if roll < 0.50 {
        SessionMode::Spelling
    } else if roll < 0.85 {
        SessionMode::Meaning
    } else {
        SessionMode::Phonetic
    };

    if mode == SessionMode::Phonetic && word.ipa.as_deref().map_or(true, |i| i.trim().is_empty()) {
        SessionMode::Meaning
    } else {
        mode
    }
}

/// Per-session state machine:
/// intro -> (per word) present -> grade -> advance -> ... -> finished.
/// Word order is shuffled once at start and fixed thereafter.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub preferences: Preferences,
    forced_mode: Option<SessionMode>,
    words: Vec<Word>,
    current: usize,
    /// Mode picked for the current word, stable across repeated presents.
    picked: Option<SessionMode>,
    outcomes: Vec<SessionOutcome>,
    phase: SessionPhase,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is already finished")]
    Finished,
    #[error("a word with no review history only accepts a mark-learned outcome")]
    NewWordGrade,
}

impl ReviewSession {
    pub fn new(
        mut words: Vec<Word>,
        forced_mode: Option<SessionMode>,
        preferences: Preferences,
    ) -> Self {
        words.shuffle(&mut rand::thread_rng());
        let phase = if words.is_empty() {
            SessionPhase::Finished
        } else {
            SessionPhase::Intro
        };
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            preferences,
            forced_mode,
            words,
            current: 0,
            picked: None,
            outcomes: Vec::new(),
            phase,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn total(&self) -> usize {
        self.words.len()
    }

    pub fn outcomes(&self) -> &[SessionOutcome] {
        &self.outcomes
    }

    /// Present the current word, picking its mode on first call.
    pub fn present(&mut self) -> Option<SessionCard> {
        if self.phase == SessionPhase::Finished {
            return None;
        }
        self.phase = SessionPhase::InProgress;
        let word = self.words.get(self.current)?.clone();
        let forced = self.forced_mode;
        let mode = *self
            .picked
            .get_or_insert_with(|| pick_mode(&word, forced, &mut rand::thread_rng()));
        Some(SessionCard {
            is_new: word.is_new(),
            mode,
            position: self.current + 1,
            total: self.words.len(),
            word,
        })
    }

    /// Record the grade for the current word and advance.
    pub fn record_outcome(&mut self, grade: ReviewGrade) -> Result<SessionOutcome, SessionError> {
        if self.phase == SessionPhase::Finished {
            return Err(SessionError::Finished);
        }
        let word = self.words.get(self.current).ok_or(SessionError::Finished)?;
        if word.is_new() && grade != ReviewGrade::Learned {
            return Err(SessionError::NewWordGrade);
        }

        let outcome = SessionOutcome {
            word_id: word.id,
            grade,
        };
        self.outcomes.push(outcome.clone());
        self.current += 1;
        self.picked = None;
        if self.current >= self.words.len() {
            self.phase = SessionPhase::Finished;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrepositionPattern;
    use chrono::Utc;
    use std::collections::HashSet;

    fn reviewed(text: &str) -> Word {
        let mut word = Word::new(text.to_string());
        word.last_review = Some(Utc::now());
        word
    }

    #[test]
    fn every_word_is_presented_exactly_once() {
        let words: Vec<Word> = (0..17).map(|i| reviewed(&format!("word-{}", i))).collect();
        let expected: HashSet<Uuid> = words.iter().map(|w| w.id).collect();

        let mut session = ReviewSession::new(words, None, Preferences::default());
        let mut seen = HashSet::new();
        while let Some(card) = session.present() {
            assert!(seen.insert(card.word.id), "word presented twice");
            session.record_outcome(ReviewGrade::Easy).unwrap();
        }

        assert_eq!(seen, expected);
        assert_eq!(session.phase(), SessionPhase::Finished);
        assert_eq!(session.outcomes().len(), 17);
    }

    #[test]
    fn empty_session_starts_finished() {
        let mut session = ReviewSession::new(vec![], None, Preferences::default());
        assert_eq!(session.phase(), SessionPhase::Finished);
        assert!(session.present().is_none());
    }

    #[test]
    fn picked_mode_is_stable_across_presents() {
        let mut session =
            ReviewSession::new(vec![reviewed("steady")], None, Preferences::default());
        let first = session.present().unwrap().mode;
        for _ in 0..20 {
            assert_eq!(session.present().unwrap().mode, first);
        }
    }

    #[test]
    fn forced_preposition_falls_back_without_patterns() {
        let word = reviewed("cat");
        let mut rng = rand::thread_rng();
        assert_eq!(
            pick_mode(&word, Some(SessionMode::Preposition), &mut rng),
            SessionMode::Standard
        );

        let mut with_patterns = reviewed("put");
        with_patterns.prepositions = vec![PrepositionPattern {
            prep: "on".to_string(),
            usage: None,
            is_ignored: false,
        }];
        assert_eq!(
            pick_mode(&with_patterns, Some(SessionMode::Preposition), &mut rng),
            SessionMode::Preposition
        );
    }

    #[test]
    fn forced_mode_wins_over_random_rolls() {
        let word = reviewed("cat");
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            assert_eq!(
                pick_mode(&word, Some(SessionMode::Spelling), &mut rng),
                SessionMode::Spelling
            );
        }
    }

    #[test]
    fn phonetic_downgrades_to_meaning_without_ipa() {
        let word = reviewed("cat");
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let mode = pick_mode(&word, None, &mut rng);
            assert_ne!(mode, SessionMode::Phonetic);
            assert_ne!(mode, SessionMode::Irregular);
            assert_ne!(mode, SessionMode::Preposition);
        }
    }

    #[test]
    fn new_word_only_accepts_mark_learned() {
        let mut session =
            ReviewSession::new(vec![Word::new("fresh".to_string())], None, Preferences::default());
        let card = session.present().unwrap();
        assert!(card.is_new);

        assert!(matches!(
            session.record_outcome(ReviewGrade::Hard),
            Err(SessionError::NewWordGrade)
        ));
        session.record_outcome(ReviewGrade::Learned).unwrap();
        assert_eq!(session.phase(), SessionPhase::Finished);
    }

    #[test]
    fn finished_session_rejects_further_outcomes() {
        let mut session =
            ReviewSession::new(vec![reviewed("done")], None, Preferences::default());
        session.present();
        session.record_outcome(ReviewGrade::Forgot).unwrap();
        assert!(matches!(
            session.record_outcome(ReviewGrade::Easy),
            Err(SessionError::Finished)
        ));
    }
}
