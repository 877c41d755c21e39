use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A single learnable vocabulary item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub id: Uuid,
    /// Canonical dictionary form. Never empty.
    pub text: String,
    pub ipa: Option<String>,
    /// Meaning in the learner's native language.
    pub meaning: Option<String>,
    /// Newline-delimited example sentences.
    pub example: Option<String>,
    /// Plausible wrong transcriptions used as IPA quiz options.
    #[serde(default)]
    pub ipa_mistakes: Vec<String>,
    #[serde(default)]
    pub prepositions: Vec<PrepositionPattern>,
    pub family: Option<WordFamily>,
    #[serde(default)]
    pub paraphrases: Vec<Paraphrase>,
    #[serde(default)]
    pub collocations: Vec<Phrase>,
    #[serde(default)]
    pub idioms: Vec<Phrase>,
    pub irregular_forms: Option<IrregularForms>,
    pub quality: WordQuality,
    pub unit_id: Option<Uuid>,
    pub creation_date: DateTime<Utc>,
    // Review state. `next_review`, when present, is always >= `last_review`.
    pub last_grade: Option<ReviewGrade>,
    pub last_review: Option<DateTime<Utc>>,
    pub next_review: Option<DateTime<Utc>>,
    /// Current SRS interval in days. Zero until the first review.
    pub interval_days: f64,
    #[serde(default)]
    pub history: ChallengeHistory,
}

impl Word {
    pub fn new(text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            ipa: None,
            meaning: None,
            example: None,
            ipa_mistakes: Vec::new(),
            prepositions: Vec::new(),
            family: None,
            paraphrases: Vec::new(),
            collocations: Vec::new(),
            idioms: Vec::new(),
            irregular_forms: None,
            quality: WordQuality::Raw,
            unit_id: None,
            creation_date: Utc::now(),
            last_grade: None,
            last_review: None,
            next_review: None,
            interval_days: 0.0,
            history: ChallengeHistory::default(),
        }
    }

    /// A word with no review history yet; the session offers it only a
    /// "mark learned" action.
    pub fn is_new(&self) -> bool {
        self.last_review.is_none()
    }

    /// Fold AI-generated details into the word. Review state is untouched.
    pub fn apply_details(&mut self, details: WordDetails) {
        self.ipa = details.ipa.or(self.ipa.take());
        self.meaning = details.meaning.or(self.meaning.take());
        self.example = details.example.or(self.example.take());
        if !details.ipa_mistakes.is_empty() {
            self.ipa_mistakes = details.ipa_mistakes;
        }
        if !details.prepositions.is_empty() {
            self.prepositions = details.prepositions;
        }
        if details.family.is_some() {
            self.family = details.family;
        }
        if !details.paraphrases.is_empty() {
            self.paraphrases = details.paraphrases;
        }
        if !details.collocations.is_empty() {
            self.collocations = details.collocations;
        }
        if !details.idioms.is_empty() {
            self.idioms = details.idioms;
        }
        if details.irregular_forms.is_some() {
            self.irregular_forms = details.irregular_forms;
        }
        self.quality = WordQuality::Refined;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordQuality {
    Raw,
    Refined,
    Verified,
    Failed,
}

/// Coarse review outcome fed to the SRS scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewGrade {
    Forgot,
    Hard,
    Easy,
    /// "Mark learned" on a word without prior history. Scheduled like Easy.
    Learned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepositionPattern {
    pub prep: String,
    pub usage: Option<String>,
    #[serde(default)]
    pub is_ignored: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
    pub word: String,
    pub ipa: Option<String>,
    #[serde(default)]
    pub is_ignored: bool,
}

/// Morphologically related forms grouped by part of speech.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordFamily {
    #[serde(default)]
    pub nouns: Vec<FamilyMember>,
    #[serde(default)]
    pub verbs: Vec<FamilyMember>,
    #[serde(default)]
    pub adjectives: Vec<FamilyMember>,
    #[serde(default)]
    pub adverbs: Vec<FamilyMember>,
}

impl WordFamily {
    pub fn buckets(&self) -> [(&'static str, &[FamilyMember]); 4] {
        [
            ("nouns", self.nouns.as_slice()),
            ("verbs", self.verbs.as_slice()),
            ("adjectives", self.adjectives.as_slice()),
            ("adverbs", self.adverbs.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paraphrase {
    pub word: String,
    pub tone: Option<String>,
    pub context: Option<String>,
    #[serde(default)]
    pub is_ignored: bool,
}

/// A collocation or idiom entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phrase {
    pub text: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_ignored: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrregularForms {
    pub past: String,
    pub past_participle: String,
}

/// The practice-challenge categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeKind {
    Spelling,
    Pronunciation,
    IpaQuiz,
    MeaningQuiz,
    PrepositionQuiz,
    SentenceScramble,
    WordFamily,
    HeteronymQuiz,
    ParaphraseQuiz,
    CollocationQuiz,
    IdiomQuiz,
}

/// Per-word mastery history, two levels deep: a category-wide result plus
/// per-discriminator results (e.g. one entry per paraphrase word). Reads
/// fall back to the category level when no discriminator entry exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChallengeHistory(HashMap<ChallengeKind, CategoryHistory>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryHistory {
    pub category: Option<bool>,
    #[serde(default)]
    pub items: HashMap<String, bool>,
}

impl ChallengeHistory {
    pub fn record(&mut self, kind: ChallengeKind, discriminator: Option<&str>, passed: bool) {
        let entry = self.0.entry(kind).or_default();
        match discriminator {
            Some(d) => {
                entry.items.insert(d.to_string(), passed);
            }
            None => entry.category = Some(passed),
        }
    }

    pub fn lookup(&self, kind: ChallengeKind, discriminator: Option<&str>) -> Option<bool> {
        let entry = self.0.get(&kind)?;
        match discriminator {
            Some(d) => entry.items.get(d).copied().or(entry.category),
            None => entry.category,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// A lesson unit grouping words together with reader content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Linguistic fields produced by the AI content service for one headword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordDetails {
    pub word: String,
    pub ipa: Option<String>,
    pub meaning: Option<String>,
    pub example: Option<String>,
    #[serde(default)]
    pub ipa_mistakes: Vec<String>,
    #[serde(default)]
    pub prepositions: Vec<PrepositionPattern>,
    pub family: Option<WordFamily>,
    #[serde(default)]
    pub paraphrases: Vec<Paraphrase>,
    #[serde(default)]
    pub collocations: Vec<Phrase>,
    #[serde(default)]
    pub idioms: Vec<Phrase>,
    pub irregular_forms: Option<IrregularForms>,
}

/// User display preferences, injected at session start instead of being read
/// from ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_highlight_color")]
    pub highlight_color: String,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub show_hidden: bool,
}

fn default_highlight_color() -> String {
    "#fde047".to_string()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            highlight_color: default_highlight_color(),
            underline: false,
            show_hidden: false,
        }
    }
}

// Request DTOs.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWordRequest {
    pub text: String,
    pub meaning: Option<String>,
    pub unit_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWordRequest {
    pub meaning: Option<String>,
    pub example: Option<String>,
    pub ipa: Option<String>,
    pub quality: Option<WordQuality>,
    pub unit_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_word_has_no_review_state() {
        let word = Word::new("resilient".to_string());
        assert!(word.is_new());
        assert!(word.last_grade.is_none());
        assert!(word.next_review.is_none());
        assert_eq!(word.interval_days, 0.0);
        assert!(word.history.is_empty());
    }

    #[test]
    fn history_discriminator_overrides_category() {
        let mut history = ChallengeHistory::default();
        history.record(ChallengeKind::ParaphraseQuiz, None, true);
        history.record(ChallengeKind::ParaphraseQuiz, Some("resilient"), false);

        assert_eq!(
            history.lookup(ChallengeKind::ParaphraseQuiz, Some("resilient")),
            Some(false)
        );
        assert_eq!(history.lookup(ChallengeKind::ParaphraseQuiz, None), Some(true));
    }

    #[test]
    fn history_falls_back_to_category_level() {
        let mut history = ChallengeHistory::default();
        history.record(ChallengeKind::PrepositionQuiz, None, true);

        // No entry for this pattern, but the category has one.
        assert_eq!(
            history.lookup(ChallengeKind::PrepositionQuiz, Some("on")),
            Some(true)
        );
        assert_eq!(history.lookup(ChallengeKind::Spelling, None), None);
        assert_eq!(history.lookup(ChallengeKind::Spelling, Some("x")), None);
    }

    #[test]
    fn apply_details_preserves_review_state() {
        let mut word = Word::new("defer".to_string());
        word.last_review = Some(Utc::now());
        word.history.record(ChallengeKind::Spelling, None, true);

        word.apply_details(WordDetails {
            word: "defer".to_string(),
            ipa: Some("/dɪˈfɜːr/".to_string()),
            meaning: Some("hoãn lại".to_string()),
            example: None,
            ipa_mistakes: vec![],
            prepositions: vec![],
            family: None,
            paraphrases: vec![],
            collocations: vec![],
            idioms: vec![],
            irregular_forms: None,
        });

        assert_eq!(word.quality, WordQuality::Refined);
        assert!(word.last_review.is_some());
        assert_eq!(word.history.lookup(ChallengeKind::Spelling, None), Some(true));
    }
}
