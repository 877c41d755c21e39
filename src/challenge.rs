use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{ChallengeKind, Phrase, Word, WordFamily};

/// One practice task for one word. A closed union: the grader and the
/// preparer match exhaustively, so a new variant is a compile-time change
/// everywhere it must be handled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Challenge {
    Spelling {
        word: String,
    },
    Pronunciation {
        word: String,
    },
    IpaQuiz {
        word: String,
        answer: String,
        options: Vec<String>,
    },
    /// Options start empty; the preparer fills them with sampled distractors.
    MeaningQuiz {
        word: String,
        answer: String,
        options: Vec<String>,
    },
    PrepositionQuiz {
        word: String,
        prep: String,
        cloze: String,
    },
    SentenceScramble {
        word: String,
        original: String,
        chunks: Vec<String>,
    },
    WordFamily {
        word: String,
        family: WordFamily,
    },
    HeteronymQuiz {
        word: String,
        forms: Vec<HeteronymForm>,
    },
    ParaphraseQuiz {
        word: String,
        answer: String,
        tone: Option<String>,
        context: Option<String>,
    },
    CollocationQuiz {
        word: String,
        items: Vec<Phrase>,
    },
    IdiomQuiz {
        word: String,
        items: Vec<Phrase>,
    },
}

/// Same spelling, different pronunciation depending on grammatical role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeteronymForm {
    pub part_of_speech: String,
    pub ipa: String,
}

impl Challenge {
    pub fn kind(&self) -> ChallengeKind {
        match self {
            Challenge::Spelling { .. } => ChallengeKind::Spelling,
            Challenge::Pronunciation { .. } => ChallengeKind::Pronunciation,
            Challenge::IpaQuiz { .. } => ChallengeKind::IpaQuiz,
            Challenge::MeaningQuiz { .. } => ChallengeKind::MeaningQuiz,
            Challenge::PrepositionQuiz { .. } => ChallengeKind::PrepositionQuiz,
            Challenge::SentenceScramble { .. } => ChallengeKind::SentenceScramble,
            Challenge::WordFamily { .. } => ChallengeKind::WordFamily,
            Challenge::HeteronymQuiz { .. } => ChallengeKind::HeteronymQuiz,
            Challenge::ParaphraseQuiz { .. } => ChallengeKind::ParaphraseQuiz,
            Challenge::CollocationQuiz { .. } => ChallengeKind::CollocationQuiz,
            Challenge::IdiomQuiz { .. } => ChallengeKind::IdiomQuiz,
        }
    }

    /// Distinguishes per-item mastery from per-category mastery in the
    /// word's history map.
    pub fn discriminator(&self) -> Option<&str> {
        match self {
            Challenge::PrepositionQuiz { prep, .. } => Some(prep.as_str()),
            Challenge::ParaphraseQuiz { answer, .. } => Some(answer.as_str()),
            _ => None,
        }
    }
}

fn word_boundary_pattern(text: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(text))).ok()
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    word_boundary_pattern(needle)
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}

/// Cloze-sentence construction for a preposition pattern. The fallback
/// ordering is load-bearing:
/// 1. usage contains the headword: blank the preposition inside the usage
///    text (appending `[___]` when the preposition is not found as a word);
/// 2. usage present without the headword: `"{headword} ___ {usage}"`;
/// 3. no usage: `"{headword} ___"`.
fn build_cloze(headword: &str, prep: &str, usage: Option<&str>) -> String {
    match usage.map(str::trim).filter(|u| !u.is_empty()) {
        Some(usage) if contains_word(usage, headword) => {
            match word_boundary_pattern(prep) {
                Some(re) if re.is_match(usage) => re.replace(usage, "___").into_owned(),
                _ => format!("{} [___]", usage),
            }
        }
        Some(usage) => format!("{} ___ {}", headword, usage),
        None => format!("{} ___", headword),
    }
}

/// Pick the sentence to scramble: prefer the first sentence containing the
/// headword, else the first usable one. Sentences shorter than six
/// characters are skipped.
fn pick_scramble_sentence(example: &str, headword: &str) -> Option<String> {
    let splitter = Regex::new(r"[.!?]\s+").ok()?;
    let sentences: Vec<&str> = splitter
        .split(example)
        .map(str::trim)
        .filter(|s| s.len() > 5)
        .collect();

    sentences
        .iter()
        .find(|s| contains_word(s, headword))
        .or_else(|| sentences.first())
        .map(|s| s.to_string())
}

/// Break a long sentence into 1-3 word chunks so the scramble stays
/// solvable. Short sentences scramble single words.
fn chunk_sentence<R: Rng>(sentence: &str, rng: &mut R) -> Vec<String> {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    if words.len() <= 10 {
        return words.iter().map(|w| w.to_string()).collect();
    }

    let mut chunks = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let take = if rng.gen_bool(0.5) {
            rng.gen_range(2..=3).min(words.len() - i)
        } else {
            1
        };
        chunks.push(words[i..i + take].join(" "));
        i += take;
    }
    chunks
}

fn shuffled<T: Clone, R: Rng>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut out = items.to_vec();
    out.shuffle(rng);
    out
}

/// The exhaustive set of practice challenges this word's content supports.
/// Pure apart from option-order shuffles; the answer set is deterministic.
pub fn generate_available_challenges(word: &Word) -> Vec<Challenge> {
    let mut rng = rand::thread_rng();
    let mut challenges = Vec::new();
    let headword = word.text.as_str();

    // Spelling and pronunciation only need the headword.
    challenges.push(Challenge::Spelling {
        word: headword.to_string(),
    });
    challenges.push(Challenge::Pronunciation {
        word: headword.to_string(),
    });

    if let Some(meaning) = word.meaning.as_deref().filter(|m| !m.trim().is_empty()) {
        challenges.push(Challenge::MeaningQuiz {
            word: headword.to_string(),
            answer: meaning.to_string(),
            options: Vec::new(),
        });
    }

    if let Some(ipa) = word.ipa.as_deref().filter(|i| !i.trim().is_empty()) {
        if !word.ipa_mistakes.is_empty() {
            let mut options = vec![ipa.to_string()];
            options.extend(word.ipa_mistakes.iter().cloned());
            options.shuffle(&mut rng);
            challenges.push(Challenge::IpaQuiz {
                word: headword.to_string(),
                answer: ipa.to_string(),
                options,
            });
        }
    }

    let collocations: Vec<Phrase> = word
        .collocations
        .iter()
        .filter(|c| !c.is_ignored)
        .cloned()
        .collect();
    if !collocations.is_empty() {
        challenges.push(Challenge::CollocationQuiz {
            word: headword.to_string(),
            items: collocations,
        });
    }

    let idioms: Vec<Phrase> = word.idioms.iter().filter(|i| !i.is_ignored).cloned().collect();
    if !idioms.is_empty() {
        challenges.push(Challenge::IdiomQuiz {
            word: headword.to_string(),
            items: idioms,
        });
    }

    for pattern in word.prepositions.iter().filter(|p| !p.is_ignored) {
        challenges.push(Challenge::PrepositionQuiz {
            word: headword.to_string(),
            prep: pattern.prep.clone(),
            cloze: build_cloze(headword, &pattern.prep, pattern.usage.as_deref()),
        });
    }

    if let Some(example) = word.example.as_deref() {
        if let Some(sentence) = pick_scramble_sentence(example, headword) {
            if sentence.split_whitespace().count() >= 3 {
                let mut chunks = chunk_sentence(&sentence, &mut rng);
                chunks.shuffle(&mut rng);
                challenges.push(Challenge::SentenceScramble {
                    word: headword.to_string(),
                    original: sentence,
                    chunks,
                });
            }
        }
    }

    if let Some(family) = &word.family {
        // A family containing only the headword itself is useless for recall.
        let has_recallable_member = family.buckets().iter().any(|(_, members)| {
            members
                .iter()
                .any(|m| !m.is_ignored && !m.word.eq_ignore_ascii_case(headword))
        });
        if has_recallable_member {
            challenges.push(Challenge::WordFamily {
                word: headword.to_string(),
                family: family.clone(),
            });
        }

        let forms: Vec<HeteronymForm> = family
            .buckets()
            .iter()
            .flat_map(|(pos, members)| {
                members
                    .iter()
                    .filter(|m| m.word.eq_ignore_ascii_case(headword))
                    .filter_map(|m| m.ipa.as_deref())
                    .filter(|ipa| !ipa.trim().is_empty())
                    .map(|ipa| HeteronymForm {
                        part_of_speech: pos.to_string(),
                        ipa: ipa.to_string(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        let mut distinct: Vec<&str> = forms.iter().map(|f| f.ipa.as_str()).collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() >= 2 {
            challenges.push(Challenge::HeteronymQuiz {
                word: headword.to_string(),
                forms,
            });
        }
    }

    for paraphrase in word.paraphrases.iter().filter(|p| !p.is_ignored) {
        challenges.push(Challenge::ParaphraseQuiz {
            word: headword.to_string(),
            answer: paraphrase.word.clone(),
            tone: paraphrase.tone.clone(),
            context: paraphrase.context.clone(),
        });
    }

    challenges
}

/// Shuffle multiple-choice options once distractors are known.
pub fn shuffle_options(correct: &str, distractors: &[String]) -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut options = vec![correct.to_string()];
    options.extend(distractors.iter().cloned());
    shuffled(&options, &mut rng)
}
