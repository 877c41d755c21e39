use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::challenge::Challenge;

/// A user-submitted answer. The shape depends on the challenge: free text,
/// an ordered chunk list (scramble), an unordered list (collocations,
/// idioms), or per-bucket text (word family, heteronym selections).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Text(String),
    Ordered(Vec<String>),
    Many(Vec<String>),
    Buckets(HashMap<String, String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChallengeResult {
    Single(bool),
    Itemized {
        correct: bool,
        details: HashMap<String, bool>,
    },
}

impl ChallengeResult {
    pub fn is_correct(&self) -> bool {
        match self {
            ChallengeResult::Single(correct) => *correct,
            ChallengeResult::Itemized { correct, .. } => *correct,
        }
    }
}

/// Lowercase and strip every non-alphanumeric character, spaces included.
/// Tolerates punctuation noise and speech-to-text artifacts. Idempotent.
pub fn normalize_answer(s: &str) -> String {
    s.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Lowercase, strip everything but alphanumerics and whitespace, collapse
/// whitespace runs to a single space.
pub fn normalize_sentence(s: &str) -> String {
    let kept: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_answer(answer: &Answer) -> Option<&str> {
    match answer {
        Answer::Text(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Grade one challenge. Pure and total: malformed or mismatched input
/// grades false instead of panicking.
pub fn grade_challenge(challenge: &Challenge, answer: &Answer) -> ChallengeResult {
    match challenge {
        Challenge::Spelling { word } | Challenge::Pronunciation { word } => {
            ChallengeResult::Single(
                text_answer(answer)
                    .map(|a| normalize_answer(a) == normalize_answer(word))
                    .unwrap_or(false),
            )
        }

        // Selected from a fixed option set, not typed: exact equality.
        Challenge::IpaQuiz { answer: correct, .. }
        | Challenge::MeaningQuiz { answer: correct, .. } => ChallengeResult::Single(
            text_answer(answer).map(|a| a == correct).unwrap_or(false),
        ),

        Challenge::PrepositionQuiz { prep, .. } => ChallengeResult::Single(
            text_answer(answer)
                .map(|a| a.trim().to_lowercase() == prep.trim().to_lowercase())
                .unwrap_or(false),
        ),

        Challenge::ParaphraseQuiz { answer: correct, .. } => ChallengeResult::Single(
            text_answer(answer)
                .map(|a| normalize_answer(a) == normalize_answer(correct))
                .unwrap_or(false),
        ),

        Challenge::SentenceScramble { original, .. } => {
            let correct = match answer {
                Answer::Ordered(chunks) => {
                    normalize_sentence(&chunks.join(" ")) == normalize_sentence(original)
                }
                _ => false,
            };
            ChallengeResult::Single(correct)
        }

        Challenge::HeteronymQuiz { forms, .. } => {
            let selections = match answer {
                Answer::Buckets(map) => map.clone(),
                _ => HashMap::new(),
            };
            let mut details = HashMap::new();
            let mut all_matched = !forms.is_empty();
            for form in forms {
                let matched = selections
                    .get(&form.part_of_speech)
                    .map(|chosen| chosen == &form.ipa)
                    .unwrap_or(false);
                // AND over the forms themselves: two forms sharing a part of
                // speech both have to match, even though the details map only
                // keeps one entry per key.
                all_matched &= matched;
                details.insert(form.part_of_speech.clone(), matched);
            }
            ChallengeResult::Itemized {
                correct: all_matched,
                details,
            }
        }

        Challenge::CollocationQuiz { items, .. } | Challenge::IdiomQuiz { items, .. } => {
            let submitted = match answer {
                Answer::Many(list) => list.as_slice(),
                _ => &[],
            };
            grade_phrase_list(items.iter().map(|p| p.text.as_str()), submitted)
        }

        Challenge::WordFamily { family, .. } => {
            let inputs = match answer {
                Answer::Buckets(map) => map.clone(),
                _ => HashMap::new(),
            };
            let mut details = HashMap::new();
            for (name, members) in family.buckets() {
                let expected: HashSet<String> = members
                    .iter()
                    .filter(|m| !m.is_ignored)
                    .map(|m| m.word.trim().to_lowercase())
                    .collect();
                // A bucket with no correct members is omitted from grading.
                if expected.is_empty() {
                    continue;
                }
                let given: HashSet<String> = inputs
                    .get(name)
                    .map(|raw| {
                        raw.split(',')
                            .map(|w| w.trim().to_lowercase())
                            .filter(|w| !w.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();
                // Equal cardinality and full overlap, not a subset check.
                details.insert(name.to_string(), given == expected);
            }
            let correct = !details.is_empty() && details.values().all(|&v| v);
            ChallengeResult::Itemized { correct, details }
        }
    }
}

/// Order-independent multiset matching for phrase lists. Each user answer
/// is consumed on match so one submission cannot satisfy two distinct
/// correct items with the same text.
fn grade_phrase_list<'a>(
    correct_items: impl Iterator<Item = &'a str>,
    submitted: &[String],
) -> ChallengeResult {
    let mut pool: Vec<String> = submitted.iter().map(|s| normalize_answer(s)).collect();
    let mut details = HashMap::new();
    let mut total = 0usize;

    for (index, item) in correct_items.enumerate() {
        total += 1;
        let wanted = normalize_answer(item);
        let found = pool.iter().position(|candidate| *candidate == wanted);
        match found {
            Some(at) => {
                pool.remove(at);
                details.insert(index.to_string(), true);
            }
            None => {
                details.insert(index.to_string(), false);
            }
        }
    }

    let correct = details.len() == total && total > 0 && details.values().all(|&v| v);
    ChallengeResult::Itemized { correct, details }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FamilyMember, Phrase, WordFamily};

    fn text(s: &str) -> Answer {
        Answer::Text(s.to_string())
    }

    fn phrases(texts: &[&str]) -> Vec<Phrase> {
        texts
            .iter()
            .map(|t| Phrase {
                text: t.to_string(),
                description: None,
                is_ignored: false,
            })
            .collect()
    }

    #[test]
    fn normalize_answer_is_idempotent() {
        for s in ["C.A.T!", "  break   the ice ", "đặt chỗ", "", "123-456"] {
            let once = normalize_answer(s);
            assert_eq!(normalize_answer(&once), once);
        }
        assert_eq!(normalize_answer("C.A.T!"), "cat");
        assert_eq!(normalize_answer(""), "");
    }

    #[test]
    fn normalize_sentence_collapses_whitespace_and_punctuation() {
        assert_eq!(
            normalize_sentence("The cat  sat, on the mat."),
            "the cat sat on the mat"
        );
        assert_eq!(normalize_sentence("   "), "");
    }

    #[test]
    fn spelling_tolerates_case_and_punctuation() {
        let challenge = Challenge::Spelling { word: "cat".to_string() };
        assert!(grade_challenge(&challenge, &text("C.A.T!")).is_correct());
        assert!(!grade_challenge(&challenge, &text("dog")).is_correct());
    }

    #[test]
    fn option_quizzes_use_exact_equality() {
        let challenge = Challenge::MeaningQuiz {
            word: "cat".to_string(),
            answer: "con mèo".to_string(),
            options: vec![],
        };
        assert!(grade_challenge(&challenge, &text("con mèo")).is_correct());
        // Normalization would let this pass; option picks must not.
        assert!(!grade_challenge(&challenge, &text("Con Mèo!")).is_correct());
    }

    #[test]
    fn preposition_grading_trims_and_lowercases() {
        let challenge = Challenge::PrepositionQuiz {
            word: "put".to_string(),
            prep: "on".to_string(),
            cloze: "put it ___ the table".to_string(),
        };
        assert!(grade_challenge(&challenge, &text("  On ")).is_correct());
        assert!(!grade_challenge(&challenge, &text("onto")).is_correct());
    }

    #[test]
    fn scramble_accepts_only_original_order() {
        let challenge = Challenge::SentenceScramble {
            word: "cat".to_string(),
            original: "The cat sat on the mat.".to_string(),
            chunks: vec![],
        };
        let right = Answer::Ordered(
            ["the cat", "sat on", "the mat"].iter().map(|s| s.to_string()).collect(),
        );
        assert!(grade_challenge(&challenge, &right).is_correct());

        let wrong = Answer::Ordered(
            ["the mat", "sat on", "the cat"].iter().map(|s| s.to_string()).collect(),
        );
        assert!(!grade_challenge(&challenge, &wrong).is_correct());
    }

    #[test]
    fn phrase_list_is_order_independent() {
        let challenge = Challenge::CollocationQuiz {
            word: "ice".to_string(),
            items: phrases(&["break the ice", "get over"]),
        };
        let answer = Answer::Many(vec!["get over".to_string(), "break the ice".to_string()]);
        match grade_challenge(&challenge, &answer) {
            ChallengeResult::Itemized { correct, details } => {
                assert!(correct);
                assert_eq!(details.get("0"), Some(&true));
                assert_eq!(details.get("1"), Some(&true));
            }
            _ => panic!("expected itemized result"),
        }
    }

    #[test]
    fn phrase_list_consumes_matches() {
        // A duplicated submission cannot satisfy two distinct items.
        let challenge = Challenge::CollocationQuiz {
            word: "ice".to_string(),
            items: phrases(&["break the ice", "get over"]),
        };
        let answer = Answer::Many(vec![
            "break the ice".to_string(),
            "break the ice".to_string(),
        ]);
        match grade_challenge(&challenge, &answer) {
            ChallengeResult::Itemized { correct, details } => {
                assert!(!correct);
                assert_eq!(details.get("0"), Some(&true));
                assert_eq!(details.get("1"), Some(&false));
            }
            _ => panic!("expected itemized result"),
        }
    }

    #[test]
    fn duplicate_correct_items_need_duplicate_submissions() {
        let challenge = Challenge::IdiomQuiz {
            word: "x".to_string(),
            items: phrases(&["let it go", "let it go"]),
        };
        let once = Answer::Many(vec!["let it go".to_string()]);
        assert!(!grade_challenge(&challenge, &once).is_correct());

        let twice = Answer::Many(vec!["let it go".to_string(), "Let it go!".to_string()]);
        assert!(grade_challenge(&challenge, &twice).is_correct());
    }

    fn family_with_nouns(nouns: &[&str]) -> WordFamily {
        WordFamily {
            nouns: nouns
                .iter()
                .map(|w| FamilyMember {
                    word: w.to_string(),
                    ipa: None,
                    is_ignored: false,
                })
                .collect(),
            ..WordFamily::default()
        }
    }

    fn bucket_answer(name: &str, value: &str) -> Answer {
        let mut map = HashMap::new();
        map.insert(name.to_string(), value.to_string());
        Answer::Buckets(map)
    }

    #[test]
    fn word_family_requires_full_membership() {
        let challenge = Challenge::WordFamily {
            word: "decide".to_string(),
            family: family_with_nouns(&["decision", "decisiveness"]),
        };
        assert!(grade_challenge(&challenge, &bucket_answer("nouns", "decision, decisiveness"))
            .is_correct());
        // Cardinality mismatch in either direction fails.
        assert!(!grade_challenge(&challenge, &bucket_answer("nouns", "decision")).is_correct());
        assert!(!grade_challenge(
            &challenge,
            &bucket_answer("nouns", "decision, decisiveness, extra")
        )
        .is_correct());
    }

    #[test]
    fn word_family_omits_empty_buckets() {
        let challenge = Challenge::WordFamily {
            word: "decide".to_string(),
            family: family_with_nouns(&["decision"]),
        };
        match grade_challenge(&challenge, &bucket_answer("nouns", "Decision")) {
            ChallengeResult::Itemized { correct, details } => {
                assert!(correct);
                assert_eq!(details.len(), 1);
                assert!(!details.contains_key("verbs"));
            }
            _ => panic!("expected itemized result"),
        }
    }

    #[test]
    fn word_family_with_no_gradable_buckets_fails() {
        let challenge = Challenge::WordFamily {
            word: "decide".to_string(),
            family: WordFamily::default(),
        };
        assert!(!grade_challenge(&challenge, &bucket_answer("nouns", "decision")).is_correct());
    }

    #[test]
    fn heteronym_requires_every_form_to_match() {
        let challenge = Challenge::HeteronymQuiz {
            word: "record".to_string(),
            forms: vec![
                crate::challenge::HeteronymForm {
                    part_of_speech: "nouns".to_string(),
                    ipa: "/ˈrek.ɚd/".to_string(),
                },
                crate::challenge::HeteronymForm {
                    part_of_speech: "verbs".to_string(),
                    ipa: "/rɪˈkɔːrd/".to_string(),
                },
            ],
        };

        let mut both = HashMap::new();
        both.insert("nouns".to_string(), "/ˈrek.ɚd/".to_string());
        both.insert("verbs".to_string(), "/rɪˈkɔːrd/".to_string());
        assert!(grade_challenge(&challenge, &Answer::Buckets(both)).is_correct());

        let mut one_wrong = HashMap::new();
        one_wrong.insert("nouns".to_string(), "/ˈrek.ɚd/".to_string());
        one_wrong.insert("verbs".to_string(), "/ˈrek.ɚd/".to_string());
        match grade_challenge(&challenge, &Answer::Buckets(one_wrong)) {
            ChallengeResult::Itemized { correct, details } => {
                assert!(!correct);
                assert_eq!(details.get("nouns"), Some(&true));
                assert_eq!(details.get("verbs"), Some(&false));
            }
            _ => panic!("expected itemized result"),
        }
    }

    #[test]
    fn heteronym_forms_sharing_a_part_of_speech_all_have_to_match() {
        // "bass" the fish and "bass" the instrument are both nouns; one
        // selection can satisfy at most one of the two pronunciations.
        let challenge = Challenge::HeteronymQuiz {
            word: "bass".to_string(),
            forms: vec![
                crate::challenge::HeteronymForm {
                    part_of_speech: "nouns".to_string(),
                    ipa: "/bæs/".to_string(),
                },
                crate::challenge::HeteronymForm {
                    part_of_speech: "nouns".to_string(),
                    ipa: "/beɪs/".to_string(),
                },
            ],
        };

        let mut selection = HashMap::new();
        selection.insert("nouns".to_string(), "/beɪs/".to_string());
        let result = grade_challenge(&challenge, &Answer::Buckets(selection));
        assert!(!result.is_correct());
        match result {
            ChallengeResult::Itemized { details, .. } => {
                assert_eq!(details.get("nouns"), Some(&true));
            }
            _ => panic!("expected itemized result"),
        }
    }

    #[test]
    fn mismatched_answer_shapes_grade_false_without_panicking() {
        let spelling = Challenge::Spelling { word: "cat".to_string() };
        assert!(!grade_challenge(&spelling, &Answer::Many(vec![])).is_correct());

        let scramble = Challenge::SentenceScramble {
            word: "cat".to_string(),
            original: "The cat sat.".to_string(),
            chunks: vec![],
        };
        assert!(!grade_challenge(&scramble, &text("the cat sat")).is_correct());

        let family = Challenge::WordFamily {
            word: "decide".to_string(),
            family: family_with_nouns(&["decision"]),
        };
        assert!(!grade_challenge(&family, &text("decision")).is_correct());
    }
}
