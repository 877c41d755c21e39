use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::challenge::{shuffle_options, Challenge};

/// Number of wrong meanings shown alongside the correct one.
const DISTRACTOR_COUNT: usize = 3;

/// Where the preparer samples meaning distractors from. Implemented by the
/// database; tests substitute a canned source.
#[async_trait]
pub trait DistractorSource: Send + Sync {
    /// Up to `count` random meanings drawn from other words.
    async fn random_meanings(&self, exclude: Uuid, count: usize) -> Result<Vec<String>>;
}

/// Enrich generated challenges that need external sampling. Only
/// MEANING_QUIZ is affected; everything else passes through. Order and
/// length of the input are preserved, and a failed distractor fetch
/// degrades to an empty option set rather than dropping the challenge.
pub async fn prepare_challenges(
    challenges: Vec<Challenge>,
    word_id: Uuid,
    store: &dyn DistractorSource,
) -> Vec<Challenge> {
    let mut prepared = Vec::with_capacity(challenges.len());
    for challenge in challenges {
        let challenge = match challenge {
            Challenge::MeaningQuiz { word, answer, .. } => {
                let distractors = match store.random_meanings(word_id, DISTRACTOR_COUNT).await {
                    Ok(meanings) => meanings,
                    Err(e) => {
                        warn!(
                            word = %word,
                            error = %e,
                            "distractor sampling failed, preparing meaning quiz without options"
                        );
                        Vec::new()
                    }
                };
                let options = shuffle_options(&answer, &distractors);
                Challenge::MeaningQuiz { word, answer, options }
            }
            other => other,
        };
        prepared.push(challenge);
    }
    prepared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::generate_available_challenges;
    use crate::models::Word;

    struct FixedMeanings(Vec<String>);

    #[async_trait]
    impl DistractorSource for FixedMeanings {
        async fn random_meanings(&self, _exclude: Uuid, count: usize) -> Result<Vec<String>> {
            Ok(self.0.iter().take(count).cloned().collect())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl DistractorSource for FailingSource {
        async fn random_meanings(&self, _exclude: Uuid, _count: usize) -> Result<Vec<String>> {
            anyhow::bail!("store unavailable")
        }
    }

    fn word_with_meaning() -> Word {
        let mut word = Word::new("cat".to_string());
        word.meaning = Some("con mèo".to_string());
        word
    }

    #[tokio::test]
    async fn meaning_quiz_gets_sampled_distractors() {
        let word = word_with_meaning();
        let challenges = generate_available_challenges(&word);
        let store = FixedMeanings(vec![
            "con chó".to_string(),
            "cái bàn".to_string(),
            "ngôi nhà".to_string(),
        ]);

        let prepared = prepare_challenges(challenges.clone(), word.id, &store).await;
        assert_eq!(prepared.len(), challenges.len());

        let options = prepared
            .iter()
            .find_map(|c| match c {
                Challenge::MeaningQuiz { options, .. } => Some(options.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(options.len(), 4);
        assert!(options.contains(&"con mèo".to_string()));
        assert!(options.contains(&"con chó".to_string()));
    }

    #[tokio::test]
    async fn fetch_failure_keeps_the_challenge_in_place() {
        let word = word_with_meaning();
        let challenges = generate_available_challenges(&word);
        let count_before = challenges.len();
        let meaning_index = challenges
            .iter()
            .position(|c| matches!(c, Challenge::MeaningQuiz { .. }))
            .unwrap();

        let prepared = prepare_challenges(challenges, word.id, &FailingSource).await;
        assert_eq!(prepared.len(), count_before);
        match &prepared[meaning_index] {
            Challenge::MeaningQuiz { options, answer, .. } => {
                assert_eq!(options, &vec![answer.clone()]);
            }
            other => panic!("challenge order changed: {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_meaning_challenges_pass_through_unchanged() {
        let word = Word::new("cat".to_string());
        let challenges = generate_available_challenges(&word);
        let store = FixedMeanings(vec![]);
        let prepared = prepare_challenges(challenges.clone(), word.id, &store).await;
        assert_eq!(
            serde_json::to_value(&prepared).unwrap(),
            serde_json::to_value(&challenges).unwrap()
        );
    }
}
