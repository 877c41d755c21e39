use anyhow::Result;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::challenge::{generate_available_challenges, Challenge};
use crate::database::Database;
use crate::grading::{grade_challenge, Answer, ChallengeResult};
use crate::models::*;
use crate::preparer::prepare_challenges;
use crate::srs::SrsScheduler;

#[derive(Clone)]
pub struct WordService {
    db: Database,
    scheduler: SrsScheduler,
}

impl WordService {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            scheduler: SrsScheduler::new(),
        }
    }

    // Word CRUD

    pub async fn add_word(&self, request: CreateWordRequest) -> Result<Word> {
        let text = request.text.trim().to_string();
        if text.is_empty() {
            return Err(anyhow::anyhow!("Headword must not be empty"));
        }
        if let Some(existing) = self.db.find_word_by_text(&text).await? {
            return Err(anyhow::anyhow!("Word '{}' already exists", existing.text));
        }
        self.db
            .create_word(CreateWordRequest { text, ..request })
            .await
    }

    pub async fn get_word(&self, id: Uuid) -> Result<Option<Word>> {
        self.db.get_word(id).await
    }

    pub async fn find_word_by_text(&self, text: &str) -> Result<Option<Word>> {
        self.db.find_word_by_text(text).await
    }

    pub async fn get_all_words(&self) -> Result<Vec<Word>> {
        self.db.get_all_words().await
    }

    pub async fn get_words_paged(&self, limit: i64, offset: i64) -> Result<Vec<Word>> {
        self.db.get_words_paged(limit, offset).await
    }

    pub async fn search_words(&self, query: &str) -> Result<Vec<Word>> {
        self.db.search_words(query).await
    }

    pub async fn update_word(&self, id: Uuid, request: UpdateWordRequest) -> Result<Option<Word>> {
        let mut word = match self.db.get_word(id).await? {
            Some(word) => word,
            None => return Ok(None),
        };
        if let Some(meaning) = request.meaning {
            word.meaning = Some(meaning);
        }
        if let Some(example) = request.example {
            word.example = Some(example);
        }
        if let Some(ipa) = request.ipa {
            word.ipa = Some(ipa);
        }
        if let Some(quality) = request.quality {
            word.quality = quality;
        }
        if let Some(unit_id) = request.unit_id {
            word.unit_id = Some(unit_id);
        }
        self.db.save_word(&word).await?;
        Ok(Some(word))
    }

    pub async fn delete_word(&self, id: Uuid) -> Result<bool> {
        self.db.delete_word(id).await
    }

    /// Fold AI-generated details into a stored word. Review state survives.
    pub async fn apply_details(&self, id: Uuid, details: WordDetails) -> Result<Option<Word>> {
        let mut word = match self.db.get_word(id).await? {
            Some(word) => word,
            None => return Ok(None),
        };
        word.apply_details(details);
        self.db.save_word(&word).await?;
        Ok(Some(word))
    }

    /// Bulk import of AI-generated details: existing words are enriched,
    /// unknown headwords become new (refined) words.
    pub async fn import_details(&self, batch: Vec<WordDetails>) -> Result<Vec<Word>> {
        let mut saved = Vec::with_capacity(batch.len());
        for details in batch {
            let word = match self.db.find_word_by_text(&details.word).await? {
                Some(mut existing) => {
                    existing.apply_details(details);
                    existing
                }
                None => {
                    let mut word = Word::new(details.word.clone());
                    word.apply_details(details);
                    word
                }
            };
            saved.push(word);
        }
        self.db.bulk_save_words(&saved).await?;
        info!(count = saved.len(), "Imported word details batch");
        Ok(saved)
    }

    // Review operations

    pub async fn get_words_due_for_review(&self) -> Result<Vec<Word>> {
        self.db.get_words_due_for_review().await
    }

    pub async fn review_word(&self, id: Uuid, grade: ReviewGrade) -> Result<Option<Word>> {
        let mut word = match self.db.get_word(id).await? {
            Some(word) => word,
            None => return Ok(None),
        };
        self.scheduler.update_srs(&mut word, grade, Utc::now());
        self.db.update_word_after_review(&word).await?;
        Ok(Some(word))
    }

    pub async fn reset_word(&self, id: Uuid) -> Result<Option<Word>> {
        let mut word = match self.db.get_word(id).await? {
            Some(word) => word,
            None => return Ok(None),
        };
        self.scheduler.reset_progress(&mut word);
        self.db.update_word_after_review(&word).await?;
        Ok(Some(word))
    }

    // Challenge pipeline

    /// Generate and prepare the full challenge set for one word.
    pub async fn challenges_for_word(&self, id: Uuid) -> Result<Option<Vec<Challenge>>> {
        let word = match self.db.get_word(id).await? {
            Some(word) => word,
            None => return Ok(None),
        };
        let challenges = generate_available_challenges(&word);
        let prepared = prepare_challenges(challenges, word.id, &self.db).await;
        Ok(Some(prepared))
    }

    /// Grade a challenge and fold the outcome into the word's history map.
    pub async fn grade_and_record(
        &self,
        id: Uuid,
        challenge: &Challenge,
        answer: &Answer,
    ) -> Result<Option<ChallengeResult>> {
        let mut word = match self.db.get_word(id).await? {
            Some(word) => word,
            None => return Ok(None),
        };
        let result = grade_challenge(challenge, answer);
        word.history
            .record(challenge.kind(), challenge.discriminator(), result.is_correct());
        self.db.update_word_after_review(&word).await?;
        Ok(Some(result))
    }

    // Unit operations

    pub async fn save_unit(&self, name: String, description: Option<String>) -> Result<Unit> {
        self.db.save_unit(name, description).await
    }

    pub async fn get_all_units(&self) -> Result<Vec<Unit>> {
        self.db.get_all_units().await
    }

    pub async fn delete_unit(&self, id: Uuid) -> Result<bool> {
        self.db.delete_unit(id).await
    }
}
