use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::ai_providers::{AiProvider, AiProviderKind, JsonResponseParser};
use crate::models::WordDetails;

/// Cooperative cancellation for in-flight AI calls. The token does not
/// abort the network request; the result is discarded at the resume point
/// after the await.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct AiService {
    provider: AiProvider,
    parser: JsonResponseParser,
}

impl AiService {
    pub fn new(
        kind: AiProviderKind,
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Self {
        Self {
            provider: AiProvider::create(kind, api_key, base_url, model),
            parser: JsonResponseParser,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Generate linguistic details for one headword. Returns `Ok(None)`
    /// when the token was cancelled while the request was in flight.
    pub async fn generate_word_details(
        &self,
        word: &str,
        native_language: &str,
        cancel: &CancelToken,
    ) -> Result<Option<WordDetails>> {
        info!(word = %word, native_language = %native_language, "Generating word details");

        let prompt = word_details_prompt(word, native_language);
        let response = self
            .provider
            .complete(Some(WORD_DETAILS_SYSTEM), &prompt)
            .await?;

        // Single resume point: a cancelled request discards its result here.
        if cancel.is_cancelled() {
            info!(word = %word, "Word detail generation cancelled, discarding response");
            return Ok(None);
        }

        debug!(word = %word, response_length = response.len(), "Raw AI response for word details");
        match self.parser.parse::<WordDetails>(&response) {
            Ok(details) => Ok(Some(details)),
            Err(e) => {
                error!(word = %word, error = %e, "Failed to parse word details response");
                Err(e)
            }
        }
    }

    /// Batch variant for bulk imports. One request covers all headwords;
    /// the response array is matched by the `word` field, not by position.
    pub async fn generate_word_details_batch(
        &self,
        words: &[String],
        native_language: &str,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<WordDetails>>> {
        if words.is_empty() {
            return Ok(Some(Vec::new()));
        }
        info!(word_count = words.len(), "Generating word details batch");

        let prompt = format!(
            "{}\n\nGenerate one JSON object per word, returned as a JSON array, for these words:\n{}",
            word_details_prompt("<each word below>", native_language),
            words.join("\n")
        );
        let response = self
            .provider
            .complete(Some(WORD_DETAILS_SYSTEM), &prompt)
            .await?;

        if cancel.is_cancelled() {
            info!(word_count = words.len(), "Batch generation cancelled, discarding response");
            return Ok(None);
        }

        match self.parser.parse::<Vec<WordDetails>>(&response) {
            Ok(batch) => {
                info!(
                    requested = words.len(),
                    received = batch.len(),
                    "Word details batch generated"
                );
                Ok(Some(batch))
            }
            Err(e) => {
                error!(word_count = words.len(), error = %e, "Failed to parse batch response");
                Err(e)
            }
        }
    }

    /// Manual-paste path: the user supplies raw model output. Parse errors
    /// surface to the caller and never touch stored words.
    pub fn parse_word_details_json(&self, raw: &str) -> Result<WordDetails> {
        self.parser.parse::<WordDetails>(raw)
    }
}

const WORD_DETAILS_SYSTEM: &str = "You are a lexicographer preparing IELTS vocabulary study \
material. Always respond with valid JSON in the requested format and nothing else.";

fn word_details_prompt(word: &str, native_language: &str) -> String {
    format!(
        r#"Produce complete learner data for the English word "{word}".
Translate meanings into {native_language}.

Respond with a JSON object in exactly this shape:
{{
    "word": "{word}",
    "ipa": "/.../",
    "meaning": "translation in {native_language}",
    "example": "Two or three example sentences separated by newlines.",
    "ipa_mistakes": ["plausible wrong transcription", "..."],
    "prepositions": [{{"prep": "on", "usage": "usage phrase", "is_ignored": false}}],
    "family": {{
        "nouns": [{{"word": "...", "ipa": "/.../", "is_ignored": false}}],
        "verbs": [], "adjectives": [], "adverbs": []
    }},
    "paraphrases": [{{"word": "...", "tone": "formal|neutral|informal", "context": "example sentence", "is_ignored": false}}],
    "collocations": [{{"text": "...", "description": "...", "is_ignored": false}}],
    "idioms": [{{"text": "...", "description": "...", "is_ignored": false}}],
    "irregular_forms": null
}}

Guidelines:
- Omit sections that do not apply by using empty arrays or null.
- "irregular_forms", when the word is an irregular verb, is {{"past": "...", "past_participle": "..."}}.
- Example sentences must contain the word itself."#
    )
}
