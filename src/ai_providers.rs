use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Chat-style message shared by provider request bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// The generative-language backends the content service can talk to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AiProviderKind {
    OpenAi,
    Gemini,
}

#[derive(Debug, Clone)]
pub enum AiProvider {
    OpenAi(OpenAiProvider),
    Gemini(GeminiProvider),
}

impl AiProvider {
    pub fn create(
        kind: AiProviderKind,
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Self {
        match kind {
            AiProviderKind::OpenAi => {
                AiProvider::OpenAi(OpenAiProvider::new(api_key, base_url, model))
            }
            AiProviderKind::Gemini => {
                AiProvider::Gemini(GeminiProvider::new(api_key, base_url, model))
            }
        }
    }

    pub async fn complete(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        match self {
            AiProvider::OpenAi(provider) => provider.complete(system_message, prompt).await,
            AiProvider::Gemini(provider) => provider.complete(system_message, prompt).await,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            AiProvider::OpenAi(_) => "OpenAI",
            AiProvider::Gemini(_) => "Gemini",
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            AiProvider::OpenAi(provider) => &provider.model,
            AiProvider::Gemini(provider) => &provider.model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }
    }

    pub async fn complete(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = system_message {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        info!(
            provider = "OpenAI",
            model = %self.model,
            prompt_length = prompt.len(),
            "Making AI content request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&OpenAiRequest {
                model: self.model.clone(),
                messages,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = "OpenAI", status = %status, error = %body, "AI request failed");
            return Err(anyhow::anyhow!("OpenAI request failed: {}", body));
        }

        let parsed: OpenAiResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No choices in OpenAI response"))
    }
}

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: model.unwrap_or_else(|| "gemini-2.0-flash".to_string()),
        }
    }

    pub async fn complete(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        // Gemini has no separate system slot; prepend it to the prompt.
        let full_prompt = match system_message {
            Some(system) => format!("{}\n\n{}", system, prompt),
            None => prompt.to_string(),
        };

        info!(
            provider = "Gemini",
            model = %self.model,
            prompt_length = prompt.len(),
            "Making AI content request"
        );

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&GeminiRequest {
                contents: vec![GeminiContent {
                    parts: vec![GeminiPart { text: full_prompt }],
                }],
                generation_config: GeminiGenerationConfig {
                    temperature: 0.7,
                    max_output_tokens: 4096,
                },
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = "Gemini", status = %status, error = %body, "AI request failed");
            return Err(anyhow::anyhow!("Gemini request failed: {}", body));
        }

        let parsed: GeminiResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow::anyhow!("No candidates in Gemini response"))
    }
}

/// JSON extraction for model responses that wrap payloads in markdown
/// fences or surrounding prose.
#[derive(Debug, Clone, Default)]
pub struct JsonResponseParser;

impl JsonResponseParser {
    pub fn extract_json(content: &str) -> &str {
        if let Some(start) = content.find("```json") {
            if let Some(end) = content[start + 7..].find("```") {
                return content[start + 7..start + 7 + end].trim();
            }
        }
        if let Some(start) = content.find("```") {
            if let Some(end) = content[start + 3..].find("```") {
                let fenced = content[start + 3..start + 3 + end].trim();
                if fenced.starts_with('{') || fenced.starts_with('[') {
                    return fenced;
                }
            }
        }
        if let Some(start) = content.find('{') {
            if let Some(end) = content.rfind('}') {
                if end > start {
                    return &content[start..=end];
                }
            }
        }
        if let Some(start) = content.find('[') {
            if let Some(end) = content.rfind(']') {
                if end > start {
                    return &content[start..=end];
                }
            }
        }
        content.trim()
    }

    pub fn parse<T: serde::de::DeserializeOwned>(&self, content: &str) -> Result<T> {
        let json = Self::extract_json(content);
        serde_json::from_str::<T>(json)
            .map_err(|e| anyhow::anyhow!("Failed to parse AI JSON response: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_fenced_block() {
        let content = "Here you go:\n```json\n{\"word\": \"cat\"}\n```\nDone.";
        assert_eq!(JsonResponseParser::extract_json(content), "{\"word\": \"cat\"}");
    }

    #[test]
    fn extracts_bare_object_from_prose() {
        let content = "The answer is {\"word\": \"cat\"} as requested.";
        assert_eq!(JsonResponseParser::extract_json(content), "{\"word\": \"cat\"}");
    }

    #[test]
    fn extracts_array_payloads() {
        let content = "```\n[1, 2, 3]\n```";
        assert_eq!(JsonResponseParser::extract_json(content), "[1, 2, 3]");
    }

    #[test]
    fn parse_reports_malformed_json() {
        let parser = JsonResponseParser;
        let result: Result<serde_json::Value> = parser.parse("not json at all");
        assert!(result.is_err());
    }
}
