//! Gemini `generateContent` / `embedContent` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Embedder, LlmError, ReasoningEngine};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Stops generation before the model starts inventing tool output.
const STOP_SEQUENCE: &str = "\nObservation:";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    stop_sequences: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Embedding,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

/// Gemini client for text generation and embeddings.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    embed_model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, embed_model: String) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model,
            embed_model,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited(message));
        }
        Err(LlmError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ReasoningEngine for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                stop_sequences: vec![STOP_SEQUENCE],
            },
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Calling Gemini");
        let response: GenerateContentResponse = self.post_json(&url, &request).await?.json().await?;
        extract_text(response)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.embed_model);
        let request = EmbedContentRequest {
            model: format!("models/{}", self.embed_model),
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
        };

        let response: EmbedContentResponse = self.post_json(&url, &request).await?.json().await?;
        Ok(response.embedding.values)
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(LlmError::EmptyResponse)
    } else {
        Ok(text)
    }
}
