//! Client for the external generative-text service
//!
//! The pipeline only depends on the [`TextGenerator`] contract; the Gemini
//! `generateContent` endpoint is the production implementation.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{GenerationConfig, ParaphraseConfig};
use crate::error::TransformError;

/// One logical call: `generate(text) -> text`.
///
/// The system instruction and generation parameters are fixed per
/// implementation instance.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, text: &str) -> Result<String, TransformError>;
}

/// Gemini `models/{model}:generateContent` client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: HttpClient,
    api_key: Option<String>,
    endpoint: String,
    system_instruction: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    pub fn new(config: &ParaphraseConfig) -> Result<Self, TransformError> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_http_client(http, config))
    }

    pub fn with_http_client(http: HttpClient, config: &ParaphraseConfig) -> Self {
        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        Self {
            http,
            api_key: config.api_key.clone(),
            endpoint,
            system_instruction: config.system_instruction.clone(),
            generation: config.generation.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request<'a>(&'a self, text: &'a str) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: self.system_instruction.as_str() }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text }],
            }],
            generation_config: &self.generation,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, text: &str) -> Result<String, TransformError> {
        let api_key = self.api_key.as_deref().ok_or(TransformError::MissingApiKey)?;

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", api_key)
            .json(&self.build_request(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransformError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GenerateContentResponse = response.json().await?;
        let output = payload.text().ok_or(TransformError::EmptyResponse)?;
        debug!(
            input_chars = text.chars().count(),
            output_chars = output.chars().count(),
            "Generated rewrite"
        );
        Ok(output)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
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

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, trimmed
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
