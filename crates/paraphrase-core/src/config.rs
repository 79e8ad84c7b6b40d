//! Pipeline configuration
//!
//! Built once at process start and shared immutably by the orchestrator and
//! the text transformer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default generative model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default endpoint of the generative-language API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Instruction sent with every rewrite request
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Rewrite the text to be unique and human-like, \
but keep the length similar to the original so it fits in the document layout. \
Do not add conversational filler.";

/// Maximum rewrite calls in flight at once
pub const DEFAULT_MAX_CONCURRENCY: usize = 15;

/// Characters per chunk on the flat-text path
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Appended to the input file stem to name the output
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_humanized";

/// Sampling parameters forwarded to the generative service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 8192,
        }
    }
}

/// Complete configuration of the paraphrasing pipeline
#[derive(Debug, Clone)]
pub struct ParaphraseConfig {
    /// Generative model name (e.g. "gemini-2.5-flash")
    pub model: String,
    /// API key; `None` makes every rewrite fail open
    pub api_key: Option<String>,
    /// Base URL of the generative-language API
    pub base_url: String,
    pub system_instruction: String,
    pub generation: GenerationConfig,
    /// Concurrency ceiling shared by all requests of this process
    pub max_concurrency: usize,
    /// Flat-text chunk size in characters
    pub chunk_size: usize,
    pub output_suffix: String,
    /// Per-call timeout enforced by the HTTP transport
    pub request_timeout: Duration,
}

impl Default for ParaphraseConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            generation: GenerationConfig::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ParaphraseConfig {
    /// Build configuration from environment variables, falling back to defaults.
    ///
    /// Recognised variables: `GOOGLE_API_KEY` (or `GEMINI_API_KEY`),
    /// `GEMINI_MODEL`, `GEMINI_BASE_URL`, `PARAPHRASE_MAX_CONCURRENCY`,
    /// `PARAPHRASE_CHUNK_SIZE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("GOOGLE_API_KEY")
            .or_else(|| lookup("GEMINI_API_KEY"))
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("GOOGLE_API_KEY not set in environment variables.");
        }

        Self {
            model: lookup("GEMINI_MODEL").unwrap_or(defaults.model),
            api_key,
            base_url: lookup("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            max_concurrency: parse_positive(lookup("PARAPHRASE_MAX_CONCURRENCY"))
                .unwrap_or(defaults.max_concurrency),
            chunk_size: parse_positive(lookup("PARAPHRASE_CHUNK_SIZE"))
                .unwrap_or(defaults.chunk_size),
            ..defaults
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the concurrency ceiling (clamped to at least 1)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Override the flat-text chunk size (clamped to at least 1)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

fn parse_positive(value: Option<String>) -> Option<usize> {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
}
