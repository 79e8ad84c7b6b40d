//! Fail-open text transformer
//!
//! Every non-blank unit is sent to the [`TextGenerator`] under the shared
//! [`ConcurrencyLimiter`]. Any failure yields the original text so a document
//! never loses content because rewriting failed.

use std::sync::Arc;

use tracing::warn;

use crate::error::TransformError;
use crate::generator::TextGenerator;
use crate::limiter::ConcurrencyLimiter;

/// Characters of the failing text included in failure logs
const LOG_PREFIX_CHARS: usize = 20;

/// Text Transformer: `rewrite(text) -> text`, never failing.
#[derive(Clone)]
pub struct Rewriter {
    generator: Arc<dyn TextGenerator>,
    limiter: ConcurrencyLimiter,
}

impl Rewriter {
    pub fn new(generator: Arc<dyn TextGenerator>, limiter: ConcurrencyLimiter) -> Self {
        Self { generator, limiter }
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Rewrite one unit of text.
    ///
    /// Blank input is returned unchanged without calling the service.
    pub async fn rewrite(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        match self.try_rewrite(text).await {
            Ok(rewritten) => rewritten,
            Err(err) => {
                warn!(
                    error = %err,
                    "Rewrite failed for text '{}...', keeping original",
                    log_prefix(text)
                );
                text.to_string()
            }
        }
    }

    async fn try_rewrite(&self, text: &str) -> Result<String, TransformError> {
        let _permit = self.limiter.acquire().await?;
        let rewritten = self.generator.generate(text).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            return Err(TransformError::EmptyResponse);
        }
        Ok(rewritten.to_string())
    }
}

fn log_prefix(text: &str) -> String {
    text.chars().take(LOG_PREFIX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Upper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Upper {
        async fn generate(&self, text: &str) -> Result<String, TransformError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("  {}  ", text.to_uppercase()))
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _text: &str) -> Result<String, TransformError> {
            Err(TransformError::Status {
                status: 429,
                body: "quota exceeded".into(),
            })
        }
    }

    struct Blank;

    #[async_trait]
    impl TextGenerator for Blank {
        async fn generate(&self, _text: &str) -> Result<String, TransformError> {
            Ok("   ".into())
        }
    }

    fn upper() -> (Arc<Upper>, Rewriter) {
        let generator = Arc::new(Upper {
            calls: AtomicUsize::new(0),
        });
        let rewriter = Rewriter::new(generator.clone(), ConcurrencyLimiter::new(4));
        (generator, rewriter)
    }

    #[tokio::test]
    async fn test_rewrites_and_trims() {
        let (_, rewriter) = upper();
        assert_eq!(rewriter.rewrite("hello").await, "HELLO");
    }

    #[tokio::test]
    async fn test_blank_input_skips_service() {
        let (generator, rewriter) = upper();
        assert_eq!(rewriter.rewrite("").await, "");
        assert_eq!(rewriter.rewrite("  \n\t ").await, "  \n\t ");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_returns_original() {
        let rewriter = Rewriter::new(Arc::new(Failing), ConcurrencyLimiter::new(1));
        assert_eq!(rewriter.rewrite("Keep me.").await, "Keep me.");
    }

    #[tokio::test]
    async fn test_blank_response_returns_original() {
        let rewriter = Rewriter::new(Arc::new(Blank), ConcurrencyLimiter::new(1));
        assert_eq!(rewriter.rewrite("Keep me too.").await, "Keep me too.");
    }

    #[tokio::test]
    async fn test_permit_released_after_failure() {
        let rewriter = Rewriter::new(Arc::new(Failing), ConcurrencyLimiter::new(1));
        rewriter.rewrite("one").await;
        rewriter.rewrite("two").await;
        assert_eq!(rewriter.limiter().available(), 1);
    }

    #[test]
    fn test_log_prefix_is_char_safe() {
        assert_eq!(log_prefix("short"), "short");
        let long = "ąęśćżźółń".repeat(5);
        assert_eq!(log_prefix(&long).chars().count(), LOG_PREFIX_CHARS);
    }
}
