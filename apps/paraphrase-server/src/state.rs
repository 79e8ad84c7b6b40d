//! Application state for the paraphrase server

use std::sync::Arc;

use paraphrase_core::Paraphraser;

use crate::auth::IdentityVerifier;

/// Shared across all requests; the paraphraser's concurrency limiter is
/// therefore process-wide.
#[derive(Clone)]
pub struct AppState {
    pub paraphraser: Arc<Paraphraser>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(paraphraser: Paraphraser, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            paraphraser: Arc::new(paraphraser),
            verifier,
        }
    }
}
