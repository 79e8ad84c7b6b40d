//! Caller authentication
//!
//! Every paraphrase request carries `Authorization: Bearer <id token>`. The
//! token is checked by an [`IdentityVerifier`] before the upload body is read.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    async_trait as axum_async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Google's token introspection endpoint for ID tokens
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// A verified caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
}

impl Identity {
    /// Label used in logs
    pub fn label(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.subject)
    }
}

/// Checks a bearer token with an identity provider.
///
/// An `Err` carries the rejection reason for logging.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, String>;
}

/// Verifies Google ID tokens through the `tokeninfo` endpoint
pub struct GoogleTokenVerifier {
    http: HttpClient,
    endpoint: String,
    client_id: Option<String>,
}

impl GoogleTokenVerifier {
    pub fn new(http: HttpClient, client_id: Option<String>) -> Self {
        Self {
            http,
            endpoint: GOOGLE_TOKENINFO_URL.to_string(),
            client_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    sub: String,
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl TokenInfo {
    fn into_identity(self, client_id: Option<&str>) -> Result<Identity, String> {
        if let Some(iss) = self.iss.as_deref() {
            if !GOOGLE_ISSUERS.contains(&iss) {
                return Err(format!("wrong issuer {}", iss));
            }
        }
        if let Some(expected) = client_id {
            if self.aud.as_deref() != Some(expected) {
                return Err(format!(
                    "audience mismatch: {}",
                    self.aud.as_deref().unwrap_or("<none>")
                ));
            }
        }
        Ok(Identity {
            subject: self.sub,
            email: self.email,
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, String> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("id_token", token)])
            .send()
            .await
            .map_err(|e| format!("identity provider unreachable: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("identity provider returned {}", status));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| format!("unreadable token info: {}", e))?;
        info.into_identity(self.client_id.as_deref())
    }
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(header: &str) -> Result<&str, ApiError> {
    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| ApiError::InvalidCredential("malformed authorization header".into()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::InvalidCredential(format!(
            "unsupported scheme {}",
            scheme
        )));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::InvalidCredential("empty bearer token".into()));
    }
    Ok(token)
}

/// Extractor for a verified caller; rejects with 401
pub struct AuthenticatedUser(pub Identity);

#[axum_async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let result = authenticate(parts, &state.verifier).await;
        if let Err(err) = &result {
            warn!(error = %err, "Rejected credentials");
        }
        result.map(AuthenticatedUser)
    }
}

async fn authenticate(
    parts: &Parts,
    verifier: &Arc<dyn IdentityVerifier>,
) -> Result<Identity, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::MissingCredential)?
        .to_str()
        .map_err(|_| ApiError::InvalidCredential("non-ASCII authorization header".into()))?;
    let token = bearer_token(header)?;

    let identity = verifier
        .verify(token)
        .await
        .map_err(ApiError::InvalidCredential)?;
    debug!(user = %identity.label(), "Credentials verified");
    Ok(identity)
}
