//! API key authentication middleware.
//!
//! Scanner kiosks and student clients authenticate with a bearer key.
//! Only SHA-256 digests of accepted keys are configured; the middleware:
//! 1. Extracts the API key from the Authorization header
//! 2. Hashes it and checks the digest against the accepted list
//! 3. Rejects unauthorized requests with HTTP 401
//!
//! With no digests configured, authentication is disabled.

use std::collections::HashSet;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::{error::AppError, state::AppState};

/// Accepted API key digests (lower-case hex SHA-256).
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    digests: HashSet<String>,
}

impl ApiKeys {
    pub fn from_digests<I, S>(digests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            digests: digests
                .into_iter()
                .map(|d| d.as_ref().trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.digests.is_empty()
    }

    pub fn accepts(&self, api_key: &str) -> bool {
        self.digests.contains(&hash_api_key(api_key))
    }
}

/// SHA-256 hex digest of a raw API key.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// API key authentication middleware function.
///
/// # Headers
///
/// Expected header format:
/// ```text
/// Authorization: Bearer abc123xyz
/// ```
///
/// # Returns
///
/// - `Ok(Response)` if authenticated (or authentication is disabled)
/// - `Err(AppError::InvalidApiKey)` if authentication fails (returns 401)
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.api_keys.is_enabled() {
        return Ok(next.run(request).await);
    }

    let api_key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidApiKey)?;

    if !state.api_keys.accepts(api_key) {
        tracing::warn!("rejected request with unknown API key");
        return Err(AppError::InvalidApiKey);
    }

    Ok(next.run(request).await)
}
