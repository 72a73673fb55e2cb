//! The outbound seam to the timing-data provider.
//!
//! The loader only knows this trait; the OpenF1 HTTP client is one
//! implementation and tests plug in in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Session, SessionKey};

/// Errors a provider fetch can end in. All of them are treated as a failed
/// (and uncached) load.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    #[error("unexpected {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },
    #[error("no session found for {0}")]
    SessionNotFound(String),
}

/// Fetches the laps and weather of one session. Network-backed and
/// unreliable: any call may fail.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn fetch_session(&self, key: &SessionKey) -> Result<Session, ProviderError>;
}
