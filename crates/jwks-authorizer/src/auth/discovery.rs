//! Identity provider discovery and key set download.
//!
//! The key set endpoint is not configured directly: the discovery document
//! (`.well-known/openid-configuration`) is fetched first and its `jwks_uri`
//! followed. Both GETs go through a [`JsonFetcher`] so tests can substitute
//! the transport.

use crate::auth::jwks::KeySet;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Default timeout applied to each discovery / JWKS request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level failure of a JSON GET.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be sent or the response not read.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body is not JSON.
    #[error("{url} returned an invalid JSON body: {reason}")]
    InvalidBody { url: String, reason: String },
}

/// Errors fetching the key set through the discovery document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The discovery document could not be fetched.
    #[error("discovery document unavailable: {0}")]
    Discovery(#[source] FetchError),

    /// The discovery document has no string `jwks_uri`.
    #[error("discovery document has no jwks_uri")]
    MissingJwksUri,

    /// The key set could not be fetched.
    #[error("key set unavailable: {0}")]
    KeySet(#[source] FetchError),

    /// The key set body is not a `{"keys": [...]}` document.
    #[error("key set document is invalid: {0}")]
    InvalidKeySet(String),
}

/// HTTP GET returning a JSON document.
#[async_trait::async_trait]
pub trait JsonFetcher: Send + Sync {
    /// GET `url` and parse the body as JSON.
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// [`JsonFetcher`] backed by `reqwest`.
pub struct HttpJsonFetcher {
    http_client: reqwest::Client,
}

impl HttpJsonFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "authorizer.discovery", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { http_client }
    }
}

impl Default for HttpJsonFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

#[async_trait::async_trait]
impl JsonFetcher for HttpJsonFetcher {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::InvalidBody {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Resolves the key set endpoint from the discovery document and downloads the key set.
pub struct DiscoveryClient {
    /// URL of the provider's discovery document.
    discovery_url: String,

    /// Transport for both GETs.
    fetcher: Arc<dyn JsonFetcher>,
}

impl DiscoveryClient {
    /// Create a client for the discovery document at `discovery_url`.
    pub fn new(discovery_url: String, fetcher: Arc<dyn JsonFetcher>) -> Self {
        Self {
            discovery_url,
            fetcher,
        }
    }

    /// Fetch the discovery document, then the key set it points to.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] if either request fails, the discovery
    /// document lacks `jwks_uri`, or the key set body has the wrong shape.
    /// No partial key set is ever returned.
    #[instrument(skip(self), fields(url = %self.discovery_url))]
    pub async fn fetch_key_set(&self) -> Result<KeySet, DiscoveryError> {
        tracing::info!(target: "authorizer.discovery", url = %self.discovery_url, "Fetching discovery document");
        let document = self
            .fetcher
            .get_json(&self.discovery_url)
            .await
            .map_err(DiscoveryError::Discovery)?;

        let jwks_uri = document
            .get("jwks_uri")
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
            .ok_or(DiscoveryError::MissingJwksUri)?;

        tracing::info!(target: "authorizer.discovery", jwks_uri = %jwks_uri, "Fetching JWKS");
        let body = self
            .fetcher
            .get_json(jwks_uri)
            .await
            .map_err(DiscoveryError::KeySet)?;

        let key_set: KeySet = serde_json::from_value(body)
            .map_err(|e| DiscoveryError::InvalidKeySet(e.to_string()))?;

        tracing::info!(
            target: "authorizer.discovery",
            key_count = key_set.len(),
            "JWKS downloaded"
        );

        Ok(key_set)
    }
}

/// Mock JSON fetcher for testing.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::{FetchError, JsonFetcher};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Canned responses keyed by URL, with per-URL call counts.
    ///
    /// URLs without a canned response answer HTTP 404.
    #[derive(Default)]
    pub struct MockJsonFetcher {
        responses: Mutex<HashMap<String, Result<Value, FetchError>>>,
        calls: Mutex<HashMap<String, usize>>,
        total_calls: AtomicUsize,
    }

    impl MockJsonFetcher {
        /// Create a fetcher with no canned responses.
        pub fn new() -> Self {
            Self::default()
        }

        /// Set (or replace) the response for `url`.
        pub async fn respond(&self, url: &str, response: Result<Value, FetchError>) {
            self.responses
                .lock()
                .await
                .insert(url.to_string(), response);
        }

        /// Number of GETs issued to `url`.
        pub async fn calls_to(&self, url: &str) -> usize {
            self.calls.lock().await.get(url).copied().unwrap_or(0)
        }

        /// Total number of GETs issued.
        pub fn call_count(&self) -> usize {
            self.total_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl JsonFetcher for MockJsonFetcher {
        async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
            self.total_calls.fetch_add(1, Ordering::SeqCst);
            *self.calls.lock().await.entry(url.to_string()).or_insert(0) += 1;

            self.responses
                .lock()
                .await
                .get(url)
                .cloned()
                .unwrap_or_else(|| {
                    Err(FetchError::Status {
                        url: url.to_string(),
                        status: 404,
                    })
                })
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockJsonFetcher;
