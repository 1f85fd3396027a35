//! JWKS model and time-bounded key set cache.
//!
//! The identity provider's key set is fetched through the
//! [`DiscoveryClient`] and cached for [`KEY_SET_TTL`]. The cache distinguishes
//! two failure modes on refresh:
//!
//! - No key set was ever fetched: [`KeyFetchError::Fatal`]. Without key
//!   material no request can ever be authorized, so the host shuts down.
//! - A previous key set exists: [`KeyFetchError::Unavailable`]. The current
//!   request is denied and the cached state is left untouched so the next
//!   request retries the refresh.
//!
//! A stale key set is never used as a fallback.

use crate::auth::discovery::{DiscoveryClient, DiscoveryError};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::instrument;

/// How long a fetched key set is served before the provider is asked again (12 hours).
pub const KEY_SET_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Certificate material of a key entry, resolved once when the key set is parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CertificateChain {
    /// `x5c` is a non-empty array of base64 DER certificates, leaf first.
    List(Vec<String>),

    /// `x5c` is a single base64 DER certificate string.
    Scalar(String),

    /// `x5c` is missing or null.
    #[default]
    Absent,

    /// `x5c` has any other shape (empty array, number, object, non-string items).
    Invalid,
}

impl From<Option<Value>> for CertificateChain {
    fn from(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => CertificateChain::Absent,
            Some(Value::String(cert)) => CertificateChain::Scalar(cert),
            Some(Value::Array(items)) if !items.is_empty() => items
                .into_iter()
                .map(|item| match item {
                    Value::String(cert) => Some(cert),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map_or(CertificateChain::Invalid, CertificateChain::List),
            Some(_) => CertificateChain::Invalid,
        }
    }
}

impl<'de> Deserialize<'de> for CertificateChain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Value>::deserialize(deserializer).map(CertificateChain::from)
    }
}

/// Read a string member, treating any other JSON type as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Value>::deserialize(deserializer).map(|value| match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// One key of the identity provider's JWKS.
///
/// Only the members needed for key selection are modelled; anything else the
/// provider publishes is ignored. A member of the wrong JSON type reads as
/// absent, so such an entry simply never matches.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct KeyEntry {
    /// Key ID.
    #[serde(default, deserialize_with = "lenient_string")]
    pub kid: Option<String>,

    /// Algorithm the key is used with (e.g. "RS256").
    #[serde(default, deserialize_with = "lenient_string")]
    pub alg: Option<String>,

    /// Key type, informational only.
    #[serde(default, deserialize_with = "lenient_string")]
    pub kty: Option<String>,

    /// Key use, informational only.
    #[serde(default, rename = "use", deserialize_with = "lenient_string")]
    pub key_use: Option<String>,

    /// X.509 certificate chain.
    #[serde(default)]
    pub x5c: CertificateChain,
}

/// JWKS document: an ordered list of keys.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct KeySet {
    /// Keys in the order the provider published them.
    #[serde(deserialize_with = "skip_unreadable_entries")]
    pub keys: Vec<KeyEntry>,
}

/// Parse `keys`, dropping entries that are not JSON objects.
///
/// One unusable entry must not take the rest of the key set down with it.
fn skip_unreadable_entries<'de, D>(deserializer: D) -> Result<Vec<KeyEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    let total = raw.len();

    let keys: Vec<KeyEntry> = raw
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<KeyEntry>(entry) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(target: "authorizer.jwks", error = %e, "Skipping unreadable JWKS entry");
                None
            }
        })
        .collect();

    if keys.len() < total {
        tracing::warn!(
            target: "authorizer.jwks",
            skipped = total - keys.len(),
            kept = keys.len(),
            "JWKS contained unreadable entries"
        );
    }

    Ok(keys)
}

impl KeySet {
    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Errors surfaced by [`KeySetCache::ensure_fresh`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyFetchError {
    /// The fetch failed and no key set has ever been obtained.
    #[error("no key set has ever been fetched: {0}")]
    Fatal(#[source] DiscoveryError),

    /// The refresh failed; a previously fetched key set exists but is not used.
    #[error("key set refresh failed: {0}")]
    Unavailable(#[source] DiscoveryError),
}

/// Point-in-time view of the cache for readiness reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySetSnapshot {
    /// Number of keys in the cached set.
    pub key_count: usize,

    /// Wall-clock time of the last successful fetch.
    pub fetched_at: DateTime<Utc>,

    /// Time since the last successful fetch.
    pub age: Duration,
}

/// Cached key set with its fetch time.
struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
    fetched_at_utc: DateTime<Utc>,
}

/// Process-wide key set cache.
///
/// Created once at startup and shared by `Arc`. The cached key set is
/// replaced as a whole under a write lock, so a reader holds either the old
/// or the new snapshot. Concurrent stale readers may each trigger a refresh.
pub struct KeySetCache {
    /// Client used to (re)fetch the key set.
    discovery: DiscoveryClient,

    /// Last successfully fetched key set.
    state: RwLock<Option<CachedKeySet>>,

    /// Cache TTL duration.
    ttl: Duration,
}

impl KeySetCache {
    /// Create an empty cache with the standard [`KEY_SET_TTL`].
    pub fn new(discovery: DiscoveryClient) -> Self {
        Self {
            discovery,
            state: RwLock::new(None),
            ttl: KEY_SET_TTL,
        }
    }

    /// How long a fetched key set is served.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a fresh key set, fetching it from the identity provider when the
    /// cached one is stale or missing.
    ///
    /// # Errors
    ///
    /// Returns [`KeyFetchError::Fatal`] if the fetch fails and nothing was ever
    /// cached, [`KeyFetchError::Unavailable`] if it fails with a previous key
    /// set in the cache. The cache is not modified on failure.
    #[instrument(skip(self))]
    pub async fn ensure_fresh(&self) -> Result<Arc<KeySet>, KeyFetchError> {
        {
            let state = self.state.read().await;
            if let Some(cached) = state.as_ref() {
                if self.is_fresh(cached, Instant::now()) {
                    tracing::debug!(target: "authorizer.jwks", "JWKS cache is still valid, no need to refresh");
                    return Ok(Arc::clone(&cached.keys));
                }
            }
        }

        self.refresh().await
    }

    /// Populate the cache before serving. Returns the number of keys fetched.
    ///
    /// # Errors
    ///
    /// Same as [`KeySetCache::ensure_fresh`]; on an empty cache any failure
    /// is [`KeyFetchError::Fatal`].
    pub async fn prefetch(&self) -> Result<usize, KeyFetchError> {
        let keys = self.ensure_fresh().await?;
        Ok(keys.len())
    }

    /// Current cache contents, if any key set has been fetched.
    pub async fn snapshot(&self) -> Option<KeySetSnapshot> {
        let state = self.state.read().await;
        state.as_ref().map(|cached| KeySetSnapshot {
            key_count: cached.keys.len(),
            fetched_at: cached.fetched_at_utc,
            age: cached.fetched_at.elapsed(),
        })
    }

    /// Stale once the TTL has fully elapsed. An empty set is always stale.
    fn is_fresh(&self, cached: &CachedKeySet, now: Instant) -> bool {
        !cached.keys.is_empty() && now.saturating_duration_since(cached.fetched_at) < self.ttl
    }

    /// Fetch the key set and replace the cached one.
    async fn refresh(&self) -> Result<Arc<KeySet>, KeyFetchError> {
        let start = Instant::now();

        let key_set = match self.discovery.fetch_key_set().await {
            Ok(key_set) => key_set,
            Err(e) => {
                metrics::record_jwks_refresh("error", start.elapsed());

                if self.state.read().await.is_some() {
                    tracing::warn!(
                        target: "authorizer.jwks",
                        error = %e,
                        "JWKS refresh failed, denying until the next successful refresh"
                    );
                    return Err(KeyFetchError::Unavailable(e));
                }

                tracing::error!(
                    target: "authorizer.jwks",
                    error = %e,
                    "JWKS fetch failed and no key set has ever been fetched"
                );
                return Err(KeyFetchError::Fatal(e));
            }
        };

        let keys = Arc::new(key_set);
        {
            let mut state = self.state.write().await;
            *state = Some(CachedKeySet {
                keys: Arc::clone(&keys),
                fetched_at: Instant::now(),
                fetched_at_utc: Utc::now(),
            });
        }

        metrics::record_jwks_refresh("success", start.elapsed());
        metrics::set_jwks_cache_keys(keys.len());

        tracing::info!(
            target: "authorizer.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        Ok(keys)
    }
}
