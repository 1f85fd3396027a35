//! Test server harness for E2E testing
//!
//! Provides TestAuthorizerServer for spawning real authorizer instances in tests.

use jwks_authorizer::auth::{DiscoveryClient, HttpJsonFetcher, KeySetCache};
use jwks_authorizer::authorizer::Authorizer;
use jwks_authorizer::config::Config;
use jwks_authorizer::models::PolicyResponse;
use jwks_authorizer::observability::metrics::init_metrics_recorder;
use jwks_authorizer::routes::{self, AppState};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Resource used by [`TestAuthorizerServer::authorize`].
pub const TEST_RESOURCE: &str = "arn:aws:execute-api:eu-west-1:123456789012:api-id/test/GET/items";

/// Usage identifier key configured on test servers.
pub const TEST_USAGE_IDENTIFIER_KEY: &str = "test-usage-key";

/// Test harness running the real router on a random port.
///
/// # Example
/// ```rust,ignore
/// let idp = MockIdentityProvider::start().await;
/// idp.mount_key_set(&[&keypair]).await;
/// let server = TestAuthorizerServer::spawn(&idp.discovery_url()).await?;
///
/// let policy = server.authorize(Some("Basic xyz")).await?;
/// assert_eq!(policy.effect(), Some(Effect::Deny));
/// ```
pub struct TestAuthorizerServer {
    addr: SocketAddr,
    config: Config,
    key_cache: Arc<KeySetCache>,
    fatal: CancellationToken,
    client: reqwest::Client,
    handle: Option<JoinHandle<()>>,
}

impl TestAuthorizerServer {
    /// Configuration used by [`Self::spawn`]: defaults plus a 5 second HTTP timeout.
    pub fn test_config(discovery_url: &str) -> Config {
        Config {
            oidc_url: discovery_url.to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            usage_identifier_key: TEST_USAGE_IDENTIFIER_KEY.to_string(),
            principal_id: "user".to_string(),
            http_timeout: Duration::from_secs(5),
            jwt_clock_skew_seconds: 0,
            expected_issuers: None,
            expected_audiences: None,
            drain_seconds: 0,
        }
    }

    /// Spawn a server against the discovery document at `discovery_url`.
    ///
    /// The key set is not prefetched; the first authorization request fetches it.
    pub async fn spawn(discovery_url: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with_config(Self::test_config(discovery_url)).await
    }

    /// Spawn a server with an explicit configuration. `bind_address` is ignored.
    pub async fn spawn_with_config(config: Config) -> Result<Self, anyhow::Error> {
        let fetcher = Arc::new(HttpJsonFetcher::new(config.http_timeout));
        let discovery = DiscoveryClient::new(config.oidc_url.clone(), fetcher);
        let key_cache = Arc::new(KeySetCache::new(discovery));

        let fatal = CancellationToken::new();
        let state = Arc::new(AppState {
            authorizer: Arc::new(Authorizer::from_config(&config, Arc::clone(&key_cache))),
            fatal: fatal.clone(),
        });

        // The global recorder can only be installed once per test process;
        // later servers get a standalone one.
        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let shutdown = fatal.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
            {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            key_cache,
            fatal,
            client: reqwest::Client::new(),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The server's key set cache.
    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.key_cache
    }

    /// Whether a fatal key fetch has signalled shutdown.
    pub fn is_fatal(&self) -> bool {
        self.fatal.is_cancelled()
    }

    /// Wait up to `timeout` for the server task to finish.
    pub async fn wait_stopped(&mut self, timeout: Duration) -> bool {
        match self.handle.take() {
            Some(handle) => tokio::time::timeout(timeout, handle).await.is_ok(),
            None => true,
        }
    }

    /// POST an arbitrary body to `/authorize`.
    pub async fn post_authorize(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/authorize", self.url()))
            .json(body)
            .send()
            .await?)
    }

    /// Authorize [`TEST_RESOURCE`] with the given header value and parse the policy.
    ///
    /// Fails if the server does not answer 200.
    pub async fn authorize(
        &self,
        authorization_token: Option<&str>,
    ) -> Result<PolicyResponse, anyhow::Error> {
        let body = match authorization_token {
            Some(token) => json!({
                "type": "TOKEN",
                "methodArn": TEST_RESOURCE,
                "authorizationToken": token,
            }),
            None => json!({
                "type": "TOKEN",
                "methodArn": TEST_RESOURCE,
            }),
        };

        let response = self.post_authorize(&body).await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            anyhow::bail!("authorize returned {}", status);
        }

        Ok(response.json().await?)
    }
}

impl Drop for TestAuthorizerServer {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
