//! Authorization decider.
//!
//! Turns one [`AuthorizerRequest`] into an Allow or Deny [`Decision`]:
//!
//! 1. Extract the Bearer token from the authorization header
//! 2. Decode the token header for `kid` and `alg`
//! 3. Make sure the cached key set is fresh
//! 4. Select the signing certificate
//! 5. Verify signature and claims
//!
//! Every failure denies the request except a fatal key fetch, which is
//! returned as [`FatalError`] without a decision.

use crate::auth::{selector, token, KeyFetchError, KeySetCache, TokenVerifier};
use crate::config::Config;
use crate::errors::{AuthorizerError, FatalError};
use crate::models::{AuthorizerRequest, Decision, PolicyResponse};
use crate::observability::metrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Authorization scheme prefix. Case-sensitive, single space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Context message of every Allow decision.
pub const ALLOW_MESSAGE: &str = "Access Permitted";

/// Decides requests against the identity provider's key set.
pub struct Authorizer {
    key_cache: Arc<KeySetCache>,
    verifier: TokenVerifier,
    principal_id: String,
    usage_identifier_key: String,
}

impl Authorizer {
    pub fn new(
        key_cache: Arc<KeySetCache>,
        verifier: TokenVerifier,
        principal_id: impl Into<String>,
        usage_identifier_key: impl Into<String>,
    ) -> Self {
        Self {
            key_cache,
            verifier,
            principal_id: principal_id.into(),
            usage_identifier_key: usage_identifier_key.into(),
        }
    }

    /// Build an authorizer with the principal, usage key and claim policy from `config`.
    pub fn from_config(config: &Config, key_cache: Arc<KeySetCache>) -> Self {
        Self::new(
            key_cache,
            TokenVerifier::new(config.claim_policy()),
            config.principal_id.clone(),
            config.usage_identifier_key.clone(),
        )
    }

    /// Shared key set cache.
    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.key_cache
    }

    /// Decide one request.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError`] only when no key set was ever fetched and the
    /// fetch failed. Every other failure is a Deny decision.
    #[instrument(skip_all, name = "authorizer.authorize", fields(resource = %request.method_arn))]
    pub async fn authorize(&self, request: &AuthorizerRequest) -> Result<Decision, FatalError> {
        let start = Instant::now();

        tracing::info!(
            target: "authorizer.request",
            resource = %request.method_arn,
            has_token = request.authorization_token.is_some(),
            "Authorization request received"
        );

        let (decision, reason) = match self.evaluate(request).await {
            Ok(()) => (
                Decision::allow(&self.principal_id, &request.method_arn, ALLOW_MESSAGE),
                "none",
            ),
            Err(AuthorizerError::KeyFetch(KeyFetchError::Fatal(e))) => {
                tracing::error!(
                    target: "authorizer.decision",
                    resource = %request.method_arn,
                    error = %e,
                    "No key set available, cannot decide"
                );
                return Err(FatalError(e));
            }
            Err(e) => {
                tracing::warn!(
                    target: "authorizer.decision",
                    reason = e.kind(),
                    error = %e,
                    "Request denied"
                );
                (
                    Decision::deny(&self.principal_id, &request.method_arn, e.reason()),
                    e.kind(),
                )
            }
        };

        metrics::record_decision(decision.effect.as_str(), reason, start.elapsed());

        tracing::info!(
            target: "authorizer.decision",
            resource = %decision.resource,
            effect = decision.effect.as_str(),
            reason = reason,
            "Decision issued"
        );

        Ok(decision)
    }

    /// Decide one request and render the gateway policy document.
    ///
    /// # Errors
    ///
    /// See [`Authorizer::authorize`].
    pub async fn handle(&self, request: &AuthorizerRequest) -> Result<PolicyResponse, FatalError> {
        let decision = self.authorize(request).await?;
        Ok(decision.into_policy(&self.usage_identifier_key))
    }

    async fn evaluate(&self, request: &AuthorizerRequest) -> Result<(), AuthorizerError> {
        let header = request
            .authorization_token
            .as_deref()
            .ok_or(AuthorizerError::MissingCredential)?;

        let raw_token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthorizerError::InvalidScheme)?;

        let decoded = token::decode(raw_token)?;

        let key_set = self.key_cache.ensure_fresh().await?;

        let certificate_pem = selector::select(&key_set, &decoded.key_id, &decoded.algorithm)?;

        self.verifier
            .verify(raw_token, &decoded.algorithm, &certificate_pem)?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::discovery::{DiscoveryClient, FetchError, MockJsonFetcher};
    use crate::auth::ClaimPolicy;
    use crate::models::Effect;
    use authorizer_test_utils::{tamper_signature, TestClaims, TestKeypair};
    use serde_json::json;

    const DISCOVERY_URL: &str = "https://idp.test/.well-known/openid-configuration";
    const JWKS_URL: &str = "https://idp.test/jwks";
    const RESOURCE: &str = "arn:aws:execute-api:eu-west-1:123456789012:api/prod/GET/items";

    struct Fixture {
        fetcher: Arc<MockJsonFetcher>,
        authorizer: Authorizer,
        keypair: TestKeypair,
    }

    async fn fixture() -> Fixture {
        let keypair = TestKeypair::rsa_primary("key-1");
        let fetcher = Arc::new(MockJsonFetcher::new());
        fetcher
            .respond(DISCOVERY_URL, Ok(json!({ "jwks_uri": JWKS_URL })))
            .await;
        fetcher
            .respond(JWKS_URL, Ok(json!({ "keys": [keypair.jwk_json()] })))
            .await;

        let cache = Arc::new(KeySetCache::new(DiscoveryClient::new(
            DISCOVERY_URL.to_string(),
            fetcher.clone(),
        )));
        let authorizer = Authorizer::new(
            cache,
            TokenVerifier::new(ClaimPolicy::default()),
            "user",
            "usage-key",
        );

        Fixture {
            fetcher,
            authorizer,
            keypair,
        }
    }

    fn request(token: Option<&str>) -> AuthorizerRequest {
        AuthorizerRequest {
            method_arn: RESOURCE.to_string(),
            authorization_token: token.map(ToString::to_string),
            request_type: Some("TOKEN".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_token_is_denied() {
        let f = fixture().await;

        let decision = f.authorizer.authorize(&request(None)).await.unwrap();

        assert_eq!(decision.effect, Effect::Deny);
        assert!(decision.message.contains("missing authorization header"));
        assert_eq!(decision.principal, "user");
        assert_eq!(decision.resource, RESOURCE);
        // Credential checks happen before any key fetch
        assert_eq!(f.fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_scheme_is_denied() {
        let f = fixture().await;

        let decision = f
            .authorizer
            .authorize(&request(Some("Basic xyz")))
            .await
            .unwrap();

        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.message, "Bad request, Invalid authorization token");
    }

    #[tokio::test]
    async fn test_scheme_is_case_sensitive() {
        let f = fixture().await;
        let token = f.keypair.sign(&TestClaims::valid());

        let decision = f
            .authorizer
            .authorize(&request(Some(&format!("bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(decision.effect, Effect::Deny);
    }

    #[tokio::test]
    async fn test_empty_bearer_token_is_denied() {
        let f = fixture().await;

        let decision = f
            .authorizer
            .authorize(&request(Some("Bearer ")))
            .await
            .unwrap();

        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.message, "Bad request, Invalid JWT token");
    }

    #[tokio::test]
    async fn test_valid_token_is_allowed() {
        let f = fixture().await;
        let token = f.keypair.sign(&TestClaims::valid());

        let decision = f
            .authorizer
            .authorize(&request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(decision.effect, Effect::Allow);
        assert_eq!(decision.message, ALLOW_MESSAGE);
        assert_eq!(decision.principal, "user");
        assert_eq!(decision.resource, RESOURCE);
    }

    #[tokio::test]
    async fn test_tampered_signature_is_denied() {
        let f = fixture().await;
        let token = tamper_signature(&f.keypair.sign(&TestClaims::valid()));

        let decision = f
            .authorizer
            .authorize(&request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(decision.effect, Effect::Deny);
        assert!(decision.message.starts_with("Invalid JWT token"));
    }

    #[tokio::test]
    async fn test_unknown_kid_is_denied() {
        let f = fixture().await;
        let stranger = TestKeypair::rsa_rotated("key-unknown");
        let token = stranger.sign(&TestClaims::valid());

        let decision = f
            .authorizer
            .authorize(&request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(decision.effect, Effect::Deny);
        assert!(decision.message.to_lowercase().contains("unknown key"));
    }

    #[tokio::test]
    async fn test_expired_token_is_denied() {
        let f = fixture().await;
        let expired = TestClaims::valid().with_exp(chrono::Utc::now().timestamp() - 60);
        let token = f.keypair.sign(&expired);

        let decision = f
            .authorizer
            .authorize(&request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.message, "Invalid JWT token: token expired");
    }

    #[tokio::test]
    async fn test_first_fetch_failure_is_fatal() {
        let f = fixture().await;
        f.fetcher
            .respond(
                DISCOVERY_URL,
                Err(FetchError::Transport {
                    url: DISCOVERY_URL.to_string(),
                    reason: "connection refused".to_string(),
                }),
            )
            .await;
        let token = f.keypair.sign(&TestClaims::valid());

        let result = f
            .authorizer
            .authorize(&request(Some(&format!("Bearer {token}"))))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_after_success_denies() {
        let f = fixture().await;
        let token = f.keypair.sign(&TestClaims::valid());
        let req = request(Some(&format!("Bearer {token}")));

        let first = f.authorizer.authorize(&req).await.unwrap();
        assert_eq!(first.effect, Effect::Allow);

        tokio::time::advance(crate::auth::KEY_SET_TTL).await;
        f.fetcher
            .respond(
                JWKS_URL,
                Err(FetchError::Status {
                    url: JWKS_URL.to_string(),
                    status: 503,
                }),
            )
            .await;

        let second = f.authorizer.authorize(&req).await.unwrap();
        assert_eq!(second.effect, Effect::Deny);
        assert_eq!(second.message, "Internal Server Error, cannot fetch JWKS");

        // The previous key set is still cached
        let snapshot = f.authorizer.key_cache().snapshot().await.unwrap();
        assert_eq!(snapshot.key_count, 1);
    }

    #[tokio::test]
    async fn test_handle_renders_policy() {
        let f = fixture().await;
        let token = f.keypair.sign(&TestClaims::valid());

        let policy = f
            .authorizer
            .handle(&request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(policy.principal_id, "user");
        assert_eq!(policy.usage_identifier_key, "usage-key");
        assert_eq!(policy.effect(), Some(Effect::Allow));
        assert_eq!(policy.context.message, ALLOW_MESSAGE);
    }
}
