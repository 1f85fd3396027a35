//! Mock identity provider
//!
//! A wiremock server publishing an OpenID discovery document at
//! `/.well-known/openid-configuration` that points at a JWKS at `/jwks`.

use crate::crypto_fixtures::{key_set_json, TestKeypair};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
pub const JWKS_PATH: &str = "/jwks";

pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    /// Start a provider with nothing mounted. Every path answers 404.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.server.uri(), DISCOVERY_PATH)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Serve the discovery document and a key set of `keypairs`.
    pub async fn mount_key_set(&self, keypairs: &[&TestKeypair]) {
        self.mount_discovery().await;
        self.mount_jwks(key_set_json(keypairs)).await;
    }

    /// Serve the discovery document pointing at [`Self::jwks_url`].
    pub async fn mount_discovery(&self) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": self.server.uri(),
                "jwks_uri": self.jwks_url(),
            })))
            .mount(&self.server)
            .await;
    }

    /// Serve `body` as the JWKS document.
    pub async fn mount_jwks(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Serve `keypairs` and verify on drop that the JWKS was fetched exactly `times` times.
    pub async fn mount_key_set_expecting(&self, keypairs: &[&TestKeypair], times: u64) {
        self.mount_discovery().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(key_set_json(keypairs)))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer `status` on both the discovery and the JWKS paths.
    pub async fn mount_failure(&self, status: u16) {
        for p in [DISCOVERY_PATH, JWKS_PATH] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(status))
                .mount(&self.server)
                .await;
        }
    }

    /// Drop every mounted response and recorded request.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Number of requests received for `request_path`.
    pub async fn requests_to(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}
