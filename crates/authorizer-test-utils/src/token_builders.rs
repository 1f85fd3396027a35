//! Builder for test token claims
//!
//! ```rust,ignore
//! let claims = TestClaims::valid()
//!     .with_iss("https://idp.example.com")
//!     .with_aud("gateway-api");
//! let token = keypair.sign(&claims);
//! ```

use chrono::{Duration, Utc};
use serde::Serialize;

/// Registered claims of a test token. Optional claims are omitted when unset.
#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
    pub sub: String,
    pub iat: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl TestClaims {
    /// Subject "test-subject", issued now, expiring in one hour.
    pub fn valid() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            iat: now.timestamp(),
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            nbf: None,
            iss: None,
            aud: None,
        }
    }

    pub fn with_sub(mut self, sub: &str) -> Self {
        self.sub = sub.to_string();
        self
    }

    /// Set expiration as a Unix timestamp.
    pub fn with_exp(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn without_exp(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set not-before as a Unix timestamp.
    pub fn with_nbf(mut self, nbf: i64) -> Self {
        self.nbf = Some(nbf);
        self
    }

    pub fn with_iss(mut self, iss: &str) -> Self {
        self.iss = Some(iss.to_string());
        self
    }

    pub fn with_aud(mut self, aud: &str) -> Self {
        self.aud = Some(aud.to_string());
        self
    }
}

impl Default for TestClaims {
    fn default() -> Self {
        Self::valid()
    }
}
