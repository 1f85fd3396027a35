//! Authorizer error types.
//!
//! [`AuthorizerError`] covers every reason a request is denied; the decider
//! turns each into a Deny decision whose message comes from
//! [`AuthorizerError::reason`]. [`FatalError`] is the one outcome that is not
//! a decision: no key set was ever obtained, and the host must shut down.

use crate::auth::{DecodeError, DiscoveryError, InvalidSignature, KeyFetchError, KeySelectionError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Reasons a request is denied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizerError {
    #[error("missing authorization header")]
    MissingCredential,

    #[error("authorization header does not use the Bearer scheme")]
    InvalidScheme,

    #[error("malformed token: {0}")]
    MalformedToken(#[from] DecodeError),

    #[error("key set unavailable: {0}")]
    KeyFetch(#[from] KeyFetchError),

    #[error(transparent)]
    KeySelection(#[from] KeySelectionError),

    #[error(transparent)]
    InvalidSignature(#[from] InvalidSignature),
}

impl AuthorizerError {
    /// Message placed in the decision context.
    ///
    /// Kept generic: token contents and upstream error details stay in the logs.
    pub fn reason(&self) -> String {
        match self {
            AuthorizerError::MissingCredential => {
                "Bad request, missing authorization header".to_string()
            }
            AuthorizerError::InvalidScheme => "Bad request, Invalid authorization token".to_string(),
            AuthorizerError::MalformedToken(_) => "Bad request, Invalid JWT token".to_string(),
            AuthorizerError::KeyFetch(_) => "Internal Server Error, cannot fetch JWKS".to_string(),
            AuthorizerError::KeySelection(KeySelectionError::UnknownKey { .. }) => {
                "Unknown key, invalid KID in JWT token".to_string()
            }
            AuthorizerError::KeySelection(KeySelectionError::InvalidKeyEntry { .. }) => {
                "Invalid JWKS key entry".to_string()
            }
            AuthorizerError::InvalidSignature(e) => format!("Invalid JWT token: {}", e.failure),
        }
    }

    /// Bounded label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthorizerError::MissingCredential => "missing_credential",
            AuthorizerError::InvalidScheme => "invalid_scheme",
            AuthorizerError::MalformedToken(_) => "malformed_token",
            AuthorizerError::KeyFetch(_) => "key_fetch",
            AuthorizerError::KeySelection(KeySelectionError::UnknownKey { .. }) => "unknown_key",
            AuthorizerError::KeySelection(KeySelectionError::InvalidKeyEntry { .. }) => {
                "invalid_key_entry"
            }
            AuthorizerError::InvalidSignature(_) => "invalid_signature",
        }
    }
}

/// No key set has ever been fetched and fetching one failed.
///
/// The host integration is responsible for terminating the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot fetch JWKS and no key set was ever obtained: {0}")]
pub struct FatalError(#[source] pub DiscoveryError);

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for FatalError {
    fn into_response(self) -> Response {
        tracing::error!(target: "authorizer.availability", error = %self, "Authorizer cannot obtain key material");

        let body = ErrorResponse {
            error: ErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message: "An internal error occurred".to_string(),
            },
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
