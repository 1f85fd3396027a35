//! Compact JWT decoding without signature verification.
//!
//! Splits a token into its three parts and reads the header fields needed to
//! pick a verification key from the JWKS: `alg` and `kid`. The payload is
//! parsed so that structurally broken tokens are rejected before any network
//! or cryptographic work happens.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Nothing returned here is trusted until [`crate::auth::verifier`] has
//!   verified the signature
//! - Error messages are generic; details are logged at debug level

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum accepted token size in bytes (8KB).
///
/// Typical identity provider access tokens are 1-2KB. Anything larger than
/// this is rejected before base64 decoding allocates.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Errors produced while decoding a compact token.
///
/// All variants collapse into a single "malformed token" deny reason; the
/// variant is only used for logging and tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Token is empty.
    #[error("token is empty")]
    Empty,

    /// Token size exceeds [`MAX_TOKEN_SIZE_BYTES`].
    #[error("token exceeds maximum size")]
    TokenTooLarge,

    /// Token is not a `header.payload.signature` structure.
    #[error("token is not a three-part JWT")]
    InvalidStructure,

    /// Header or payload is not base64url-encoded JSON object.
    #[error("token segment is not a base64url JSON object")]
    InvalidSegment,

    /// Header has no usable `alg` field.
    #[error("token header has no alg")]
    MissingAlgorithm,

    /// Header has no usable `kid` field.
    #[error("token header has no kid")]
    MissingKid,
}

/// Header fields and claims of a token whose signature is not yet verified.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    /// Algorithm named by the token header, verbatim.
    pub algorithm: String,

    /// Key identifier named by the token header, verbatim.
    pub key_id: String,

    /// Unverified payload claims.
    pub claims: Map<String, Value>,
}

/// Decode a compact token into its header fields and unverified claims.
///
/// The input must already be stripped of any `Bearer ` prefix.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the token is empty, too large, not three
/// dot-separated segments, has a header or payload that is not a base64url
/// JSON object, or lacks a non-empty string `alg` or `kid`.
pub fn decode(token: &str) -> Result<DecodedToken, DecodeError> {
    if token.is_empty() {
        return Err(DecodeError::Empty);
    }

    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "authorizer.token",
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(DecodeError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(header_part), Some(payload_part), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "authorizer.token", "Token rejected: invalid JWT format");
        return Err(DecodeError::InvalidStructure);
    };

    let mut header = decode_segment(header_part)?;
    let claims = decode_segment(payload_part)?;

    let algorithm = take_string(&mut header, "alg").ok_or(DecodeError::MissingAlgorithm)?;
    let key_id = take_string(&mut header, "kid").ok_or(DecodeError::MissingKid)?;

    tracing::debug!(
        target: "authorizer.token",
        alg = %algorithm,
        kid = %key_id,
        "Token header decoded"
    );

    Ok(DecodedToken {
        algorithm,
        key_id,
        claims,
    })
}

fn decode_segment(segment: &str) -> Result<Map<String, Value>, DecodeError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "authorizer.token", error = %e, "Failed to decode token segment base64");
        DecodeError::InvalidSegment
    })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            tracing::debug!(target: "authorizer.token", "Token segment is not a JSON object");
            Err(DecodeError::InvalidSegment)
        }
        Err(e) => {
            tracing::debug!(target: "authorizer.token", error = %e, "Failed to parse token segment JSON");
            Err(DecodeError::InvalidSegment)
        }
    }
}

/// Remove a field from the header, keeping it only if it is a non-empty string.
fn take_string(header: &mut Map<String, Value>, field: &str) -> Option<String> {
    match header.remove(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}
