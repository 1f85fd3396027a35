//! JWT signature and claim verification against an `x5c` certificate.
//!
//! # Security
//!
//! - Validation is built for exactly the algorithm in the token header; the
//!   same algorithm was also required to match the selected key's `alg`
//! - HMAC algorithms are rejected: a published certificate must never be
//!   usable as a shared secret
//! - `exp` and `nbf` are checked when present; neither is required
//! - Every failure collapses into [`InvalidSignature`]; the finer
//!   [`VerificationFailure`] is for logs only

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Claim checks applied on top of the signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimPolicy {
    /// Leeway in seconds for `exp` / `nbf`.
    pub leeway_seconds: u64,

    /// Accepted `iss` values. `None` disables the issuer check.
    pub issuers: Option<Vec<String>>,

    /// Accepted `aud` values. `None` disables the audience check.
    pub audiences: Option<Vec<String>>,
}

/// Why verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    /// Algorithm unknown or not allowed with certificate keys.
    UnsupportedAlgorithm,
    /// The certificate could not be turned into a verification key.
    KeyMaterial,
    /// Signature does not match.
    SignatureMismatch,
    /// `exp` is in the past.
    Expired,
    /// `nbf` is in the future.
    NotYetValid,
    /// `iss` not accepted.
    IssuerMismatch,
    /// `aud` not accepted.
    AudienceMismatch,
    /// Claims missing or malformed.
    InvalidClaims,
}

impl VerificationFailure {
    /// Short label, safe to return to callers and to use as a metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationFailure::UnsupportedAlgorithm => "unsupported algorithm",
            VerificationFailure::KeyMaterial => "unusable key material",
            VerificationFailure::SignatureMismatch => "signature mismatch",
            VerificationFailure::Expired => "token expired",
            VerificationFailure::NotYetValid => "token not yet valid",
            VerificationFailure::IssuerMismatch => "issuer mismatch",
            VerificationFailure::AudienceMismatch => "audience mismatch",
            VerificationFailure::InvalidClaims => "invalid claims",
        }
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The token did not verify.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid signature: {failure}")]
pub struct InvalidSignature {
    /// Underlying reason, informational only.
    pub failure: VerificationFailure,
}

impl From<VerificationFailure> for InvalidSignature {
    fn from(failure: VerificationFailure) -> Self {
        Self { failure }
    }
}

/// Verifies tokens against a PEM certificate.
#[derive(Debug, Clone, Default)]
pub struct TokenVerifier {
    policy: ClaimPolicy,
}

impl TokenVerifier {
    /// Create a verifier applying `policy`.
    pub fn new(policy: ClaimPolicy) -> Self {
        Self { policy }
    }

    /// Verify `token` with the certificate in `certificate_pem`, accepting only `algorithm`.
    ///
    /// Returns the verified claims.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSignature`] on signature mismatch, expired or not yet
    /// valid tokens, malformed claims, issuer/audience mismatch when
    /// configured, unusable key material, or an algorithm that cannot be
    /// verified with a certificate.
    pub fn verify(
        &self,
        token: &str,
        algorithm: &str,
        certificate_pem: &str,
    ) -> Result<Map<String, Value>, InvalidSignature> {
        let algorithm = Algorithm::from_str(algorithm).map_err(|_| {
            tracing::debug!(target: "authorizer.verifier", alg = %algorithm, "Unknown token algorithm");
            VerificationFailure::UnsupportedAlgorithm
        })?;

        let decoding_key = decoding_key(algorithm, certificate_pem.as_bytes())?;
        let validation = self.validation(algorithm);

        let token_data =
            decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(|e| {
                let failure = classify(e.kind());
                tracing::debug!(
                    target: "authorizer.verifier",
                    error = %e,
                    failure = %failure,
                    "Token verification failed"
                );
                InvalidSignature::from(failure)
            })?;

        Ok(token_data.claims)
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        // Validation::new pins `algorithms` to exactly this one
        let mut validation = Validation::new(algorithm);
        validation.leeway = self.policy.leeway_seconds;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.required_spec_claims.clear();

        if let Some(issuers) = &self.policy.issuers {
            validation.set_issuer(issuers);
            validation.required_spec_claims.insert("iss".to_string());
        }

        match &self.policy.audiences {
            Some(audiences) => {
                validation.set_audience(audiences);
                validation.required_spec_claims.insert("aud".to_string());
            }
            None => validation.validate_aud = false,
        }

        validation
    }
}

/// Build the verification key for `algorithm` from a certificate PEM.
fn decoding_key(algorithm: Algorithm, pem: &[u8]) -> Result<DecodingKey, InvalidSignature> {
    let key = match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            tracing::warn!(
                target: "authorizer.verifier",
                alg = ?algorithm,
                "Rejecting HMAC token presented against a public certificate"
            );
            return Err(VerificationFailure::UnsupportedAlgorithm.into());
        }
    };

    key.map_err(|e| {
        tracing::warn!(target: "authorizer.verifier", error = %e, "Certificate is not a usable verification key");
        InvalidSignature::from(VerificationFailure::KeyMaterial)
    })
}

fn classify(kind: &ErrorKind) -> VerificationFailure {
    match kind {
        ErrorKind::InvalidSignature => VerificationFailure::SignatureMismatch,
        ErrorKind::ExpiredSignature => VerificationFailure::Expired,
        ErrorKind::ImmatureSignature => VerificationFailure::NotYetValid,
        ErrorKind::InvalidIssuer => VerificationFailure::IssuerMismatch,
        ErrorKind::InvalidAudience => VerificationFailure::AudienceMismatch,
        ErrorKind::InvalidAlgorithm => VerificationFailure::UnsupportedAlgorithm,
        ErrorKind::InvalidKeyFormat | ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey => {
            VerificationFailure::KeyMaterial
        }
        _ => VerificationFailure::InvalidClaims,
    }
}
