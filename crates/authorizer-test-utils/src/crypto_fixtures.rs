//! Fixed signing keys for reproducible tests
//!
//! Each keypair is a private key plus a self-signed certificate for its public
//! half, stored under `fixtures/`. The certificates are what the identity
//! provider publishes in `x5c`; the private keys sign test tokens.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Value};

const RSA_PRIMARY_KEY: &str = include_str!("../fixtures/rsa_primary_key.pem");
const RSA_PRIMARY_CERT: &str = include_str!("../fixtures/rsa_primary_cert.pem");
const RSA_ROTATED_KEY: &str = include_str!("../fixtures/rsa_rotated_key.pem");
const RSA_ROTATED_CERT: &str = include_str!("../fixtures/rsa_rotated_cert.pem");
const EC_P256_KEY: &str = include_str!("../fixtures/ec_p256_key.pem");
const EC_P256_CERT: &str = include_str!("../fixtures/ec_p256_cert.pem");

/// A signing key, its certificate, and the `kid` it is published under.
#[derive(Debug, Clone)]
pub struct TestKeypair {
    kid: String,
    algorithm: Algorithm,
    private_key_pem: &'static str,
    certificate_pem: &'static str,
}

impl TestKeypair {
    /// RSA 2048 key, signs RS256.
    pub fn rsa_primary(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            algorithm: Algorithm::RS256,
            private_key_pem: RSA_PRIMARY_KEY,
            certificate_pem: RSA_PRIMARY_CERT,
        }
    }

    /// A second, unrelated RSA 2048 key, signs RS256. Models a rotated key.
    pub fn rsa_rotated(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            algorithm: Algorithm::RS256,
            private_key_pem: RSA_ROTATED_KEY,
            certificate_pem: RSA_ROTATED_CERT,
        }
    }

    /// EC P-256 key, signs ES256.
    pub fn ec_p256(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            algorithm: Algorithm::ES256,
            private_key_pem: EC_P256_KEY,
            certificate_pem: EC_P256_CERT,
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// JOSE name of the signing algorithm, e.g. "RS256".
    pub fn algorithm_name(&self) -> &'static str {
        match self.algorithm {
            Algorithm::ES256 => "ES256",
            _ => "RS256",
        }
    }

    /// `kty` published for this key.
    pub fn key_type(&self) -> &'static str {
        match self.algorithm {
            Algorithm::ES256 => "EC",
            _ => "RSA",
        }
    }

    /// Certificate in PEM form, as on disk.
    pub fn certificate_pem(&self) -> String {
        self.certificate_pem.to_string()
    }

    /// Base64 DER of the certificate, as published in `x5c`.
    pub fn certificate_body_b64(&self) -> String {
        self.certificate_pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .map(str::trim)
            .collect()
    }

    /// JWKS entry with `x5c` as a one-element list.
    pub fn jwk_json(&self) -> Value {
        json!({
            "kid": self.kid,
            "alg": self.algorithm_name(),
            "kty": self.key_type(),
            "use": "sig",
            "x5c": [self.certificate_body_b64()],
        })
    }

    /// JWKS entry with `x5c` as a bare string.
    pub fn jwk_json_scalar(&self) -> Value {
        json!({
            "kid": self.kid,
            "alg": self.algorithm_name(),
            "kty": self.key_type(),
            "use": "sig",
            "x5c": self.certificate_body_b64(),
        })
    }

    /// Sign `claims` with this key; the header carries `alg` and `kid`.
    pub fn sign<T: Serialize>(&self, claims: &T) -> String {
        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    /// Sign `claims` with this key under a caller-supplied header.
    ///
    /// The header's `alg` must match the key type.
    pub fn sign_with_header<T: Serialize>(&self, header: &Header, claims: &T) -> String {
        let key = match self.algorithm {
            Algorithm::ES256 => EncodingKey::from_ec_pem(self.private_key_pem.as_bytes()),
            _ => EncodingKey::from_rsa_pem(self.private_key_pem.as_bytes()),
        }
        .expect("fixture private key should parse");

        encode(header, claims, &key).expect("signing with a fixture key should succeed")
    }
}

/// Alter one character in the middle of the token's signature segment.
///
/// The last character is avoided since it may only carry padding bits.
pub fn tamper_signature(token: &str) -> String {
    let (signing_input, signature) = token
        .rsplit_once('.')
        .expect("token should have a signature segment");

    let mut chars: Vec<char> = signature.chars().collect();
    let middle = chars.len() / 2;
    let replacement = if chars[middle] == 'A' { 'B' } else { 'A' };
    chars[middle] = replacement;

    format!("{}.{}", signing_input, chars.into_iter().collect::<String>())
}

/// Build a JWKS document from keypairs, each entry with a list `x5c`.
pub fn key_set_json(keypairs: &[&TestKeypair]) -> Value {
    json!({ "keys": keypairs.iter().map(|k| k.jwk_json()).collect::<Vec<_>>() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_body_has_no_armor_or_whitespace() {
        let body = TestKeypair::rsa_primary("k").certificate_body_b64();

        assert!(body.starts_with("MII"));
        assert!(!body.contains("-----"));
        assert!(!body.contains('\n'));
    }

    #[test]
    fn test_fixture_keys_are_distinct() {
        let primary = TestKeypair::rsa_primary("k").certificate_body_b64();
        let rotated = TestKeypair::rsa_rotated("k").certificate_body_b64();
        let ec = TestKeypair::ec_p256("k").certificate_body_b64();

        assert_ne!(primary, rotated);
        assert_ne!(primary, ec);
    }

    #[test]
    fn test_jwk_json_shapes() {
        let keypair = TestKeypair::ec_p256("ec-1");

        let list = keypair.jwk_json();
        let scalar = keypair.jwk_json_scalar();

        assert_eq!(list["kid"], "ec-1");
        assert_eq!(list["alg"], "ES256");
        assert_eq!(list["kty"], "EC");
        assert!(list["x5c"].is_array());
        assert!(scalar["x5c"].is_string());
    }

    #[test]
    fn test_tamper_signature_changes_only_signature() {
        let token = "aGVhZA.Ym9keQ.c2lnbmF0dXJl";

        let tampered = tamper_signature(token);

        assert_ne!(tampered, token);
        assert!(tampered.starts_with("aGVhZA.Ym9keQ."));
        assert_eq!(tampered.len(), token.len());
    }

    #[test]
    fn test_sign_sets_kid_and_alg() {
        let keypair = TestKeypair::rsa_primary("primary-1");

        let token = keypair.sign(&json!({ "sub": "s", "exp": 4_000_000_000_i64 }));
        let header = jsonwebtoken::decode_header(&token).unwrap();

        assert_eq!(header.kid.as_deref(), Some("primary-1"));
        assert_eq!(header.alg, Algorithm::RS256);
    }
}
