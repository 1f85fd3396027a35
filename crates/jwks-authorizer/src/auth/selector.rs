//! Signing key selection and certificate extraction.

use crate::auth::jwks::{CertificateChain, KeySet};
use thiserror::Error;

/// PEM header for an X.509 certificate.
pub const PEM_CERTIFICATE_BEGIN: &str = "-----BEGIN CERTIFICATE-----";

/// PEM footer for an X.509 certificate.
pub const PEM_CERTIFICATE_END: &str = "-----END CERTIFICATE-----";

/// Errors selecting a key from the key set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeySelectionError {
    /// No key matches both the token's `kid` and `alg`.
    #[error("no signing key matches kid '{kid}' and algorithm '{alg}'")]
    UnknownKey { kid: String, alg: String },

    /// The matching key has no usable `x5c` certificate.
    #[error("key '{kid}' has no usable x5c certificate")]
    InvalidKeyEntry { kid: String },
}

/// Select the signing key for (`key_id`, `algorithm`) and return its certificate as PEM.
///
/// Both fields must match exactly (case-sensitive). When the key set holds
/// duplicates the first one in published order wins. When the entry carries a
/// certificate chain, only the leaf (first element) is used.
///
/// # Errors
///
/// - [`KeySelectionError::UnknownKey`] if no entry matches
/// - [`KeySelectionError::InvalidKeyEntry`] if the entry's `x5c` is missing or
///   is neither a populated list nor a string
pub fn select(
    key_set: &KeySet,
    key_id: &str,
    algorithm: &str,
) -> Result<String, KeySelectionError> {
    let entry = key_set
        .keys
        .iter()
        .find(|key| key.kid.as_deref() == Some(key_id) && key.alg.as_deref() == Some(algorithm))
        .ok_or_else(|| {
            tracing::warn!(
                target: "authorizer.selector",
                kid = %key_id,
                alg = %algorithm,
                "Unable to find a signing key that matches kid and algorithm"
            );
            KeySelectionError::UnknownKey {
                kid: key_id.to_string(),
                alg: algorithm.to_string(),
            }
        })?;

    let invalid_entry = || KeySelectionError::InvalidKeyEntry {
        kid: key_id.to_string(),
    };

    let certificate = match &entry.x5c {
        CertificateChain::List(chain) => {
            if chain.len() > 1 {
                tracing::info!(
                    target: "authorizer.selector",
                    kid = %key_id,
                    chain_length = chain.len(),
                    "Found multiple x5c entries, using the first one"
                );
            }
            chain.first().ok_or_else(invalid_entry)?
        }
        CertificateChain::Scalar(certificate) => certificate,
        CertificateChain::Absent | CertificateChain::Invalid => {
            tracing::warn!(
                target: "authorizer.selector",
                kid = %key_id,
                "Unable to find x5c in key entry"
            );
            return Err(invalid_entry());
        }
    };

    Ok(wrap_certificate_pem(certificate))
}

/// Wrap a base64 DER certificate in PEM delimiters.
pub fn wrap_certificate_pem(certificate: &str) -> String {
    format!("{PEM_CERTIFICATE_BEGIN}\n{certificate}\n{PEM_CERTIFICATE_END}\n")
}

/// Extract the base64 body from a certificate PEM produced by [`wrap_certificate_pem`].
///
/// Returns `None` if the delimiters are missing.
pub fn certificate_body(pem: &str) -> Option<&str> {
    pem.trim()
        .strip_prefix(PEM_CERTIFICATE_BEGIN)?
        .strip_suffix(PEM_CERTIFICATE_END)
        .map(str::trim)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::KeyEntry;

    fn entry(kid: &str, alg: &str, x5c: CertificateChain) -> KeyEntry {
        KeyEntry {
            kid: Some(kid.to_string()),
            alg: Some(alg.to_string()),
            kty: Some("RSA".to_string()),
            key_use: Some("sig".to_string()),
            x5c,
        }
    }

    fn list(certs: &[&str]) -> CertificateChain {
        CertificateChain::List(certs.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn test_select_list_certificate() {
        let key_set = KeySet {
            keys: vec![entry("k1", "RS256", list(&["MIIC-one"]))],
        };

        let pem = select(&key_set, "k1", "RS256").unwrap();

        assert_eq!(
            pem,
            "-----BEGIN CERTIFICATE-----\nMIIC-one\n-----END CERTIFICATE-----\n"
        );
    }

    #[test]
    fn test_select_scalar_certificate() {
        let key_set = KeySet {
            keys: vec![entry(
                "k1",
                "RS256",
                CertificateChain::Scalar("MIIC-scalar".to_string()),
            )],
        };

        let pem = select(&key_set, "k1", "RS256").unwrap();
        assert_eq!(certificate_body(&pem), Some("MIIC-scalar"));
    }

    #[test]
    fn test_select_uses_first_of_chain() {
        let key_set = KeySet {
            keys: vec![entry("k1", "RS256", list(&["leaf", "intermediate", "root"]))],
        };

        let pem = select(&key_set, "k1", "RS256").unwrap();
        assert_eq!(certificate_body(&pem), Some("leaf"));
    }

    #[test]
    fn test_select_first_duplicate_wins() {
        let key_set = KeySet {
            keys: vec![
                entry("k1", "RS256", list(&["first"])),
                entry("k1", "RS256", list(&["second"])),
            ],
        };

        for _ in 0..3 {
            let pem = select(&key_set, "k1", "RS256").unwrap();
            assert_eq!(certificate_body(&pem), Some("first"));
        }
    }

    #[test]
    fn test_select_requires_both_kid_and_alg() {
        let key_set = KeySet {
            keys: vec![
                entry("k1", "RS384", list(&["wrong-alg"])),
                entry("k2", "RS256", list(&["wrong-kid"])),
                entry("k1", "RS256", list(&["match"])),
            ],
        };

        let pem = select(&key_set, "k1", "RS256").unwrap();
        assert_eq!(certificate_body(&pem), Some("match"));
    }

    #[test]
    fn test_select_is_case_sensitive() {
        let key_set = KeySet {
            keys: vec![entry("Key-1", "RS256", list(&["cert"]))],
        };

        assert!(matches!(
            select(&key_set, "key-1", "RS256"),
            Err(KeySelectionError::UnknownKey { .. })
        ));
        assert!(matches!(
            select(&key_set, "Key-1", "rs256"),
            Err(KeySelectionError::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_select_unknown_key() {
        let key_set = KeySet {
            keys: vec![entry("k1", "RS256", list(&["cert"]))],
        };

        let err = select(&key_set, "missing", "RS256").unwrap_err();
        assert_eq!(
            err,
            KeySelectionError::UnknownKey {
                kid: "missing".to_string(),
                alg: "RS256".to_string()
            }
        );
    }

    #[test]
    fn test_select_empty_key_set() {
        let err = select(&KeySet::default(), "k1", "RS256").unwrap_err();
        assert!(matches!(err, KeySelectionError::UnknownKey { .. }));
    }

    #[test]
    fn test_entry_without_kid_never_matches() {
        let mut anonymous = entry("k1", "RS256", list(&["cert"]));
        anonymous.kid = None;
        let key_set = KeySet {
            keys: vec![anonymous],
        };

        assert!(select(&key_set, "k1", "RS256").is_err());
    }

    #[test]
    fn test_select_absent_certificate() {
        let key_set = KeySet {
            keys: vec![entry("k1", "RS256", CertificateChain::Absent)],
        };

        let err = select(&key_set, "k1", "RS256").unwrap_err();
        assert_eq!(
            err,
            KeySelectionError::InvalidKeyEntry {
                kid: "k1".to_string()
            }
        );
    }

    #[test]
    fn test_select_invalid_certificate_shape() {
        let key_set = KeySet {
            keys: vec![entry("k1", "RS256", CertificateChain::Invalid)],
        };

        let err = select(&key_set, "k1", "RS256").unwrap_err();
        assert!(matches!(err, KeySelectionError::InvalidKeyEntry { .. }));
    }

    #[test]
    fn test_pem_round_trip() {
        let cert = "MIIDBTCCAe2gAwIBAgIUY2VydGlmaWNhdGUtYm9keQ==";

        let from_list = KeySet {
            keys: vec![entry("k1", "RS256", list(&[cert]))],
        };
        let from_scalar = KeySet {
            keys: vec![entry(
                "k1",
                "RS256",
                CertificateChain::Scalar(cert.to_string()),
            )],
        };

        let list_pem = select(&from_list, "k1", "RS256").unwrap();
        let scalar_pem = select(&from_scalar, "k1", "RS256").unwrap();

        assert_eq!(certificate_body(&list_pem), Some(cert));
        assert_eq!(certificate_body(&scalar_pem), Some(cert));
        assert_eq!(list_pem, scalar_pem);
    }

    #[test]
    fn test_certificate_body_rejects_missing_delimiters() {
        assert_eq!(certificate_body("MIIC"), None);
        assert_eq!(certificate_body("-----BEGIN CERTIFICATE-----\nMIIC"), None);
    }
}
