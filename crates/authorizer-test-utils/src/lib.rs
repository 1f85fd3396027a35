//! # Authorizer Test Utilities
//!
//! Shared test utilities for the JWKS authorizer.
//!
//! This crate provides:
//! - Fixed signing keys with self-signed certificates (RSA, rotated RSA, EC P-256)
//! - Token claim builders and signature tampering
//! - A wiremock identity provider serving discovery and JWKS documents
//! - Server test harness (TestAuthorizerServer for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use authorizer_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let keypair = TestKeypair::rsa_primary("key-1");
//!     let idp = MockIdentityProvider::start().await;
//!     idp.mount_key_set(&[&keypair]).await;
//!
//!     let server = TestAuthorizerServer::spawn(&idp.discovery_url()).await?;
//!     let token = keypair.sign(&TestClaims::valid());
//!     let policy = server.authorize(Some(&format!("Bearer {token}"))).await?;
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod identity_provider;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use identity_provider::*;
pub use server_harness::*;
pub use token_builders::*;
