//! Token authentication against the identity provider's JWKS.
//!
//! # Components
//!
//! - `token` - Decodes the token header (`alg`, `kid`) without verification
//! - `discovery` - Resolves `jwks_uri` from the discovery document and fetches the key set
//! - `jwks` - Key set model and the time-bounded key set cache
//! - `selector` - Picks the (kid, alg) key and extracts its certificate as PEM
//! - `verifier` - Verifies signature and claims with a single pinned algorithm

pub mod discovery;
pub mod jwks;
pub mod selector;
pub mod token;
pub mod verifier;

pub use discovery::{DiscoveryClient, DiscoveryError, FetchError, HttpJsonFetcher, JsonFetcher};
pub use jwks::{KeyFetchError, KeySet, KeySetCache, KEY_SET_TTL};
pub use selector::KeySelectionError;
pub use token::DecodeError;
pub use verifier::{ClaimPolicy, InvalidSignature, TokenVerifier, VerificationFailure};
