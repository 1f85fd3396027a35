//! JWKS Authorizer Library
//!
//! Decides whether an inbound API request may proceed by verifying its
//! Bearer JWT against the identity provider's published key set, and
//! renders the decision as an API gateway policy document.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> authorizer.rs -> auth/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token decoding, discovery, key set cache, key selection, verification
//! - `authorizer` - The decider turning a request into a decision
//! - `config` - Configuration from environment
//! - `errors` - Deny reasons and the fatal outcome
//! - `handlers` - HTTP request handlers
//! - `models` - Request, decision and policy document
//! - `observability` - Metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod authorizer;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod routes;
