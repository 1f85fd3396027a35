//! Observability for the authorizer.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
