//! Middleware for `axum::Router`.
//!
//! - Observability: request ids, tracing spans, request latency logs
//! - Recovery: panics, request timeouts and service errors

mod observability;
mod recovery;

pub use observability::{RouterObservabilityExt, track_request_latency};
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
