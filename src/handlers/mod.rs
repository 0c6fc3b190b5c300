//! HTTP endpoint handlers for the exporter.
//!
//! The exporter serves a single endpoint:
//! - `/metrics`: Prometheus metrics endpoint

pub mod metrics;

// Re-export handlers
pub use metrics::metrics_handler;
