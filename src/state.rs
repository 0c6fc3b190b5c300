//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to the HTTP handlers.

use herakles_process_exporter::{ProcessMetrics, Scraper};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub metrics: ProcessMetrics,
    pub scraper: Arc<Scraper>,
    /// Metric name prefix.
    pub prefix: String,
    /// Clock ticks per second used to convert CPU times.
    pub clk_tck: u64,
    /// Upper bound on one scrape.
    pub scrape_timeout: Duration,
    /// Held from scrape to encode; a timed-out request's scrape keeps it
    /// until the scrape returns.
    pub scrape_lock: Arc<Mutex<()>>,
}
