//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs one complete scrape of the process table, replaces the
//! exported series with the result and returns the registry in Prometheus
//! text format. A scrape that hits a fatal condition (process table gone,
//! empty match in abort mode) terminates the exporter, even when the request
//! that started it already timed out.
//!
//! Scrapes are serialized by `scrape_lock`. The guard travels into the
//! blocking task, so a scrape abandoned by a timed-out request keeps the
//! lock until it really returns.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use herakles_process_exporter::{emit, ScrapeError, ScrapeResult};
use prometheus::{Encoder, TextEncoder, TEXT_FORMAT};
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::state::{AppState, SharedState};

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
    /// The scrape did not finish within the configured timeout.
    Timeout,
    /// The blocking scrape task panicked or was cancelled.
    TaskFailed,
    /// Unrecoverable scrape failure; the exporter exits with its code.
    Fatal(ScrapeError),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        match self {
            MetricsError::Timeout => {
                (StatusCode::SERVICE_UNAVAILABLE, "Scrape timed out").into_response()
            }
            MetricsError::EncodingFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
            }
            MetricsError::TaskFailed | MetricsError::Fatal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Scrape failed").into_response()
            }
        }
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    match render_metrics(&state).await {
        Ok(body) => Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body)),
        Err(MetricsError::Fatal(e)) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
        Err(e) => Err(e),
    }
}

/// Waits for a scrape whose request timed out. Its result is discarded, but
/// a fatal error still terminates the exporter.
async fn watch_abandoned(
    task: JoinHandle<(Result<ScrapeResult, ScrapeError>, OwnedMutexGuard<()>)>,
) {
    match task.await {
        Ok((Err(e), _guard)) => {
            error!("Abandoned scrape failed: {}", e);
            std::process::exit(e.exit_code());
        }
        Ok((Ok(result), _guard)) => debug!(
            "Abandoned scrape finished late with {} records",
            result.len()
        ),
        Err(e) => error!("Abandoned scrape task failed: {}", e),
    }
}

/// Runs one scrape, publishes it and encodes the registry.
pub async fn render_metrics(state: &AppState) -> Result<String, MetricsError> {
    let guard = state.scrape_lock.clone().lock_owned().await;
    let start = Instant::now();
    debug!("Processing /metrics request");

    let scraper = state.scraper.clone();
    let mut task = tokio::task::spawn_blocking(move || (scraper.run(), guard));

    // The guard comes back with the result and covers publish and encode.
    let outcome = tokio::time::timeout(state.scrape_timeout, &mut task).await;
    let (result, _guard) = match outcome {
        Err(_) => {
            warn!(
                "Scrape did not finish within {:?}, answering 503",
                state.scrape_timeout
            );
            tokio::spawn(watch_abandoned(task));
            return Err(MetricsError::Timeout);
        }
        Ok(Err(e)) => {
            error!("Scrape task failed: {}", e);
            return Err(MetricsError::TaskFailed);
        }
        Ok(Ok((Err(e), _))) => return Err(MetricsError::Fatal(e)),
        Ok(Ok((Ok(result), guard))) => (result, guard),
    };

    let samples = emit(&result, &state.prefix, state.clk_tck);
    state.metrics.publish(&samples);
    state
        .metrics
        .matched_processes
        .set(result.process_count() as f64);
    state
        .metrics
        .scrape_duration
        .set(start.elapsed().as_secs_f64());

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    debug!(
        "Metrics request completed: {} processes, {} records, {} bytes, {:?}",
        result.process_count(),
        result.len(),
        buffer.len(),
        start.elapsed()
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}
