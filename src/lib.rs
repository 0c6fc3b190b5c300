//! Herakles Process Exporter Library
//!
//! This library contains the collection pipeline of the exporter: it selects
//! processes by short command name, reads their CPU, memory and I/O counters
//! (optionally per thread), labels them with a daemon name and maps the
//! result onto a fixed Prometheus metric schema.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use herakles_process_exporter::process::{DaemonClassifier, MatchSpec, ProcFs, PAGE_SIZE};
//! use herakles_process_exporter::scrape::{NoMatchPolicy, ScrapeOptions, Scraper};
//!
//! let scraper = Scraper::new(
//!     Arc::new(ProcFs::detect(None)),
//!     DaemonClassifier::system(),
//!     MatchSpec::from_comma_lists("ceph-osd,haproxy", "ceph-osd"),
//!     ScrapeOptions {
//!         no_match: NoMatchPolicy::Continue,
//!         page_size: *PAGE_SIZE,
//!         parallelism: 0,
//!     },
//! )
//! .expect("thread pool");
//!
//! let result = scraper.run().expect("process table readable");
//! for record in result.records() {
//!     println!("{} {:?} {} {}", record.pid, record.tid, record.comm, record.daemon);
//! }
//! ```

pub mod metrics;
pub mod process;
pub mod scrape;

// Re-export main types for convenience
pub use metrics::{emit, MetricKind, MetricSample, ProcMetric, ProcessMetrics};
pub use process::{DaemonClassifier, MatchSpec, ProcFs, ProcSource, ProcessRecord};
pub use scrape::{NoMatchPolicy, ScrapeError, ScrapeOptions, ScrapeResult, Scraper};
