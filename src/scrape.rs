//! Scrape orchestration.
//!
//! One scrape scans the process table, collects every matched process on a
//! bounded rayon pool and returns the records grouped per process. No state is
//! carried from one scrape to the next.

use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::process::{
    scan, CollectContext, DaemonClassifier, MatchSpec, ProcSource, ProcessRecord, ScanError,
};

/// Exit status when the process table cannot be enumerated.
pub const EXIT_PROC_UNAVAILABLE: i32 = 3;
/// Exit status when nothing matches the filter and abort mode is on.
pub const EXIT_NO_MATCH: i32 = 4;

/// What to do when the filter matches no running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchPolicy {
    /// Treat as misconfiguration; the caller terminates the exporter.
    Abort,
    /// Log and return an empty result.
    Continue,
}

impl NoMatchPolicy {
    pub fn from_abort_flag(abort: bool) -> Self {
        if abort {
            NoMatchPolicy::Abort
        } else {
            NoMatchPolicy::Continue
        }
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("no processes match filter '{0}'")]
    NoMatch(String),
}

impl ScrapeError {
    /// Process exit status for this (fatal) error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ScrapeError::Scan(_) => EXIT_PROC_UNAVAILABLE,
            ScrapeError::NoMatch(_) => EXIT_NO_MATCH,
        }
    }
}

/// Records of one scrape, grouped per process (process record first).
#[derive(Debug, Clone, Default)]
pub struct ScrapeResult {
    groups: Vec<Vec<ProcessRecord>>,
}

impl ScrapeResult {
    pub fn new(groups: Vec<Vec<ProcessRecord>>) -> Self {
        // Vanished processes report nothing.
        let groups = groups.into_iter().filter(|g| !g.is_empty()).collect();
        Self { groups }
    }

    pub fn groups(&self) -> &[Vec<ProcessRecord>] {
        &self.groups
    }

    /// All records, flattened in group order.
    pub fn records(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.groups.iter().flatten()
    }

    /// Number of processes that produced records.
    pub fn process_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of records (process and thread).
    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Tuning knobs for a [`Scraper`].
#[derive(Debug, Clone, Copy)]
pub struct ScrapeOptions {
    pub no_match: NoMatchPolicy,
    pub page_size: u64,
    /// Upper bound on concurrent collection units (0 = number of CPUs).
    pub parallelism: usize,
}

/// Runs scrapes against a process source.
pub struct Scraper {
    source: Arc<dyn ProcSource>,
    classifier: DaemonClassifier,
    spec: MatchSpec,
    options: ScrapeOptions,
    pool: rayon::ThreadPool,
}

impl Scraper {
    pub fn new(
        source: Arc<dyn ProcSource>,
        classifier: DaemonClassifier,
        spec: MatchSpec,
        options: ScrapeOptions,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.parallelism)
            .thread_name(|i| format!("scrape-{}", i))
            .build()?;
        debug!(
            "Scrape pool configured with {} threads",
            pool.current_num_threads()
        );

        Ok(Self {
            source,
            classifier,
            spec,
            options,
            pool,
        })
    }

    pub fn spec(&self) -> &MatchSpec {
        &self.spec
    }

    /// Runs one complete scrape.
    ///
    /// Returns only once every matched process has been attempted exactly
    /// once. Per-process failures never fail the scrape; only an unreadable
    /// process table or an empty match in abort mode do.
    #[instrument(skip(self))]
    pub fn run(&self) -> Result<ScrapeResult, ScrapeError> {
        let start = Instant::now();
        let matches = scan(self.source.as_ref(), &self.spec)?;
        debug!(
            "Looking for matching procs took {:?}, found {}",
            start.elapsed(),
            matches.len()
        );

        if matches.is_empty() {
            let filter = self.spec.filter_names().join(",");
            return match self.options.no_match {
                NoMatchPolicy::Abort => Err(ScrapeError::NoMatch(filter)),
                NoMatchPolicy::Continue => {
                    warn!("No processes match filter: '{}'", filter);
                    Ok(ScrapeResult::default())
                }
            };
        }

        let ctx = CollectContext {
            source: self.source.as_ref(),
            classifier: &self.classifier,
            page_size: self.options.page_size,
        };

        let start = Instant::now();
        let groups: Vec<Vec<ProcessRecord>> = self
            .pool
            .install(|| matches.par_iter().map(|m| ctx.collect(m)).collect());
        debug!(
            "Collected {} processes in {:?}",
            groups.len(),
            start.elapsed()
        );

        Ok(ScrapeResult::new(groups))
    }
}
