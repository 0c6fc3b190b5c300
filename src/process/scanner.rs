//! Process discovery and name filtering.
//!
//! The scanner walks the whole process table but only reads each process's
//! short command name; everything else is left to the collector so that
//! non-matching processes cost a single small read.

use ahash::AHashSet as HashSet;
use thiserror::Error;
use tracing::{debug, warn};

use crate::process::source::{ProcError, ProcSource};

/// Process names to match, and the subset that also gets per-thread detail.
#[derive(Debug, Clone, Default)]
pub struct MatchSpec {
    filter: HashSet<String>,
    threads: HashSet<String>,
}

impl MatchSpec {
    /// Builds a spec from name lists. Names are trimmed and empty entries
    /// dropped; thread names not present in the filter are ignored.
    pub fn new<I, J, S, T>(filter: I, threads: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let filter: HashSet<String> = filter
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let mut thread_set = HashSet::new();
        for name in threads {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if filter.contains(name) {
                thread_set.insert(name.to_string());
            } else {
                warn!(
                    "Thread expansion requested for '{}' which is not in the filter - ignored",
                    name
                );
            }
        }

        Self {
            filter,
            threads: thread_set,
        }
    }

    /// Parses comma-separated name lists as given on the command line.
    pub fn from_comma_lists(filter: &str, threads: &str) -> Self {
        Self::new(filter.split(','), threads.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
    }

    /// `Some(want_threads)` if the name matches the filter.
    pub fn lookup(&self, comm: &str) -> Option<bool> {
        self.filter
            .contains(comm)
            .then(|| self.threads.contains(comm))
    }

    /// Filter names in sorted order, for logging.
    pub fn filter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filter.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn thread_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.threads.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A process selected by the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcMatch {
    pub pid: u32,
    pub comm: String,
    pub want_threads: bool,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot enumerate process table: {0}")]
    Enumerate(#[source] ProcError),
}

/// Enumerates all processes and returns those whose short name matches.
pub fn scan(source: &dyn ProcSource, spec: &MatchSpec) -> Result<Vec<ProcMatch>, ScanError> {
    let pids = source.list_pids().map_err(ScanError::Enumerate)?;
    debug!("procfs has {} pids", pids.len());

    let mut matches = Vec::new();
    for pid in pids {
        let comm = match source.comm(pid) {
            Ok(c) => c,
            Err(e) => {
                debug!("Skipping pid {}: cannot read comm: {}", pid, e);
                continue;
            }
        };
        if let Some(want_threads) = spec.lookup(&comm) {
            matches.push(ProcMatch {
                pid,
                comm,
                want_threads,
            });
        }
    }
    Ok(matches)
}
