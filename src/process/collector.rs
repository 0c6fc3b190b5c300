//! Per-process data gathering.
//!
//! Reads counters for one matched process, labels it with its daemon name and
//! optionally expands it into per-thread records. Processes exit all the time
//! while a scrape is running, so every read failure degrades to a missing
//! field or a missing record instead of an error.

use tracing::{debug, warn};

use crate::process::classifier::DaemonClassifier;
use crate::process::record::ProcessRecord;
use crate::process::scanner::ProcMatch;
use crate::process::source::ProcSource;

/// Everything a collection unit needs, shared read-only by all units.
#[derive(Clone, Copy)]
pub struct CollectContext<'a> {
    pub source: &'a dyn ProcSource,
    pub classifier: &'a DaemonClassifier,
    /// Bytes per page, used to convert the resident set size.
    pub page_size: u64,
}

impl CollectContext<'_> {
    /// Collects the process record followed by its thread records (if requested).
    ///
    /// Returns an empty list when the process has exited.
    pub fn collect(&self, m: &ProcMatch) -> Vec<ProcessRecord> {
        let pid = m.pid;

        let stat = match self.source.stat(pid) {
            Ok(s) => s,
            Err(e) if e.is_vanished() => {
                debug!("pid {} ({}) exited before stat, skipping", pid, m.comm);
                return Vec::new();
            }
            Err(e) => {
                warn!("pid {} ({}): stat unreadable, skipping: {}", pid, m.comm, e);
                return Vec::new();
            }
        };

        let cmdline = self.source.cmdline(pid).unwrap_or_else(|e| {
            debug!("pid {}: cmdline unavailable: {}", pid, e);
            Vec::new()
        });

        let io = self
            .source
            .io(pid)
            .map_err(|e| debug!("pid {}: io unavailable: {}", pid, e))
            .ok();

        let daemon = self.classifier.classify(&cmdline);

        let record = ProcessRecord {
            pid,
            tid: None,
            comm: m.comm.clone(),
            cmdline,
            daemon,
            num_threads: stat.num_threads,
            stime: stat.stime,
            utime: stat.utime,
            rss_bytes: stat.rss_pages.saturating_mul(self.page_size),
            vsize_bytes: stat.vsize,
            io,
        };

        if !m.want_threads {
            return vec![record];
        }

        let threads = self.collect_threads(&record);
        debug!("pid {} has {} threads", pid, threads.len());

        let mut records = Vec::with_capacity(1 + threads.len());
        records.push(record);
        records.extend(threads);
        records
    }

    fn collect_threads(&self, parent: &ProcessRecord) -> Vec<ProcessRecord> {
        let pid = parent.pid;
        let tids = match self.source.list_threads(pid) {
            Ok(t) => t,
            Err(e) => {
                warn!("Unable to fetch threads for pid {}: {}", pid, e);
                return Vec::new();
            }
        };

        tids.into_iter()
            .filter_map(|tid| {
                let stat = match self.source.thread_stat(pid, tid) {
                    Ok(s) => s,
                    Err(e) => {
                        debug!("pid {} tid {}: stat unavailable: {}", pid, tid, e);
                        return None;
                    }
                };
                let comm = self.source.thread_comm(pid, tid).unwrap_or(stat.comm);
                Some(ProcessRecord::thread(parent, tid, comm, stat.utime, stat.stime))
            })
            .collect()
    }
}
