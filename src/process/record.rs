//! Per-scrape process and thread records.

use crate::process::io::ProcIo;

/// One row of scrape output: a whole process (`tid == None`) or one of its
/// threads (`tid == Some(_)`).
///
/// Thread records only carry identity and CPU times; every other counter is
/// zero (or `None`) because procfs does not expose it per thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub tid: Option<u32>,
    /// Short command name (`comm`) of the process or thread.
    pub comm: String,
    /// Full command line; always empty for thread records.
    pub cmdline: Vec<String>,
    pub daemon: String,
    pub num_threads: u64,
    /// Kernel-mode CPU time in clock ticks.
    pub stime: u64,
    /// User-mode CPU time in clock ticks.
    pub utime: u64,
    pub rss_bytes: u64,
    pub vsize_bytes: u64,
    /// I/O counters; `None` when the `io` file could not be read.
    pub io: Option<ProcIo>,
}

impl ProcessRecord {
    pub fn is_thread(&self) -> bool {
        self.tid.is_some()
    }

    /// Builds a thread record that inherits identity from its process.
    pub fn thread(parent: &ProcessRecord, tid: u32, comm: String, utime: u64, stime: u64) -> Self {
        Self {
            pid: parent.pid,
            tid: Some(tid),
            comm,
            daemon: parent.daemon.clone(),
            utime,
            stime,
            ..Self::default()
        }
    }
}
