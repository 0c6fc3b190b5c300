//! Process table access.
//!
//! [`ProcSource`] is the boundary between the collection pipeline and the
//! operating system. [`ProcFs`] implements it on top of a procfs mount; tests
//! point it at a temporary directory laid out like `/proc`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::process::io::{read_io, ProcIo};
use crate::process::stat::{read_stat, ProcStat};

/// Procfs location used when the host's `/proc` is bind-mounted into a container.
pub const HOST_PROC_ROOT: &str = "/host/proc";
/// Default procfs location.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Errors returned by per-process reads.
#[derive(Debug, Error)]
pub enum ProcError {
    /// The process (or thread) exited between enumeration and read.
    #[error("process vanished")]
    Vanished,

    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

impl ProcError {
    /// True if the error only means the entity is gone.
    pub fn is_vanished(&self) -> bool {
        matches!(self, ProcError::Vanished)
    }
}

impl From<io::Error> for ProcError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(libc::ESRCH) {
            ProcError::Vanished
        } else {
            ProcError::Io(e)
        }
    }
}

/// Read access to the OS process table.
pub trait ProcSource: Send + Sync {
    /// Lists every process id visible to the source.
    fn list_pids(&self) -> Result<Vec<u32>, ProcError>;

    /// Short command name (`comm`) of a process.
    fn comm(&self, pid: u32) -> Result<String, ProcError>;

    /// Full command line of a process; empty for kernel threads and zombies.
    fn cmdline(&self, pid: u32) -> Result<Vec<String>, ProcError>;

    fn stat(&self, pid: u32) -> Result<ProcStat, ProcError>;

    fn io(&self, pid: u32) -> Result<ProcIo, ProcError>;

    /// Lists the thread ids of a process (including the main thread).
    fn list_threads(&self, pid: u32) -> Result<Vec<u32>, ProcError>;

    fn thread_comm(&self, pid: u32, tid: u32) -> Result<String, ProcError>;

    fn thread_stat(&self, pid: u32, tid: u32) -> Result<ProcStat, ProcError>;
}

/// Procfs-backed process source.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Picks the procfs root: an explicit path wins, then `/host/proc` if it
    /// exists, then `/proc`.
    pub fn detect(explicit: Option<&Path>) -> Self {
        let root = match explicit {
            Some(p) => p.to_path_buf(),
            None if Path::new(HOST_PROC_ROOT).exists() => PathBuf::from(HOST_PROC_ROOT),
            None => PathBuf::from(DEFAULT_PROC_ROOT),
        };
        debug!("Using proc filesystem at {}", root.display());
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pid_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn task_dir(&self, pid: u32, tid: u32) -> PathBuf {
        self.pid_dir(pid).join("task").join(tid.to_string())
    }
}

/// Lists the numeric entries of a directory, ignoring everything else.
fn numeric_entries(dir: &Path) -> io::Result<Vec<u32>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)?.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if let Ok(id) = name.parse::<u32>() {
            out.push(id);
        }
    }
    out.sort_unstable();
    Ok(out)
}

fn read_comm(dir: &Path) -> Result<String, ProcError> {
    let s = fs::read_to_string(dir.join("comm"))?;
    Ok(s.trim_end_matches('\n').to_string())
}

/// Splits a NUL-separated `cmdline` buffer into its arguments.
pub fn parse_cmdline(content: &[u8]) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    let content = content.strip_suffix(&[0u8]).unwrap_or(content);
    content
        .split(|&b| b == 0u8)
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

impl ProcSource for ProcFs {
    fn list_pids(&self) -> Result<Vec<u32>, ProcError> {
        // A missing root is not a vanished process; keep the raw I/O error.
        numeric_entries(&self.root).map_err(ProcError::Io)
    }

    fn comm(&self, pid: u32) -> Result<String, ProcError> {
        read_comm(&self.pid_dir(pid))
    }

    fn cmdline(&self, pid: u32) -> Result<Vec<String>, ProcError> {
        let content = fs::read(self.pid_dir(pid).join("cmdline"))?;
        Ok(parse_cmdline(&content))
    }

    fn stat(&self, pid: u32) -> Result<ProcStat, ProcError> {
        read_stat(&self.pid_dir(pid))
    }

    fn io(&self, pid: u32) -> Result<ProcIo, ProcError> {
        read_io(&self.pid_dir(pid))
    }

    fn list_threads(&self, pid: u32) -> Result<Vec<u32>, ProcError> {
        Ok(numeric_entries(&self.pid_dir(pid).join("task"))?)
    }

    fn thread_comm(&self, pid: u32, tid: u32) -> Result<String, ProcError> {
        read_comm(&self.task_dir(pid, tid))
    }

    fn thread_stat(&self, pid: u32, tid: u32) -> Result<ProcStat, ProcError> {
        read_stat(&self.task_dir(pid, tid))
    }
}
