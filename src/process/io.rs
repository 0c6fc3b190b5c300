//! I/O accounting parser for `/proc/<pid>/io`.
//!
//! Note: reading another user's `io` file requires root or CAP_SYS_PTRACE.

use std::fs;
use std::path::Path;

use crate::process::source::ProcError;

/// Cumulative I/O counters of a process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcIo {
    /// Number of read syscalls issued.
    pub syscr: u64,
    /// Number of write syscalls issued.
    pub syscw: u64,
    /// Bytes actually fetched from the storage layer.
    pub read_bytes: u64,
    /// Bytes sent to the storage layer.
    pub write_bytes: u64,
}

/// Parses the contents of an `io` file. Unknown keys are ignored.
pub fn parse_io(content: &str) -> ProcIo {
    let mut io = ProcIo::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value: u64 = value.trim().parse().unwrap_or(0);
        match key.trim() {
            "syscr" => io.syscr = value,
            "syscw" => io.syscw = value,
            "read_bytes" => io.read_bytes = value,
            "write_bytes" => io.write_bytes = value,
            _ => {}
        }
    }
    io
}

/// Reads I/O statistics from a process directory.
pub fn read_io(dir: &Path) -> Result<ProcIo, ProcError> {
    let content = fs::read_to_string(dir.join("io"))?;
    Ok(parse_io(&content))
}
