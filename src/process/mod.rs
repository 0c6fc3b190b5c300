//! Process-related modules for the collection pipeline.
//!
//! This module provides:
//! - `source`: Process table access (procfs and the `ProcSource` trait)
//! - `stat` / `io`: Parsers for `/proc/<pid>/stat` and `/proc/<pid>/io`
//! - `scanner`: Process discovery and name filtering
//! - `collector`: Per-process and per-thread counter collection
//! - `classifier`: Daemon label classification

pub mod classifier;
pub mod collector;
pub mod io;
pub mod record;
pub mod scanner;
pub mod source;
pub mod stat;

// Re-export commonly used types
pub use classifier::{DaemonClassifier, FixedHostname, HostnameSource, SystemHostname};
pub use collector::CollectContext;
pub use io::ProcIo;
pub use record::ProcessRecord;
pub use scanner::{scan, MatchSpec, ProcMatch, ScanError};
pub use source::{ProcError, ProcFs, ProcSource};
pub use stat::{ProcStat, CLK_TCK, PAGE_SIZE};
