//! Startup requirement validation for herakles-process-exporter.
//!
//! This module validates that the exporter can enumerate the process table
//! and warns when missing privileges will hide counters of other users'
//! processes.

use herakles_process_exporter::process::{ProcError, ProcFs, ProcSource};
use herakles_process_exporter::scrape::EXIT_PROC_UNAVAILABLE;
use nix::unistd::geteuid;
use std::fs;
use tracing::{debug, error, info, warn};

/// Validate all runtime requirements
pub fn validate_requirements(source: &ProcFs) -> Result<usize, ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    let count = check_proc_table(source)?;
    check_io_access(source);

    info!("✅ All runtime requirements validated");
    Ok(count)
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - I/O counters of other users' processes will be omitted");
        warn!("   Recommendation: Run as root or grant cap_dac_read_search,cap_sys_ptrace");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

/// The process table must be enumerable; everything else degrades per process.
fn check_proc_table(source: &ProcFs) -> Result<usize, ValidationError> {
    match source.list_pids() {
        Ok(pids) => {
            info!(
                "✅ {}: {} processes visible",
                source.root().display(),
                pids.len()
            );
            Ok(pids.len())
        }
        Err(e) => {
            error!("❌ Cannot enumerate processes in {}: {}", source.root().display(), e);
            error!("   Solution: mount procfs or point --proc-root at the host's /proc");
            Err(ValidationError::ProcUnavailable(e))
        }
    }
}

/// Reads `/proc/1/io`, which needs ptrace access to a foreign process.
fn check_io_access(source: &ProcFs) {
    let test_file = source.root().join("1").join("io");

    match fs::read(&test_file) {
        Ok(_) => info!("✅ {} readable: I/O counters available", test_file.display()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            warn!(
                "⚠️  Cannot read {} - I/O counters of foreign processes will be omitted",
                test_file.display()
            );
        }
        Err(e) => debug!("Could not read {}: {}", test_file.display(), e),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("process table unavailable: {0}")]
    ProcUnavailable(#[source] ProcError),
}

impl ValidationError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidationError::ProcUnavailable(_) => EXIT_PROC_UNAVAILABLE,
        }
    }
}
