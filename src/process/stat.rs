//! Parsing of `/proc/<pid>/stat` and host constants needed to interpret it.
//!
//! CPU times in `stat` are expressed in clock ticks and the resident set size
//! in pages, so both [`CLK_TCK`] and [`PAGE_SIZE`] are read once from the host.

use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;

use crate::process::source::ProcError;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as u64;
            }
        }
    }
    100
}

/// Get the memory page size in bytes (usually 4096).
fn get_page_size() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_PAGESIZE
        unsafe {
            let size = libc::sysconf(libc::_SC_PAGESIZE);
            if size > 0 {
                return size as u64;
            }
        }
    }
    4096
}

/// System clock ticks per second (for CPU time conversion).
pub static CLK_TCK: Lazy<u64> = Lazy::new(get_clk_tck);

/// System page size in bytes (for RSS conversion).
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Fields of interest from a process or thread `stat` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcStat {
    pub comm: String,
    /// Time spent in user mode, in clock ticks.
    pub utime: u64,
    /// Time spent in kernel mode, in clock ticks.
    pub stime: u64,
    pub num_threads: u64,
    /// Virtual memory size in bytes.
    pub vsize: u64,
    /// Resident set size in pages.
    pub rss_pages: u64,
}

// Offsets counted from the first field after the closing ')' of comm.
const UTIME: usize = 11;
const STIME: usize = 12;
const NUM_THREADS: usize = 17;
const VSIZE: usize = 20;
const RSS: usize = 21;

/// Parses the contents of a `stat` file.
///
/// The command name may itself contain spaces and parentheses, so the
/// numeric fields are located after the *last* closing parenthesis.
pub fn parse_stat(content: &str) -> Result<ProcStat, ProcError> {
    let open = content
        .find('(')
        .ok_or_else(|| ProcError::Parse("stat: missing '('".into()))?;
    let close = content
        .rfind(')')
        .ok_or_else(|| ProcError::Parse("stat: missing ')'".into()))?;
    if close < open {
        return Err(ProcError::Parse("stat: malformed comm".into()));
    }

    let comm = content[open + 1..close].to_string();
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if fields.len() <= RSS {
        return Err(ProcError::Parse(format!(
            "stat: expected more than {} fields, got {}",
            RSS,
            fields.len()
        )));
    }

    let field = |idx: usize| -> Result<u64, ProcError> {
        fields[idx]
            .parse::<u64>()
            .map_err(|e| ProcError::Parse(format!("stat field {}: {}", idx, e)))
    };

    // rss is signed in the kernel ABI; a negative value means "unknown".
    let rss_pages = fields[RSS].parse::<i64>().unwrap_or(0).max(0) as u64;

    Ok(ProcStat {
        comm,
        utime: field(UTIME)?,
        stime: field(STIME)?,
        num_threads: field(NUM_THREADS)?,
        vsize: field(VSIZE)?,
        rss_pages,
    })
}

/// Reads and parses a `stat` file from a process or task directory.
pub fn read_stat(dir: &Path) -> Result<ProcStat, ProcError> {
    let content = fs::read_to_string(dir.join("stat"))?;
    parse_stat(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const NGINX_STAT: &str = "1234 (nginx) S 1 1234 1234 0 -1 4194304 100 0 0 0 1000 500 0 0 20 0 4 0 12345 12345678 1234 18446744073709551615 4194304 4238788 140736466511168 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0";

    // -------------------------------------------------------------------------
    // Tests for parse_stat
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_stat_fields() {
        let stat = parse_stat(NGINX_STAT).expect("valid stat");
        assert_eq!(stat.comm, "nginx");
        assert_eq!(stat.utime, 1000);
        assert_eq!(stat.stime, 500);
        assert_eq!(stat.num_threads, 4);
        assert_eq!(stat.vsize, 12345678);
        assert_eq!(stat.rss_pages, 1234);
    }

    #[test]
    fn test_parse_stat_comm_with_spaces_and_parens() {
        let content = "77 (tp (worker) 1) R 1 77 77 0 -1 0 0 0 0 0 7 3 0 0 20 0 1 0 1 4096 2 0";
        let stat = parse_stat(content).expect("valid stat");
        assert_eq!(stat.comm, "tp (worker) 1");
        assert_eq!(stat.utime, 7);
        assert_eq!(stat.stime, 3);
        assert_eq!(stat.vsize, 4096);
        assert_eq!(stat.rss_pages, 2);
    }

    #[test]
    fn test_parse_stat_too_short() {
        assert!(parse_stat("1234 (test) S 1 2 3").is_err());
        assert!(parse_stat("garbage").is_err());
    }

    #[test]
    fn test_parse_stat_negative_rss() {
        let content = "9 (z) Z 1 9 9 0 -1 0 0 0 0 0 0 0 0 0 20 0 1 0 1 0 -1 0";
        let stat = parse_stat(content).expect("valid stat");
        assert_eq!(stat.rss_pages, 0);
    }

    // -------------------------------------------------------------------------
    // Tests for read_stat
    // -------------------------------------------------------------------------

    #[test]
    fn test_read_stat_from_dir() {
        let dir = tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("stat"), NGINX_STAT).expect("Failed to write stat file");

        let stat = read_stat(dir.path()).expect("stat should parse");
        assert_eq!(stat.utime + stat.stime, 1500);
    }

    #[test]
    fn test_read_stat_missing_file_is_vanished() {
        let dir = tempdir().expect("Failed to create temp dir");
        let err = read_stat(dir.path()).unwrap_err();
        assert!(err.is_vanished(), "unexpected error: {err}");
    }

    #[test]
    fn test_host_constants_positive() {
        assert!(*CLK_TCK > 0);
        assert!(*PAGE_SIZE >= 1024);
    }
}
