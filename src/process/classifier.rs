//! Daemon classification for metric labels.
//!
//! A command line is mapped to a daemon label by a short, ordered list of
//! rules. The first rule that produces a label wins; when none does the
//! process is unclassified and gets an empty label.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Optional system-wide extension of the built-in daemon table.
pub const SYSTEM_DAEMONS_FILE: &str = "/etc/herakles/daemons.toml";

/// Map of executable basename -> daemon type.
pub type DaemonTable = HashMap<String, String>;

#[derive(Deserialize)]
struct DaemonEntry {
    #[serde(rename = "type")]
    daemon_type: String,
    executables: Vec<String>,
}

#[derive(Deserialize)]
struct DaemonsConfig {
    daemons: Vec<DaemonEntry>,
}

/// Helper: load daemon entries from a TOML string into the table.
fn load_daemons_from_str(content: &str, table: &mut DaemonTable) -> Result<(), toml::de::Error> {
    let parsed: DaemonsConfig = toml::from_str(content)?;
    for entry in parsed.daemons {
        for exe in entry.executables {
            table.insert(exe, entry.daemon_type.clone());
        }
    }
    Ok(())
}

/// Helper: load daemon entries from a TOML file (if it exists).
fn load_daemons_from_file(path: &str, table: &mut DaemonTable) {
    let p = Path::new(path);
    if !p.exists() {
        return;
    }
    match fs::read_to_string(p) {
        Ok(content) => match load_daemons_from_str(&content, table) {
            Ok(()) => debug!("Loaded additional daemon definitions from {}", path),
            Err(e) => warn!("Failed to parse daemon definitions {}: {}", path, e),
        },
        Err(e) => warn!("Failed to read daemon definitions {}: {}", path, e),
    }
}

/// Known daemon executables: built-in entries plus the optional system file.
pub static DAEMON_TABLE: Lazy<DaemonTable> = Lazy::new(|| {
    let mut table = HashMap::new();

    let content = include_str!("../../data/daemons.toml");
    if let Err(e) = load_daemons_from_str(content, &mut table) {
        warn!("Built-in daemon table is invalid: {}", e);
    }

    load_daemons_from_file(SYSTEM_DAEMONS_FILE, &mut table);

    table
});

/// Source of the machine's host name.
pub trait HostnameSource: Send + Sync {
    /// Returns the (possibly fully-qualified) host name, or `None` if it
    /// cannot be determined.
    fn hostname(&self) -> Option<String>;
}

/// Host name as reported by the kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHostname;

impl HostnameSource for SystemHostname {
    fn hostname(&self) -> Option<String> {
        match nix::unistd::gethostname() {
            Ok(name) => name.into_string().ok(),
            Err(e) => {
                debug!("gethostname failed: {}", e);
                None
            }
        }
    }
}

/// A fixed host name, for tests and containers with an overridden identity.
#[derive(Debug, Clone)]
pub struct FixedHostname(pub String);

impl HostnameSource for FixedHostname {
    fn hostname(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// First label of a host name (`web01.example.com` -> `web01`).
pub fn short_hostname(name: &str) -> &str {
    name.split('.').next().unwrap_or("")
}

type Rule = fn(&DaemonClassifier, &[String]) -> Option<String>;

/// Classification rules in evaluation order.
const RULES: &[(&str, Rule)] = &[
    ("empty-cmdline", rule_empty_cmdline),
    ("instance-flag", rule_instance_flag),
    ("known-executable", rule_known_executable),
];

/// A process that is being created or torn down has no command line yet.
fn rule_empty_cmdline(_: &DaemonClassifier, cmdline: &[String]) -> Option<String> {
    cmdline.is_empty().then(String::new)
}

/// `-n <name>` carries the instance name of orchestrator-managed daemons.
fn rule_instance_flag(_: &DaemonClassifier, cmdline: &[String]) -> Option<String> {
    let pos = cmdline.iter().position(|arg| arg == "-n")?;
    cmdline.get(pos + 1).cloned()
}

/// Known executables are named `<type>.<short hostname>`.
fn rule_known_executable(classifier: &DaemonClassifier, cmdline: &[String]) -> Option<String> {
    let exe = cmdline.first()?;
    let base = Path::new(exe).file_name()?.to_str()?;
    let daemon_type = classifier.table.get(base)?;

    let host = classifier.hostname.hostname().unwrap_or_default();
    Some(format!("{}.{}", daemon_type, short_hostname(&host)))
}

/// Maps command lines to daemon labels.
#[derive(Clone)]
pub struct DaemonClassifier {
    table: &'static DaemonTable,
    hostname: Arc<dyn HostnameSource>,
}

impl DaemonClassifier {
    pub fn new(hostname: Arc<dyn HostnameSource>) -> Self {
        Self {
            table: &DAEMON_TABLE,
            hostname,
        }
    }

    /// Classifier using the kernel host name.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemHostname))
    }

    /// Returns the daemon label for a command line, or an empty string.
    pub fn classify(&self, cmdline: &[String]) -> String {
        for (name, rule) in RULES {
            if let Some(label) = rule(self, cmdline) {
                if !label.is_empty() {
                    debug!(rule = *name, label = %label, "classified process");
                }
                return label;
            }
        }
        String::new()
    }
}

impl std::fmt::Debug for DaemonClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonClassifier")
            .field("known_executables", &self.table.len())
            .finish()
    }
}
