//! CLI arguments and subcommands for herakles-process-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-process-exporter",
    about = "Prometheus exporter for per-process and per-thread CPU, memory and I/O counters",
    long_about = "Prometheus exporter for per-process and per-thread CPU, memory and I/O counters.\n\n\
                  Selects processes by command name, optionally expands them into threads and \
                  labels them with the daemon instance they belong to.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Process names to match (comma-separated); the FILTER environment variable overrides it
    #[arg(long)]
    pub filter: Option<String>,

    /// Process names that also get per-thread statistics (comma-separated)
    #[arg(long)]
    pub with_threads: Option<String>,

    /// Exit if the filter doesn't match any running process
    #[arg(
        long = "nomatch-abort",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub nomatch_abort: Option<bool>,

    /// Prefix for the exported metric names
    #[arg(long)]
    pub prefix: Option<String>,

    /// procfs mount point (default: /host/proc if present, else /proc)
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Maximum number of processes collected concurrently (0 = number of CPUs)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Abandon a scrape after N seconds
    #[arg(long)]
    pub scrape_timeout_secs: Option<u64>,

    /// Log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and runtime requirements
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run scrapes once and print the collected records
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print every record instead of a per-process summary
        #[arg(long)]
        verbose: bool,
    },
}
