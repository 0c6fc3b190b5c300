//! Configuration management for herakles-process-exporter.
//!
//! This module handles loading, merging, and validating configuration from files,
//! CLI arguments and the `FILTER` environment variable. It supports YAML, JSON,
//! and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use herakles_process_exporter::metrics::{is_valid_prefix, DEFAULT_PREFIX};
use herakles_process_exporter::process::{DaemonClassifier, MatchSpec, ProcFs, PAGE_SIZE};
use herakles_process_exporter::{NoMatchPolicy, ScrapeOptions, Scraper};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9200;
pub const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 10;

/// Environment variable that replaces the configured filter when set.
pub const FILTER_ENV: &str = "FILTER";

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Process selection
    /// Command names to match
    pub filter: Option<Vec<String>>,
    /// Subset of `filter` that also gets per-thread records
    #[serde(alias = "with-threads")]
    pub with_threads: Option<Vec<String>>,
    /// Exit when the filter matches nothing
    #[serde(alias = "nomatch-abort")]
    pub nomatch_abort: Option<bool>,

    // Metrics
    pub prefix: Option<String>,

    // Data source
    /// procfs mount point; autodetected when unset
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    /// Overrides the detected system page size
    #[serde(alias = "page-size")]
    pub page_size: Option<u64>,

    // Performance tuning
    pub parallelism: Option<usize>,
    #[serde(alias = "scrape-timeout-secs")]
    pub scrape_timeout_secs: Option<u64>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            filter: None,
            with_threads: None,
            nomatch_abort: Some(false),
            prefix: Some(DEFAULT_PREFIX.to_string()),
            proc_root: None,
            page_size: None,
            parallelism: Some(0),
            scrape_timeout_secs: Some(DEFAULT_SCRAPE_TIMEOUT_SECS),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(
            self.scrape_timeout_secs
                .unwrap_or(DEFAULT_SCRAPE_TIMEOUT_SECS),
        )
    }

    pub fn page_size(&self) -> u64 {
        self.page_size.unwrap_or(*PAGE_SIZE)
    }

    pub fn no_match_policy(&self) -> NoMatchPolicy {
        NoMatchPolicy::from_abort_flag(self.nomatch_abort.unwrap_or(false))
    }

    /// procfs access rooted at `proc_root`, or the detected default.
    pub fn proc_source(&self) -> ProcFs {
        ProcFs::detect(self.proc_root.as_deref())
    }

    /// Builds the scraper for this configuration.
    pub fn scraper(&self, source: ProcFs) -> Result<Scraper, Box<dyn std::error::Error>> {
        let options = ScrapeOptions {
            no_match: self.no_match_policy(),
            page_size: self.page_size(),
            parallelism: self.parallelism.unwrap_or(0),
        };
        let scraper = Scraper::new(
            Arc::new(source),
            DaemonClassifier::system(),
            self.match_spec(),
            options,
        )?;
        Ok(scraper)
    }

    /// Builds the process selection from `filter` and `with_threads`.
    pub fn match_spec(&self) -> MatchSpec {
        MatchSpec::new(
            self.filter.iter().flatten().map(String::as_str),
            self.with_threads.iter().flatten().map(String::as_str),
        )
    }
}

/// Splits a comma-separated CLI list.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn log_level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Off => "off",
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let spec = cfg.match_spec();
    if spec.is_empty() {
        return Err(format!(
            "No process filter configured (use --filter, the {} environment variable or 'filter' in the config file)",
            FILTER_ENV
        )
        .into());
    }

    let prefix = cfg.prefix();
    if !is_valid_prefix(prefix) {
        return Err(format!("Invalid metric prefix '{}'", prefix).into());
    }

    if cfg.scrape_timeout_secs == Some(0) {
        return Err("scrape_timeout_secs must be greater than 0".into());
    }

    if cfg.page_size == Some(0) {
        return Err("page_size must be greater than 0".into());
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if !["off", "error", "warn", "info", "debug", "trace"].contains(&level) {
            return Err(format!("Invalid log_level '{}'", level).into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", what, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into()),
    }
}

/// Resolves configuration from the environment, CLI args, config file, and defaults.
/// This enforces precedence: FILTER env > CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    resolve_config_with_env(args, std::env::var(FILTER_ENV).ok())
}

/// Same as [`resolve_config`] with the `FILTER` value passed in.
pub fn resolve_config_with_env(
    args: &Args,
    env_filter: Option<String>,
) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(filter) = &args.filter {
        config.filter = Some(split_list(filter));
    }
    if let Some(threads) = &args.with_threads {
        config.with_threads = Some(split_list(threads));
    }
    if let Some(abort) = args.nomatch_abort {
        config.nomatch_abort = Some(abort);
    }

    if let Some(prefix) = &args.prefix {
        config.prefix = Some(prefix.clone());
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }

    if let Some(parallelism) = args.parallelism {
        config.parallelism = Some(parallelism);
    }
    if let Some(timeout) = args.scrape_timeout_secs {
        config.scrape_timeout_secs = Some(timeout);
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(log_level_name(level).to_string());
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    if let Some(filter) = env_filter {
        debug!(
            "Overriding filter with {} environment variable: {}",
            FILTER_ENV, filter
        );
        config.filter = Some(split_list(&filter));
    }

    Ok(config)
}

/// Loads a config file, trying the default locations when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            let defaults = [
                "/etc/herakles/process-exporter.yaml",
                "/etc/herakles/process-exporter.yml",
                "/etc/herakles/process-exporter.json",
                "/etc/herakles/process-exporter.toml",
                "./herakles-process-exporter.yaml",
                "./herakles-process-exporter.yml",
                "./herakles-process-exporter.json",
                "./herakles-process-exporter.toml",
            ];

            match defaults.iter().map(Path::new).find(|p| p.exists()) {
                Some(p) => p.to_path_buf(),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;
    parse_config(&content, path.extension().and_then(|s| s.to_str()))
        .inspect(|_| info!("Loaded configuration from: {}", path.display()))
}

/// Parses config text; the extension selects the format, YAML being the default.
pub fn parse_config(
    content: &str,
    extension: Option<&str>,
) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match extension {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
