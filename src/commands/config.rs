//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = output.unwrap_or_else(|| PathBuf::from("herakles-process-exporter.yaml"));
    let content = generate_config(format, commented)?;

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Renders the default configuration, optionally with a commented header (YAML only).
pub fn generate_config(
    format: ConfigFormat,
    commented: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let commented = commented && matches!(format, ConfigFormat::Yaml);
    let content = render_config(&Config::default(), format)?;
    Ok(if commented {
        add_config_comments(content)
    } else {
        content
    })
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Process Exporter Configuration
# ========================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9200                   # HTTP port
#
# Process Selection
# -----------------
# filter: [ceph-osd, haproxy]  # Command names to export (FILTER env var overrides)
# with_threads: [ceph-osd]     # Subset of filter that also exports per-thread CPU
# nomatch_abort: false         # Exit with code 4 when nothing matches
#
# Metrics
# -------
# prefix: "proc"               # Metric name prefix
#
# Data Source
# -----------
# proc_root: null              # procfs mount (null = /host/proc if present, else /proc)
# page_size: null              # Page size in bytes (null = detected)
#
# Performance Tuning
# ------------------
# parallelism: 0               # Concurrent process collectors (0 = number of CPUs)
# scrape_timeout_secs: 10      # Abandon a scrape after N seconds (HTTP 503)
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_commented_yaml_still_parses() {
        let content = generate_config(ConfigFormat::Yaml, true).unwrap();
        assert!(content.starts_with("# Herakles Process Exporter Configuration"));

        let cfg = parse_config(&content, Some("yaml")).unwrap();
        assert_eq!(cfg.port, Some(9200));
    }

    #[test]
    fn test_comments_only_for_yaml() {
        let content = generate_config(ConfigFormat::Json, true).unwrap();
        assert!(content.trim_start().starts_with('{'));
    }

    #[test]
    fn test_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.toml");
        command_config(Some(path.clone()), ConfigFormat::Toml, false).unwrap();

        let cfg = parse_config(&fs::read_to_string(&path).unwrap(), Some("toml")).unwrap();
        assert_eq!(cfg.prefix(), "proc");
    }
}
