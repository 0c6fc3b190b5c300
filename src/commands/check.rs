//! Check command implementation.
//!
//! Validates system requirements and configuration.

use herakles_process_exporter::process::{scan, DaemonClassifier, ProcSource};

use crate::config::{validate_effective_config, Config};
use crate::startup_checks::validate_requirements;

/// Validates system requirements and configuration.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Process Exporter - System Check");
    println!("============================================");

    let mut all_ok = true;

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    // Check proc filesystem
    let source = config.proc_source();
    println!("\n📁 Checking {} ...", source.root().display());
    match validate_requirements(&source) {
        Ok(count) => println!("   ✅ Can enumerate {} processes", count),
        Err(e) => {
            println!("   ❌ {}", e);
            println!("\n📋 Summary:");
            println!("   ❌ Process table unavailable");
            std::process::exit(e.exit_code());
        }
    }

    // Show what the filter currently selects
    let spec = config.match_spec();
    if !spec.is_empty() {
        println!("\n🎯 Checking filter '{}' ...", spec.filter_names().join(","));
        let matches = scan(&source, &spec)?;
        if matches.is_empty() {
            println!("   ⚠️  No running process matches the filter");
        } else {
            for m in &matches {
                let threads = if m.want_threads { " (+threads)" } else { "" };
                println!("   ├─ {} (PID: {}){}", m.comm, m.pid, threads);
            }
            println!("   ✅ {} processes matched", matches.len());
        }

        // Exercise the classifier on the first match
        if let Some(m) = matches.first() {
            if let Ok(cmdline) = source.cmdline(m.pid) {
                let label = DaemonClassifier::system().classify(&cmdline);
                println!("   🏷️  PID {} daemon label: '{}'", m.pid, label);
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
