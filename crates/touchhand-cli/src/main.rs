//! `touchhand-cli` – interactive shell for the touchhand stack.
//!
//! This binary:
//!
//! 1. Initialises structured logging (optionally exporting spans over OTLP).
//! 2. Loads `~/.touchhand/config.toml`, writing defaults on first run.
//! 3. Builds a simulated VR runtime and a session manager with the
//!    configured teardown policy.
//! 4. Drops the user into an **interactive REPL** for acquiring sessions,
//!    feeding simulated controllers and correcting poses.
//! 5. Intercepts **Ctrl-C** to release every session handle and exit.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use touchhand_hal::{RuntimeProbe, SessionManager, SimRuntime};

fn main() {
    let _telemetry = touchhand_runtime::init_tracing("touchhand");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – press Enter to release the VR session and exit"
                .yellow()
                .bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(
            error = %e,
            "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available"
        );
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok((cfg, config::ConfigSource::File)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok((cfg, config::ConfigSource::Defaults)) => {
            write_default_config();
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::defaults_with_env()
        }
    };
    info!(policy = %cfg.teardown_policy, sim_hmd = cfg.sim_hmd_connected, "configuration ready");

    // ── Runtime ───────────────────────────────────────────────────────────
    let runtime = SimRuntime::new().with_probe(RuntimeProbe {
        hmd_connected: cfg.sim_hmd_connected,
        ..RuntimeProbe::ready()
    });
    let feed = runtime.controller_feed();
    let manager = SessionManager::new(runtime, cfg.teardown_policy);

    println!(
        "  Simulated runtime: HMD {}, teardown policy {}",
        if cfg.sim_hmd_connected { "connected".green() } else { "absent".yellow() },
        cfg.teardown_policy.to_string().bold()
    );
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(repl::Shell::new(manager, feed, cfg.pretty_json), shutdown);
}

fn write_default_config() {
    match config::save(&config::Config::default()) {
        Ok(()) => println!(
            "  {} Default config written to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "touchhand".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Controller-to-hand pose correction shell");
    println!();
}
