// WOL Uplink - Main Entry Point
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # WOL Uplink
//!
//! An always-on Wake-on-LAN uplink driven by Discord slash commands and
//! Telegram bot messages.
//!
//! This is the main entry point for the daemon.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

mod arbiter;
mod channels;
mod diagnostics;
mod dispatch;
mod models;
mod network_utils;
mod orchestrator;
mod scheduler;
mod services;

use models::AppConfig;
use orchestrator::{Orchestrator, Tick};
use scheduler::{ExecRestart, RestartAction};

/// Human-readable application name.
pub const APP_NAME: &str = "WOL Uplink";

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pause between loop iterations while the link is up.
const LOOP_DELAY: Duration = Duration::from_millis(20);

/// Print version information and exit.
fn print_version() {
    println!("{} {}", APP_NAME, VERSION);
    println!("Copyright (C) 2026 Christos A. Daggas");
    println!("License: MIT");
}

/// Print help information and exit.
fn print_help() {
    println!("Usage: {} [OPTIONS]", env::args().next().unwrap_or_else(|| "wol-uplink".to_string()));
    println!();
    println!("Wake machines on the local network from Discord or Telegram.");
    println!();
    println!("Options:");
    println!("  -h, --help           Show this help message and exit");
    println!("  -v, --version        Show version information and exit");
    println!("  -d, --debug          Enable debug logging");
    println!("  -c, --config <PATH>  Use this config file (default: {})", AppConfig::default_path().display());
    println!("      --check-config   Validate the config file and exit");
    println!();
    println!("Environment variables:");
    println!("  RUST_LOG                    Set log level (trace, debug, info, warn, error)");
    println!("  WOL_UPLINK_DISCORD_TOKEN    Discord bot token, overrides the config file");
    println!("  WOL_UPLINK_TELEGRAM_TOKEN   Telegram bot token, overrides the config file");
}

fn init_logging(debug_mode: bool, configured: &str) {
    let log_level = if debug_mode {
        tracing::Level::DEBUG
    } else {
        configured.parse().unwrap_or(tracing::Level::INFO)
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(log_level.into()),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let mut debug_mode = false;
    let mut check_only = false;
    let mut config_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "-v" | "--version" => {
                print_version();
                return ExitCode::SUCCESS;
            }
            "-d" | "--debug" => debug_mode = true,
            "--check-config" => check_only = true,
            "-c" | "--config" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("Option '{}' needs a path.", arg);
                    return ExitCode::FAILURE;
                }
            },
            _ => {
                eprintln!("Unknown option: {}", arg);
                eprintln!("Try '--help' for more information.");
                return ExitCode::FAILURE;
            }
        }
    }

    let path = config_path.unwrap_or_else(AppConfig::default_path);
    let config = match AppConfig::load_from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    if check_only {
        let on_off = |enabled: bool| if enabled { "on" } else { "off" };
        println!("{}: OK", path.display());
        println!("  discord:  {}", on_off(config.discord.enabled));
        println!("  telegram: {}", on_off(config.telegram.enabled));
        println!("  wake:     {} port {}", config.wake.mac, config.wake.port);
        for target in &config.targets {
            println!("  /{:<10} {} ({})", target.command, target.name, target.address);
        }
        return ExitCode::SUCCESS;
    }

    init_logging(debug_mode, &config.log_level);
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let mut orchestrator = match Orchestrator::from_config(&config, Instant::now()) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let offline_delay = Duration::from_secs(config.network.poll_delay_secs);
    loop {
        match orchestrator.tick(Instant::now()).await {
            Tick::Continue => tokio::time::sleep(LOOP_DELAY).await,
            Tick::Offline => tokio::time::sleep(offline_delay).await,
            Tick::Restart => break,
        }
    }

    // Close sockets before the process image is replaced.
    drop(orchestrator);
    let err = ExecRestart.restart();
    tracing::error!("[RESTART] Restart failed: {}", err);
    ExitCode::FAILURE
}
