//! `crowdly-tui` — terminal dashboard for Crowdly crowd analytics.
//!
//! Built on [ratatui](https://ratatui.rs) with reactive data from
//! `crowdly-core`'s [`Controller`](crowdly_core::Controller). Screens:
//! sign-in, the analytics dashboard (1), and entry/exit records (2).
//!
//! Logs are written to a file to avoid corrupting the terminal UI. A
//! background data bridge task forwards store changes from the core
//! into the TUI action loop.
//!
//! Entry point: CLI argument parsing, tracing setup, panic hooks, and
//! app launch.

mod action;
mod app;
mod component;
mod data_bridge;
mod event;
mod screen;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crowdly_config::TokenStore;
use crowdly_core::{BackendConfig, Controller};

use crate::app::App;

/// Terminal dashboard for Crowdly crowd-management analytics.
#[derive(Parser, Debug)]
#[command(name = "crowdly-tui", version, about)]
struct Cli {
    /// Analytics backend URL (e.g., https://analytics.example.com)
    #[arg(short = 'u', long, env = "CROWDLY_BASE_URL")]
    url: Option<String>,

    /// Realtime channel URL (derived from the backend URL when absent)
    #[arg(long, env = "CROWDLY_WS_URL")]
    ws_url: Option<String>,

    /// Log file path (defaults to /tmp/crowdly-tui.log)
    #[arg(long, default_value = "/tmp/crowdly-tui.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Set up file-based tracing. We MUST NOT log to stdout/stderr — that
/// would corrupt the TUI output. Returns a guard that must be held for
/// the lifetime of the application to ensure logs are flushed.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "crowdly_tui={log_level},crowdly_core={log_level},crowdly_api={log_level}"
        ))
    });

    let log_dir = cli
        .log_file
        .parent()
        .unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("crowdly-tui.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

/// Resolve the backend configuration: config file + env, then CLI
/// overrides on top.
fn build_backend_config(cli: &Cli) -> Result<BackendConfig> {
    let mut cfg = crowdly_config::load_config_or_default();

    if let Some(ref url) = cli.url {
        cfg.base_url = url.clone();
    }
    if let Some(ref ws) = cli.ws_url {
        cfg.ws_url = Some(ws.clone());
    }

    let base_url = cfg
        .base_url
        .parse()
        .map_err(|e| eyre!("invalid backend URL {:?}: {e}", cfg.base_url))?;
    let ws_url = cfg.resolved_ws_url()?;

    Ok(BackendConfig {
        base_url,
        ws_url,
        timeout: cfg.timeout_duration(),
        refresh_interval: cfg.refresh_interval_duration(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Install panic/error hooks BEFORE entering the terminal
    tui::install_hooks()?;

    // Tracing to file — hold the guard so logs flush on exit
    let _log_guard = setup_tracing(&cli);

    let config = build_backend_config(&cli)?;
    info!(url = %config.base_url, ws = %config.ws_url, "starting crowdly-tui");

    let tokens = TokenStore::new();
    let controller = Controller::new(config, tokens)?;

    let mut app = App::new(controller);
    app.run().await?;

    Ok(())
}
