//! `stewart` binary: calibrate, move and inspect a (simulated) Stewart platform.

mod cli;
mod commands;
mod error_fmt;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, StoreCmd};
use crate::commands::Ctx;
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        tracing::debug!(error = ?e, "full error report");
        std::process::exit(exit_code_for_error(&e));
    }
}

fn load_config(path: &Path) -> eyre::Result<stewart_config::Config> {
    let text = std::fs::read_to_string(path).wrap_err_with(|| format!("read config {path:?}"))?;
    let cfg: stewart_config::Config = toml::from_str(&text).wrap_err("parse config")?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn init_tracing(cli: &Cli, logging: &stewart_config::Logging) -> eyre::Result<()> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    // Logs go to stderr so stdout stays machine-readable.
    let json_console = cli
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_console = (!cli.json).then(|| fmt::layer().with_writer(std::io::stderr));

    let file_layer = match &logging.file {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file:?}"))?;
            let rotation = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::Rotation::DAILY,
                Some("hourly") => tracing_appender::rolling::Rotation::HOURLY,
                Some("never") | None => tracing_appender::rolling::Rotation::NEVER,
                Some(other) => eyre::bail!("logging.rotation must be never|daily|hourly, got {other:?}"),
            };
            let appender = tracing_appender::rolling::RollingFileAppender::new(rotation, dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_console)
        .with(text_console)
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))?;
    Ok(())
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg.logging)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let store_path = cli
        .store
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.persistence.path));
    let ctx = Ctx {
        cfg,
        store_path,
        bounds_csv: cli.bounds.clone(),
        json: cli.json,
        shutdown,
    };
    tracing::debug!(command = ?cli.cmd, store = %ctx.store_path.display(), "starting");

    match &cli.cmd {
        Commands::Calibrate {
            force,
            export,
            max_run_ms,
        } => commands::calibrate(&ctx, *force, export.as_deref(), *max_run_ms),
        Commands::Move {
            lengths,
            max_run_ms,
        } => commands::move_to(&ctx, lengths, *max_run_ms),
        Commands::Store { action } => match action {
            StoreCmd::Show => commands::store_show(&ctx),
            StoreCmd::Clear => commands::store_clear(&ctx),
        },
        Commands::SelfCheck => commands::self_check(&ctx),
    }
}
