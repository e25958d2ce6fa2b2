//! Logging setup.
//
// Console output plus a per-run log file under the platform data directory.
// Call `logging::init()` at the start of main() and keep the returned guard
// alive for the program's duration.

use anyhow::{Context, Result};
use chrono::Local;
use directories::ProjectDirs;
use std::fs;
use tracing_subscriber::prelude::*;

#[allow(dead_code)]
pub struct LogGuard(tracing_appender::non_blocking::WorkerGuard);

pub fn init() -> Result<LogGuard> {
    let proj_dirs = ProjectDirs::from("dev", "deskstream", "deskstream")
        .context("could not determine app data directory")?;
    let logs_dir = proj_dirs.data_dir().join("logs");
    fs::create_dir_all(&logs_dir)
        .with_context(|| format!("creating log directory {}", logs_dir.display()))?;

    let now = Local::now();
    let log_path = logs_dir.join(format!("{}.log", now.format("%Y-%m-%d_%H-%M-%S")));
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening {}", log_path.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    // Shader compilation in the wgpu stack is too chatty at info.
    let env_filter = match std::env::var("RUST_LOG").ok() {
        Some(val) => tracing_subscriber::EnvFilter::new(val),
        None => tracing_subscriber::EnvFilter::new("info,wgpu_hal=warn,wgpu_core=warn,naga=warn"),
    };

    // File log: plain formatting, no ANSI codes.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::info!(log = %log_path.display(), "logging initialized");
    Ok(LogGuard(guard))
}
