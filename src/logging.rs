use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber, appending to `log_path`.
///
/// The terminal UI owns stdout, so logs never go to the terminal.
/// `--debug` forces `taskboard=debug`; otherwise `RUST_LOG` applies,
/// defaulting to `taskboard=info`.
pub fn init_tracing(debug: bool, log_path: &Path) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("taskboard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskboard=info"))
    };

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}
