use anyhow::{Context, Result};
use cityweather_core::Config;
use std::{fs::OpenOptions, sync::Mutex};
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "cityweather.log";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// One-shot commands log to stderr, where they don't mix with the output.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// The interactive screen owns the terminal, so logs go to a file in the
/// data directory instead.
pub fn init_file() -> Result<()> {
    let dir = Config::data_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data dir: {}", dir.display()))?;

    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();

    Ok(())
}
