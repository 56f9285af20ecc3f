use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;

/// Log file under the user cache dir (~/.cache/rbd/rbd.log)
pub fn log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("rbd").join("rbd.log"))
}

/// Route `log` output to a file so it never lands on the alternate screen.
/// `RUST_LOG` wins over `default_level`.
pub fn init(default_level: &str) -> Result<()> {
    let Some(path) = log_path() else {
        // No cache dir: run without logging rather than refuse to start
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("Logger already initialised")?;

    log::info!("rbd {} starting", env!("CARGO_PKG_VERSION"));
    Ok(())
}
