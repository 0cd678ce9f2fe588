// Logging setup: stdout plus an append-only live log on disk

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{AgentError, Result};

pub const LIVE_LOG_NAME: &str = "lp-tracker-live.log";

pub fn logs_dir(data_dir: &Path) -> PathBuf {
  data_dir.join("logs")
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// If the live log cannot be opened we keep logging to stdout only.
pub fn init_logging(data_dir: &Path, level: &str) -> Result<()> {
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(level))
    .map_err(|e| AgentError::Configuration(format!("invalid log level '{}': {}", level, e)))?;

  let stdout_layer = fmt::layer().with_target(false);

  let dir = logs_dir(data_dir);
  let live_log = fs::create_dir_all(&dir)
    .and_then(|_| File::options().create(true).append(true).open(dir.join(LIVE_LOG_NAME)));

  match live_log {
    Ok(file) => {
      let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));
      tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AgentError::Configuration(format!("logging already initialised: {}", e)))?;
    }
    Err(e) => {
      tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| AgentError::Configuration(format!("logging already initialised: {}", e)))?;
      tracing::warn!("[Logging] Failed to open live log in {}: {}", dir.display(), e);
    }
  }
  Ok(())
}

/// Copy the live log to a timestamped file next to it and return its path.
pub fn export_logs(data_dir: &Path) -> Result<PathBuf> {
  let dir = logs_dir(data_dir);
  let live_log = dir.join(LIVE_LOG_NAME);
  let contents = fs::read_to_string(&live_log).unwrap_or_default();
  if contents.is_empty() {
    return Err(AgentError::Configuration("No logs available".to_string()));
  }

  let filename = format!("lp-tracker-logs-{}.txt", Utc::now().format("%Y%m%d-%H%M%S"));
  let out_path = dir.join(filename);
  fs::write(&out_path, contents)?;
  Ok(out_path)
}
