use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use lp_tracker_lib::config::{default_data_dir, Settings, SettingsOrigin, SETTINGS_FILE};
use lp_tracker_lib::logging::{export_logs, init_logging};
use lp_tracker_lib::Agent;

/// Captures finished League games from the local client and syncs them to the tracker
#[derive(Debug, Parser)]
#[command(name = "lp-tracker-agent", version, about)]
struct Cli {
  /// Settings file (defaults to settings.json in the data directory)
  #[arg(long)]
  settings: Option<PathBuf>,

  /// Directory for logs and sync state
  #[arg(long)]
  data_dir: Option<PathBuf>,

  /// Submit pending matches and exit
  #[arg(long)]
  flush_only: bool,

  /// Copy the live log to a timestamped file and exit
  #[arg(long)]
  export_logs: bool,

  /// Overrides LogLevel from the settings file
  #[arg(long)]
  log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);

  if cli.export_logs {
    let path = export_logs(&data_dir).context("exporting logs")?;
    println!("{}", path.display());
    return Ok(());
  }

  let settings_path = cli.settings.unwrap_or_else(|| data_dir.join(SETTINGS_FILE));
  let (settings, origin) = Settings::load(&settings_path)
    .with_context(|| format!("loading settings from {}", settings_path.display()))?;

  let level = cli.log_level.as_deref().unwrap_or(&settings.log_level);
  init_logging(&data_dir, level).context("initialising logging")?;
  if origin == SettingsOrigin::CreatedDefaults {
    info!("[Settings] Wrote default settings to {}", settings_path.display());
  }

  if let Err(e) = settings.validate() {
    error!("[Agent] Invalid settings in {}: {}", settings_path.display(), e);
    return Err(e).context("validating settings");
  }

  info!(
    "[Agent] lp-tracker-agent {} starting (data dir {})",
    env!("CARGO_PKG_VERSION"),
    data_dir.display()
  );
  let agent = Agent::new(settings, data_dir);

  if cli.flush_only {
    agent.flush_only().await?;
    return Ok(());
  }

  let cancel = agent.cancel_token();
  tokio::spawn(async move {
    match tokio::signal::ctrl_c().await {
      Ok(()) => {
        info!("[Agent] Ctrl+C received");
        cancel.cancel();
      }
      Err(e) => error!("[Agent] Failed to listen for Ctrl+C: {}", e),
    }
  });

  agent.run().await?;
  Ok(())
}
