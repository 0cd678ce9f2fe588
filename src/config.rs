use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use crate::error::{AgentError, Result};

// Agent settings - stored in settings.json under the agent data directory

pub const APP_DIR_NAME: &str = "lp-tracker";
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
  #[serde(default = "default_api_base_url")]
  pub api_base_url: String,
  #[serde(default = "default_check_interval_seconds")]
  pub check_interval_seconds: u64,
  #[serde(default)]
  pub profile_id: i64,
  /// League install directory. Falls back to the platform default locations.
  #[serde(default)]
  pub league_path: Option<String>,
  #[serde(default)]
  pub api_token: Option<String>,
  #[serde(default)]
  pub refresh_token: Option<String>,
  #[serde(default = "default_max_submit_attempts")]
  pub max_submit_attempts: u32,
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
  #[serde(default = "default_retry_max_delay_ms")]
  pub retry_max_delay_ms: u64,
  #[serde(default = "default_request_timeout_seconds")]
  pub request_timeout_seconds: u64,
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

fn default_api_base_url() -> String {
  "http://localhost:5000".to_string()
}

fn default_check_interval_seconds() -> u64 {
  10
}

fn default_max_submit_attempts() -> u32 {
  4
}

fn default_retry_base_delay_ms() -> u64 {
  2_000
}

fn default_retry_max_delay_ms() -> u64 {
  60_000
}

fn default_request_timeout_seconds() -> u64 {
  15
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      api_base_url: default_api_base_url(),
      check_interval_seconds: default_check_interval_seconds(),
      profile_id: 0,
      league_path: None,
      api_token: None,
      refresh_token: None,
      max_submit_attempts: default_max_submit_attempts(),
      retry_base_delay_ms: default_retry_base_delay_ms(),
      retry_max_delay_ms: default_retry_max_delay_ms(),
      request_timeout_seconds: default_request_timeout_seconds(),
      log_level: default_log_level(),
    }
  }
}

/// Where loaded settings came from. Logging is not set up yet when settings
/// are read, so the caller reports this once it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsOrigin {
  File,
  /// No file existed; defaults were written to the path
  CreatedDefaults,
}

impl Settings {
  /// Load settings from disk. A missing file yields defaults, which are written
  /// back so the user has something to edit.
  pub fn load(path: &Path) -> Result<(Self, SettingsOrigin)> {
    if !path.exists() {
      let settings = Self::default();
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
      }
      let data = serde_json::to_string_pretty(&settings)?;
      fs::write(path, data)?;
      return Ok((settings, SettingsOrigin::CreatedDefaults));
    }

    let content = fs::read_to_string(path).map_err(|e| {
      AgentError::Configuration(format!("unable to read {}: {}", path.display(), e))
    })?;
    let settings = serde_json::from_str(&content).map_err(|e| {
      AgentError::Configuration(format!("failed to parse {}: {}", path.display(), e))
    })?;
    Ok((settings, SettingsOrigin::File))
  }

  pub fn validate(&self) -> Result<()> {
    if url::Url::parse(&self.api_base_url).is_err() {
      return Err(AgentError::Configuration(format!(
        "ApiBaseUrl is not a valid URL: {}",
        self.api_base_url
      )));
    }
    if self.check_interval_seconds == 0 {
      return Err(AgentError::Configuration(
        "CheckIntervalSeconds must be greater than zero".into(),
      ));
    }
    if self.profile_id <= 0 {
      return Err(AgentError::Configuration(
        "ProfileId must be set to a positive profile id".into(),
      ));
    }
    if self.max_submit_attempts == 0 {
      return Err(AgentError::Configuration(
        "MaxSubmitAttempts must be greater than zero".into(),
      ));
    }
    if self.retry_base_delay_ms > self.retry_max_delay_ms {
      return Err(AgentError::Configuration(
        "RetryBaseDelayMs must not exceed RetryMaxDelayMs".into(),
      ));
    }
    Ok(())
  }

  pub fn check_interval(&self) -> Duration {
    Duration::from_secs(self.check_interval_seconds)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_seconds.max(1))
  }
}

/// Agent data directory, e.g. `%APPDATA%\lp-tracker` on Windows.
pub fn default_data_dir() -> PathBuf {
  dirs::data_dir()
    .map(|dir| dir.join(APP_DIR_NAME))
    .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
}
