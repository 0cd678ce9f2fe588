use std::io;

use thiserror::Error;

// Error taxonomy for the capture and sync pipeline

pub type Result<T, E = AgentError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AgentError {
  /// No lockfile, or one that could not be parsed. Routine: retried every tick.
  #[error("league client not running: {0}")]
  NotRunning(String),
  /// The client endpoint stopped answering. Resets the watcher to Idle.
  #[error("league client unreachable: {0}")]
  Unreachable(String),
  /// Remote API rejected the bearer token.
  #[error("auth token expired")]
  AuthExpired,
  /// Timeout, connection reset, 408/429/5xx. Retried with backoff.
  #[error("transient network failure: {0}")]
  TransientNetwork(String),
  /// Remote API refused the payload for good.
  #[error("remote rejected request ({status}): {reason}")]
  PermanentRejection { status: u16, reason: String },
  #[error("configuration error: {0}")]
  Configuration(String),
  #[error("IO error: {0}")]
  Io(#[from] io::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

impl AgentError {
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      Self::TransientNetwork(_) | Self::Unreachable(_) | Self::NotRunning(_)
    )
  }

  /// Classify a reqwest failure against the remote API.
  pub fn from_remote(err: reqwest::Error) -> Self {
    if let Some(status) = err.status() {
      return Self::from_status(status.as_u16(), err.to_string());
    }
    if err.is_builder() {
      return Self::PermanentRejection {
        status: 0,
        reason: err.to_string(),
      };
    }
    Self::TransientNetwork(err.to_string())
  }

  /// Classify a reqwest failure against the local client endpoint. A refused
  /// connection means the client is gone; a slow answer is only transient.
  pub fn from_lcu(err: reqwest::Error) -> Self {
    if err.is_connect() {
      Self::Unreachable(err.to_string())
    } else {
      Self::TransientNetwork(err.to_string())
    }
  }

  pub fn from_status(status: u16, reason: String) -> Self {
    match status {
      401 => Self::AuthExpired,
      408 | 429 => Self::TransientNetwork(format!("HTTP {}: {}", status, reason)),
      s if s >= 500 => Self::TransientNetwork(format!("HTTP {}: {}", status, reason)),
      _ => Self::PermanentRejection { status, reason },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_classification() {
    assert!(matches!(
      AgentError::from_status(401, String::new()),
      AgentError::AuthExpired
    ));
    assert!(AgentError::from_status(503, "down".into()).is_transient());
    assert!(AgentError::from_status(429, "slow down".into()).is_transient());
    assert!(matches!(
      AgentError::from_status(422, "bad payload".into()),
      AgentError::PermanentRejection { status: 422, .. }
    ));
  }
}
