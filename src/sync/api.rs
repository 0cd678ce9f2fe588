// Tracker API client: match and milestone creation, bearer token refresh

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::error::{AgentError, Result};
use crate::types::{CapturedMatch, PersistedMatch, RankMilestone};

const MATCHES_PATH: &str = "api/matches";
const MILESTONES_PATH: &str = "api/milestones";
const AUTH_REFRESH_PATH: &str = "api/auth/refresh";

#[async_trait]
pub trait TokenProvider: Send + Sync {
  /// Current bearer token, if any.
  async fn token(&self) -> Option<String>;
  /// Obtain a fresh token after a 401.
  async fn refresh(&self) -> Result<String>;
}

#[async_trait]
pub trait MatchApi: Send + Sync {
  /// Create the match. The server answers with the persisted match, also when
  /// it already knew the game.
  async fn create_match(&self, token: Option<&str>, captured: &CapturedMatch)
    -> Result<PersistedMatch>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneOutcome {
  Created,
  AlreadyExists,
}

#[async_trait]
pub trait MilestoneApi: Send + Sync {
  async fn create_milestone(
    &self,
    token: Option<&str>,
    milestone: &RankMilestone,
  ) -> Result<MilestoneOutcome>;
}

/// Parse the configured base URL so relative joins keep any path prefix.
pub fn api_base(base_url: &str) -> Result<Url> {
  let mut base = Url::parse(base_url)
    .map_err(|e| AgentError::Configuration(format!("invalid ApiBaseUrl '{}': {}", base_url, e)))?;
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }
  Ok(base)
}

fn endpoint(base: &Url, path: &str) -> Result<Url> {
  base
    .join(path)
    .map_err(|e| AgentError::Configuration(format!("invalid endpoint {}: {}", path, e)))
}

fn remote_http_client(timeout: Duration) -> Result<reqwest::Client> {
  reqwest::Client::builder()
    .timeout(timeout)
    .connect_timeout(timeout.min(Duration::from_secs(5)))
    .build()
    .map_err(|e| AgentError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

#[derive(Clone)]
pub struct TrackerApi {
  http: reqwest::Client,
  base: Url,
}

impl TrackerApi {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    Ok(Self {
      http: remote_http_client(timeout)?,
      base: api_base(base_url)?,
    })
  }

  async fn post<T: Serialize + ?Sized>(
    &self,
    path: &str,
    token: Option<&str>,
    body: &T,
  ) -> Result<reqwest::Response> {
    let url = endpoint(&self.base, path)?;
    let mut request = self.http.post(url).json(body);
    if let Some(token) = token {
      request = request.bearer_auth(token);
    }
    request.send().await.map_err(AgentError::from_remote)
  }
}

async fn error_for(resp: reqwest::Response) -> AgentError {
  let status = resp.status().as_u16();
  let body = resp.text().await.unwrap_or_default();
  let reason = if body.is_empty() {
    format!("HTTP {}", status)
  } else {
    body.chars().take(500).collect()
  };
  AgentError::from_status(status, reason)
}

#[async_trait]
impl MatchApi for TrackerApi {
  async fn create_match(
    &self,
    token: Option<&str>,
    captured: &CapturedMatch,
  ) -> Result<PersistedMatch> {
    let resp = self.post(MATCHES_PATH, token, captured).await?;
    let status = resp.status();
    if status.is_success() || status == reqwest::StatusCode::CONFLICT {
      // The body is the persisted match; without its id we cannot link milestones
      return resp.json::<PersistedMatch>().await.map_err(|e| {
        AgentError::TransientNetwork(format!("unreadable create-match response: {}", e))
      });
    }
    Err(error_for(resp).await)
  }
}

#[async_trait]
impl MilestoneApi for TrackerApi {
  async fn create_milestone(
    &self,
    token: Option<&str>,
    milestone: &RankMilestone,
  ) -> Result<MilestoneOutcome> {
    let resp = self.post(MILESTONES_PATH, token, milestone).await?;
    let status = resp.status();
    if status.is_success() {
      Ok(MilestoneOutcome::Created)
    } else if status == reqwest::StatusCode::CONFLICT {
      Ok(MilestoneOutcome::AlreadyExists)
    } else {
      Err(error_for(resp).await)
    }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
  refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
  #[serde(alias = "accessToken")]
  token: String,
}

/// Bearer token from settings, refreshed through the auth service on demand.
pub struct RemoteTokenProvider {
  http: reqwest::Client,
  refresh_url: Url,
  refresh_token: Option<String>,
  current: RwLock<Option<String>>,
}

impl RemoteTokenProvider {
  pub fn new(
    base_url: &str,
    timeout: Duration,
    api_token: Option<String>,
    refresh_token: Option<String>,
  ) -> Result<Self> {
    Ok(Self {
      http: remote_http_client(timeout)?,
      refresh_url: endpoint(&api_base(base_url)?, AUTH_REFRESH_PATH)?,
      refresh_token: refresh_token.filter(|t| !t.trim().is_empty()),
      current: RwLock::new(api_token.filter(|t| !t.trim().is_empty())),
    })
  }
}

#[async_trait]
impl TokenProvider for RemoteTokenProvider {
  async fn token(&self) -> Option<String> {
    self.current.read().await.clone()
  }

  async fn refresh(&self) -> Result<String> {
    let Some(refresh_token) = self.refresh_token.as_deref() else {
      debug!("[Auth] No refresh token configured");
      return Err(AgentError::AuthExpired);
    };

    let resp = self
      .http
      .post(self.refresh_url.clone())
      .json(&RefreshRequest { refresh_token })
      .send()
      .await
      .map_err(AgentError::from_remote)?;
    if !resp.status().is_success() {
      return Err(error_for(resp).await);
    }
    let body: RefreshResponse = resp
      .json()
      .await
      .map_err(|e| AgentError::TransientNetwork(format!("unreadable refresh response: {}", e)))?;

    *self.current.write().await = Some(body.token.clone());
    info!("[Auth] Bearer token refreshed");
    Ok(body.token)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn endpoints_keep_base_path_prefix() {
    let base = api_base("https://tracker.example.com/app").unwrap();
    assert_eq!(
      endpoint(&base, MATCHES_PATH).unwrap().as_str(),
      "https://tracker.example.com/app/api/matches"
    );

    let root = api_base("http://localhost:5000").unwrap();
    assert_eq!(
      endpoint(&root, MILESTONES_PATH).unwrap().as_str(),
      "http://localhost:5000/api/milestones"
    );
    assert!(api_base("localhost").is_err());
  }

  #[tokio::test]
  async fn refresh_without_refresh_token_is_auth_expired() {
    let tokens = RemoteTokenProvider::new(
      "http://localhost:5000",
      Duration::from_secs(1),
      Some("abc".into()),
      None,
    )
    .unwrap();
    assert_eq!(tokens.token().await.as_deref(), Some("abc"));
    assert!(matches!(tokens.refresh().await, Err(AgentError::AuthExpired)));
  }

  #[test]
  fn refresh_response_accepts_access_token_alias() {
    let body: RefreshResponse = serde_json::from_str(r#"{ "accessToken": "xyz" }"#).unwrap();
    assert_eq!(body.token, "xyz");
  }
}
