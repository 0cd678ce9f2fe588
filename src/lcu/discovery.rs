// Lockfile discovery for the locally running League client

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::types::ConnectionInfo;
use crate::error::{AgentError, Result};

pub const LOCKFILE_NAMES: [&str; 3] = [
  "lockfile",
  "LeagueClientUx.lockfile",
  "LeagueClient.lockfile",
];

// The client rewrites the lockfile on restart; a half-written read is retried
const PARSE_ATTEMPTS: usize = 3;
const PARSE_RETRY_DELAY: Duration = Duration::from_millis(50);

#[async_trait]
pub trait Discovery: Send + Sync {
  /// Locate the running client. `AgentError::NotRunning` means "try again later".
  async fn discover(&self) -> Result<ConnectionInfo>;
}

/// Directories searched for a lockfile: the configured path first, then the
/// usual install locations.
pub fn candidate_dirs(league_path: Option<&str>) -> Vec<PathBuf> {
  let mut dirs = Vec::new();
  if let Some(path) = league_path.map(str::trim).filter(|p| !p.is_empty()) {
    dirs.push(PathBuf::from(path));
  }

  #[cfg(target_os = "windows")]
  let defaults = [
    r"C:\Riot Games\League of Legends",
    r"C:\Program Files\Riot Games\League of Legends",
    r"C:\Program Files (x86)\Riot Games\League of Legends",
  ];
  #[cfg(target_os = "macos")]
  let defaults = ["/Applications/League of Legends.app/Contents/LoL"];
  #[cfg(not(any(target_os = "windows", target_os = "macos")))]
  let defaults: [&str; 0] = [];

  for path in defaults {
    let path = PathBuf::from(path);
    if !dirs.contains(&path) {
      dirs.push(path);
    }
  }
  dirs
}

/// Parse `name:pid:port:password:protocol`.
pub fn parse_lockfile(content: &str) -> Option<ConnectionInfo> {
  let parts: Vec<&str> = content.trim().split(':').collect();
  if parts.len() < 5 {
    return None;
  }
  let process_id = parts[1].parse::<u32>().ok()?;
  let port = parts[2].parse::<u16>().ok().filter(|p| *p != 0)?;
  let password = parts[3].to_string();
  let protocol = parts[4].trim().to_string();
  if password.is_empty() || !(protocol == "https" || protocol == "http") {
    return None;
  }
  Some(ConnectionInfo {
    process_id,
    port,
    password,
    protocol,
  })
}

pub struct LockfileDiscovery {
  dirs: Vec<PathBuf>,
}

impl LockfileDiscovery {
  pub fn new(dirs: Vec<PathBuf>) -> Self {
    Self { dirs }
  }

  pub fn dirs(&self) -> &[PathBuf] {
    &self.dirs
  }

  async fn read_lockfile(path: &Path) -> Option<ConnectionInfo> {
    for attempt in 1..=PARSE_ATTEMPTS {
      // A missing file is not worth retrying
      let content = tokio::fs::read_to_string(path).await.ok()?;
      if let Some(info) = parse_lockfile(&content) {
        return Some(info);
      }
      debug!(
        "[LCU Discovery] Unparsable lockfile {} (attempt {}/{})",
        path.display(),
        attempt,
        PARSE_ATTEMPTS
      );
      if attempt < PARSE_ATTEMPTS {
        tokio::time::sleep(PARSE_RETRY_DELAY).await;
      }
    }
    None
  }
}

#[async_trait]
impl Discovery for LockfileDiscovery {
  async fn discover(&self) -> Result<ConnectionInfo> {
    for dir in &self.dirs {
      for name in LOCKFILE_NAMES {
        let path = dir.join(name);
        if let Some(info) = Self::read_lockfile(&path).await {
          debug!(
            "[LCU Discovery] Found client pid {} on port {} via {}",
            info.process_id,
            info.port,
            path.display()
          );
          return Ok(info);
        }
      }
    }
    Err(AgentError::NotRunning(format!(
      "no valid lockfile in {} director{}",
      self.dirs.len(),
      if self.dirs.len() == 1 { "y" } else { "ies" }
    )))
  }
}

fn is_lockfile_event(event: &Event) -> bool {
  let relevant_kind = matches!(
    event.kind,
    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
  );
  relevant_kind
    && event.paths.iter().any(|p| {
      p.file_name()
        .and_then(|n| n.to_str())
        .map(|n| LOCKFILE_NAMES.contains(&n))
        .unwrap_or(false)
    })
}

/// Wake `wake` whenever a lockfile appears, changes or disappears in one of
/// `dirs`. The returned watcher must be kept alive. Directories that do not
/// exist are skipped; `None` if nothing could be watched.
pub fn watch_lockfile(dirs: &[PathBuf], wake: Arc<Notify>) -> Option<RecommendedWatcher> {
  let mut watcher = match notify::recommended_watcher(move |result: notify::Result<Event>| {
    match result {
      Ok(event) if is_lockfile_event(&event) => wake.notify_one(),
      Ok(_) => {}
      Err(e) => debug!("[LCU Discovery] Lockfile watcher error: {}", e),
    }
  }) {
    Ok(w) => w,
    Err(e) => {
      warn!("[LCU Discovery] Failed to create lockfile watcher: {}", e);
      return None;
    }
  };

  let mut watching = 0;
  for dir in dirs.iter().filter(|d| d.is_dir()) {
    match watcher.watch(dir, RecursiveMode::NonRecursive) {
      Ok(()) => watching += 1,
      Err(e) => warn!("[LCU Discovery] Cannot watch {}: {}", dir.display(), e),
    }
  }
  (watching > 0).then_some(watcher)
}
