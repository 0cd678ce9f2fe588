// League client (LCU) module - finds the running client and watches it for finished games

mod client;
mod discovery;
mod types;
mod watcher;

#[cfg(test)]
mod tests;

// Re-export public types and functions
pub use client::{ClientProbe, LcuClient};
pub use discovery::{candidate_dirs, watch_lockfile, Discovery, LockfileDiscovery, LOCKFILE_NAMES};
pub use types::{ClientPhase, ConnectionInfo};
pub use watcher::{PollingStateMachine, WatchState};
