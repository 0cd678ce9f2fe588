// Delivery of captured matches to the tracker API

pub mod api;
pub mod pipeline;
pub mod store;
pub mod worker;

#[cfg(test)]
mod tests;

pub use api::{MatchApi, MilestoneApi, MilestoneOutcome, RemoteTokenProvider, TokenProvider, TrackerApi};
pub use pipeline::{Ack, FlushReport, RetryPolicy, SyncFailure, SyncPipeline};
pub use store::{DeadLetter, JsonFile, SyncState, SYNC_STATE_FILE};
pub use worker::{SyncCommand, SyncWorker};
