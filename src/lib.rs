pub mod agent;
pub mod config;
pub mod error;
pub mod lcu;
pub mod logging;
pub mod mapper;
pub mod milestone;
pub mod rank;
pub mod sync;
pub mod types;

pub use agent::Agent;
pub use config::Settings;
pub use error::{AgentError, Result};
