//! Configuration
//!
//! Environment-driven settings for the streaming client.

mod settings;

pub use settings::{ConfigError, StreamerSettings, session_from_env};
