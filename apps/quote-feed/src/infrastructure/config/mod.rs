//! Configuration
//!
//! Environment-driven configuration for the feed core.

mod settings;

pub use settings::{ConfigError, Credentials, FeedConfig, StreamSettings};
