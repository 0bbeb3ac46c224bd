//! Recrawl-Robot: a resumable, polite recrawl robot
//!
//! This crate keeps a durable frontier of URLs in SQLite, fetches them one at a
//! time with conditional-GET semantics, deduplicates content by hash, and
//! reschedules every URL for a future recrawl.

pub mod config;
pub mod crawler;
pub mod output;
pub mod seed;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Recrawl-Robot operations
#[derive(Debug, Error)]
pub enum RobotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Seeding error for source '{source_name}': {message}")]
    Seed {
        source_name: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Recrawl-Robot operations
pub type Result<T> = std::result::Result<T, RobotError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{LoopState, TaskStatus};
pub use url::normalize_url;
