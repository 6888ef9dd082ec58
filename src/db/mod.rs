//! Storage tiers for Vantage.
//!
//! The hot tier is an expiring key-value store with a few atomic JSON
//! primitives; the cold tier is SQLite with compressed payloads.

mod codec;
mod cold;
mod hot;
mod models;

pub use codec::*;
pub use cold::*;
pub use hot::*;
pub use models::*;

use thiserror::Error;

/// Storage error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Io(#[from] std::io::Error),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("invalid test id: {0}")]
    InvalidTestId(String),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
