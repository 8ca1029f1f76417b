//! Error types for Janitor operations

use thiserror::Error;

/// Errors that can occur while setting up or running the Janitor
///
/// A reaping pass itself never fails as a whole: provider and item failures
/// are isolated and reported, not returned. These errors cover everything
/// around the pass.
#[derive(Error, Debug)]
pub enum JanitorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),
}
