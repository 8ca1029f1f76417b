//! Staler Provider Layer
//!
//! Concrete implementations of the `Provider` trait from `staler-domain`.
//!
//! # Architecture
//!
//! Each provider is a separate type owning its own backend client and expiry.
//! Nothing is shared between providers, and none of them decide staleness:
//! they only list and delete.
//!
//! # Providers
//!
//! - [`DockerContainers`]: exited Docker containers
//! - [`DockerImages`]: Docker images
//! - [`TransmissionTorrents`]: finished Transmission torrents
//! - [`TwitterFollowing`]: accounts followed on Twitter, aged by their latest tweet
//! - [`MockProvider`]: in-memory provider for testing
//!
//! # Examples
//!
//! ```
//! use staler_domain::Provider;
//! use staler_providers::MockProvider;
//! use std::time::Duration;
//!
//! let provider = MockProvider::new("mock items", Duration::from_secs(60));
//! assert_eq!(provider.identify(), "mock items");
//! ```

#![warn(missing_docs)]

pub mod docker;
pub mod mock;
pub mod transmission;
pub mod twitter;

use staler_domain::ReapError;
use std::time::Duration;

pub use docker::{DockerContainers, DockerEndpoint, DockerImages};
pub use mock::MockProvider;
pub use transmission::TransmissionTorrents;
pub use twitter::{SocialGraph, TwitterApi, TwitterFollowing};

/// Default timeout for a single backend request (30 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Build the HTTP client a provider owns for its lifetime
pub(crate) fn http_client() -> Result<reqwest::Client, ReapError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| ReapError::Construction(format!("Failed to build HTTP client: {}", e)))
}

/// Turn a non-success response into a readable error message
pub(crate) async fn describe_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    if body.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body.trim())
    }
}
