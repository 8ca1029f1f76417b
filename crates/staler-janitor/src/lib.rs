//! Staler Janitor
//!
//! The stale-resource reaping engine.
//!
//! # Overview
//!
//! The Janitor is responsible for:
//! - **Reaping passes**: Listing every registered provider concurrently and
//!   deleting the items that have outlived the provider's expiry
//! - **Failure isolation**: A provider that cannot list sits the pass out, an
//!   item that cannot be deleted is skipped, nothing else is affected
//! - **Fan-out enumeration**: Merging many concurrent per-item lookups into one
//!   listing for providers that need them ([`Enumerator`])
//! - **Metrics collection**: Tracking deletions and failures for monitoring
//!
//! # Usage
//!
//! ## One-time Sweep
//!
//! ```no_run
//! use staler_janitor::{Janitor, JanitorConfig};
//! use staler_domain::Provider;
//! use std::sync::Arc;
//!
//! # async fn example(providers: Vec<Arc<dyn Provider>>) {
//! let mut janitor = Janitor::new(JanitorConfig::default(), providers);
//!
//! let report = janitor.sweep().await;
//! for provider in &report.providers {
//!     println!("{}: {} deleted", provider.provider, provider.deleted);
//! }
//! # }
//! ```
//!
//! ## Background Worker
//!
//! ```no_run
//! use staler_janitor::{Janitor, JanitorConfig, JanitorWorker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let janitor = Janitor::new(JanitorConfig::default(), Vec::new());
//!     let mut worker = JanitorWorker::new(janitor)?;
//!
//!     // Run indefinitely (until Ctrl+C)
//!     worker.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! The Janitor can be configured via TOML:
//!
//! ```toml
//! [janitor]
//! dry_run = false
//! sweep_interval = "1h"
//! ```

#![warn(missing_docs)]

mod config;
mod enumerator;
mod error;
mod janitor;
mod metrics;
mod worker;

pub use config::JanitorConfig;
pub use enumerator::Enumerator;
pub use error::JanitorError;
pub use janitor::Janitor;
pub use metrics::{JanitorMetrics, ProviderReport, SweepReport};
pub use worker::JanitorWorker;
