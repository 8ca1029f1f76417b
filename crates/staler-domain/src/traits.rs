//! Trait definitions for external interactions
//!
//! These traits define the boundary between the reaping engine and the
//! systems it cleans up. Implementations live in `staler-providers`.

use crate::{Item, ReapError};
use async_trait::async_trait;
use std::time::Duration;

/// A source of removable resources of one kind from one external system
///
/// Implemented by the infrastructure layer (staler-providers). A provider owns
/// its connection handle exclusively and is a pure data source: it never
/// decides staleness itself, the janitor does.
///
/// Construction of a concrete provider is fallible and must fail with
/// [`ReapError::Construction`] before the provider is ever handed to a janitor.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Maximum age of this provider's items before they become stale
    fn expiry(&self) -> Duration;

    /// List every item of this provider's kind that currently exists
    ///
    /// No filtering happens here. On failure no items are returned and the
    /// whole listing must be distrusted.
    async fn list(&self) -> Result<Vec<Item>, ReapError>;

    /// Delete exactly the given item by its provider-defined id
    async fn delete(&self, item: &Item) -> Result<(), ReapError>;

    /// Human-readable label for logs (e.g. "Docker containers")
    fn identify(&self) -> &str;
}
