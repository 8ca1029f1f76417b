//! Staler Domain Layer
//!
//! Core concepts shared by every part of staler: the resources that can go
//! stale, the rule that decides when they have, and the capability interface a
//! resource backend implements.
//!
//! ## Key Concepts
//!
//! - **Item**: One candidate for removal, an opaque provider-defined id plus an age
//! - **Staleness**: An item is stale once `now - age` exceeds its provider's expiry
//! - **Provider**: A backend that can list and delete one kind of resource
//! - **ReapError**: The error taxonomy shared by providers and the janitor
//!
//! ## Architecture
//!
//! This crate holds no I/O. Provider implementations live in `staler-providers`,
//! the reaping pass itself lives in `staler-janitor`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod item;
pub mod traits;

// Re-exports for convenience
pub use error::ReapError;
pub use item::{is_stale, Item};
pub use traits::Provider;
