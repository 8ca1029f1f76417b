//! Error taxonomy for reaping operations

use thiserror::Error;

/// Errors raised by providers and the enumeration machinery
///
/// Each variant maps to how far a failure reaches:
/// - `Construction` stops the program before any reaping starts
/// - `List` and `Enumeration` cost one provider its current pass
/// - `Delete` costs a single item
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReapError {
    /// Provider could not be created (bad credentials, unusable endpoint)
    #[error("Construction error: {0}")]
    Construction(String),

    /// Listing the current items failed
    #[error("List error: {0}")]
    List(String),

    /// Deleting one item failed
    #[error("Delete error: {0}")]
    Delete(String),

    /// A fanned-out sub-lookup failed while enumerating items
    #[error("Enumeration error: {0}")]
    Enumeration(String),
}
