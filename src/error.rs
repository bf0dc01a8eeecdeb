//! Error taxonomy for the dispatcher library.
//!
//! Per-submission failures are deliberately absent here: they are absorbed at
//! the batch level (counted and logged) and never escalate to abort a run.

use crate::client::ClientError;

/// Errors surfaced by the run control API.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The store already has an active run; starting another is rejected.
    #[error("a run is already active for store '{0}'")]
    AlreadyRunning(String),

    /// Catalog resolution failed before any batch started; no progress is
    /// recorded for the run.
    #[error("catalog unavailable for store '{store}': {source}")]
    CatalogUnavailable {
        store: String,
        source: ClientError,
    },

    /// Status query or delete for a store nobody has heard of.
    #[error("store '{0}' not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}
