//! Batch order dispatcher for bulk uploads to Shopify stores.
//!
//! Turns a parsed bulk order file into a throttled, cancellable, per-store
//! submission pipeline: orders are resolved against the store's catalog,
//! submitted in fixed-size concurrent batches with a pacing delay, and each
//! completed batch is recorded in a durable progress snapshot. One run per
//! store at a time; runs for different stores proceed independently.
//!
//! Delivery is at-least-once: a submission that fails is counted and logged
//! but never retried, and nothing deduplicates against the remote backend.

pub mod cli;
pub mod client;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod model;
pub mod registry;
pub mod storage;

pub use client::{ClientError, ShopifyClient, SubmissionClient};
pub use controller::{ClientFactory, RunController};
pub use dispatch::{BatchDispatcher, RunOutcome};
pub use error::DispatchError;
pub use model::{
    CatalogMap, DispatchConfig, OrderRecord, ProgressRecord, RunAccepted, RunEvent, StoreConfig,
};
pub use registry::StoreRegistry;
pub use storage::{ProgressStore, StoreConfigStore};
