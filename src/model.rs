use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// One normalized order line from the bulk upload file.
///
/// Immutable once parsed; the run that created it owns the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub quantity: u32,
    pub sku: u64,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub payment_status: String,
}

/// SKU -> sellable variant ids, resolved once per run from the remote catalog.
///
/// A single SKU may map to several variants (size/color splits); every variant
/// becomes its own order-creation call.
pub type CatalogMap = HashMap<u64, Vec<u64>>;

/// Remote-backend credentials and endpoint for one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub store_url: String,
    pub api_key: String,
    pub api_password: String,
}

/// Per-store run statistics, persisted after every completed batch.
///
/// Survives process restarts; after a crash the snapshot is stale by at most
/// one batch, never corrupt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub total_orders: u64,
    pub pending_orders: u64,
    /// Cumulative count of submissions the remote backend rejected. Failures
    /// never abort a run, so this is the only place silent loss shows up.
    #[serde(default)]
    pub failed_submissions: u64,
    pub last_order_time: String,
}

/// Tuning knobs for the batch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Orders per batch; also the fan-out bound within a batch.
    pub batch_size: usize,
    /// Pacing delay between batches, to respect remote rate limits.
    #[serde(with = "humantime_serde")]
    pub batch_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            batch_delay: Duration::from_secs(15),
        }
    }
}

/// Events emitted by the dispatcher and consumed by CLI/UI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    RunStarted {
        store: String,
        run_id: String,
        total_orders: u64,
        batches: u64,
    },
    BatchStarted {
        index: u64,
        orders: u64,
    },
    /// An order's SKU had no catalog entry; skipped by policy, not an error.
    SkuUnresolved {
        sku: u64,
    },
    SubmissionFailed {
        sku: u64,
        variant_id: u64,
        detail: String,
    },
    BatchCompleted {
        index: u64,
        submitted: u64,
        failed: u64,
        pending: u64,
    },
    RunCancelled {
        store: String,
        pending: u64,
    },
    RunCompleted {
        store: String,
        failed_submissions: u64,
    },
}

/// Acknowledgment returned by `start_run`: the run was accepted for
/// processing, not completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAccepted {
    pub run_id: String,
    pub total_orders: u64,
    pub batches: u64,
}

/// Current wall-clock time as an RFC 3339 string, for progress snapshots.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}
