//! Per-store cancellation handles for in-flight runs.

use crate::error::DispatchError;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct RunHandle {
    run_id: String,
    token: CancellationToken,
}

/// Concurrency-safe map of store name -> active run handle.
///
/// At most one entry per store: an entry existing means a run is active (or
/// being started). Tokens are one-shot; once cancelled they stay cancelled.
/// The registry is passed by handle into the controller and dispatcher, never
/// held as a process-wide global.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    runs: Mutex<HashMap<String, RunHandle>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a fresh token for `store` under `run_id`.
    ///
    /// Fails with `AlreadyRunning` when the store already has a live run.
    pub fn register(&self, store: &str, run_id: &str) -> Result<CancellationToken, DispatchError> {
        let mut runs = self.runs.lock().expect("registry mutex poisoned");
        if runs.contains_key(store) {
            return Err(DispatchError::AlreadyRunning(store.to_string()));
        }
        let token = CancellationToken::new();
        runs.insert(
            store.to_string(),
            RunHandle {
                run_id: run_id.to_string(),
                token: token.clone(),
            },
        );
        Ok(token)
    }

    /// Signal the store's token. No-op when no run is registered.
    pub fn cancel(&self, store: &str) {
        let runs = self.runs.lock().expect("registry mutex poisoned");
        if let Some(handle) = runs.get(store) {
            handle.token.cancel();
        }
    }

    /// Drop the store's registry entry unconditionally. Stop/delete path.
    pub fn remove(&self, store: &str) {
        let mut runs = self.runs.lock().expect("registry mutex poisoned");
        runs.remove(store);
    }

    /// Release the entry on natural completion, but only if it still belongs
    /// to `run_id`. A cancelled run draining its last batch must not clobber
    /// the entry of a replacement run that started in the meantime.
    pub fn complete(&self, store: &str, run_id: &str) {
        let mut runs = self.runs.lock().expect("registry mutex poisoned");
        if runs.get(store).is_some_and(|h| h.run_id == run_id) {
            runs.remove(store);
        }
    }

    pub fn is_active(&self, store: &str) -> bool {
        let runs = self.runs.lock().expect("registry mutex poisoned");
        runs.contains_key(store)
    }
}
