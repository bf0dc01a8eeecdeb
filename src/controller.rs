//! Run lifecycle controller.
//!
//! Owns start/stop orchestration for all stores: one supervised background
//! task per active run, a shared registry of cancellation handles, and the
//! durable configuration and progress snapshots.

use crate::client::{ClientError, SubmissionClient};
use crate::dispatch::BatchDispatcher;
use crate::error::DispatchError;
use crate::model::{DispatchConfig, OrderRecord, ProgressRecord, RunAccepted, RunEvent, StoreConfig};
use crate::registry::StoreRegistry;
use crate::storage::{ProgressStore, StoreConfigStore};
use rand::RngCore;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

/// Builds a submission client bound to one store's endpoint and credentials.
/// Injected so tests can substitute recording clients.
pub type ClientFactory =
    Box<dyn Fn(&StoreConfig) -> Result<Arc<dyn SubmissionClient>, ClientError> + Send + Sync>;

pub struct RunController {
    registry: Arc<StoreRegistry>,
    stores: Arc<StoreConfigStore>,
    progress: Arc<ProgressStore>,
    dispatch_cfg: DispatchConfig,
    client_factory: ClientFactory,
}

/// Generate a random run id.
fn gen_run_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    u64::from_le_bytes(b).to_string()
}

impl RunController {
    pub fn new(
        registry: Arc<StoreRegistry>,
        stores: Arc<StoreConfigStore>,
        progress: Arc<ProgressStore>,
        dispatch_cfg: DispatchConfig,
        client_factory: ClientFactory,
    ) -> Self {
        Self {
            registry,
            stores,
            progress,
            dispatch_cfg,
            client_factory,
        }
    }

    /// Accept a run for `store`: register a cancellation handle, resolve the
    /// catalog, and launch the dispatcher in the background.
    ///
    /// Returns as soon as the run is accepted; the caller observes completion
    /// through the event channel. The registry entry is released by the
    /// background task on natural completion, so a finished run never blocks
    /// the next `start_run` for the same store.
    pub async fn start_run(
        &self,
        store: &str,
        orders: Vec<OrderRecord>,
        events: UnboundedSender<RunEvent>,
    ) -> Result<RunAccepted, DispatchError> {
        let store_cfg = self
            .stores
            .get(store)
            .await
            .ok_or_else(|| DispatchError::NotFound(store.to_string()))?;

        let run_id = gen_run_id();
        // Register before any network round-trip so a second concurrent start
        // is rejected immediately rather than racing through resolution.
        let token = self.registry.register(store, &run_id)?;

        let client = match (self.client_factory)(&store_cfg) {
            Ok(c) => c,
            Err(source) => {
                self.registry.remove(store);
                return Err(DispatchError::CatalogUnavailable {
                    store: store.to_string(),
                    source,
                });
            }
        };
        let catalog = match client.resolve_catalog().await {
            Ok(map) => map,
            Err(source) => {
                self.registry.remove(store);
                return Err(DispatchError::CatalogUnavailable {
                    store: store.to_string(),
                    source,
                });
            }
        };

        let total_orders = orders.len() as u64;
        let batch_size = self.dispatch_cfg.batch_size.max(1) as u64;
        let batches = total_orders.div_ceil(batch_size);

        let _ = events.send(RunEvent::RunStarted {
            store: store.to_string(),
            run_id: run_id.clone(),
            total_orders,
            batches,
        });
        info!(store, run_id = %run_id, total_orders, batches, "run accepted");

        let dispatcher = BatchDispatcher::new(
            store,
            self.dispatch_cfg.clone(),
            client,
            Arc::clone(&self.progress),
        );
        let registry = Arc::clone(&self.registry);
        let store_name = store.to_string();
        let task_run_id = run_id.clone();
        tokio::spawn(async move {
            dispatcher.run(&orders, &catalog, token, &events).await;
            registry.complete(&store_name, &task_run_id);
        });

        Ok(RunAccepted {
            run_id,
            total_orders,
            batches,
        })
    }

    /// Signal cancellation and release the registry entry immediately.
    ///
    /// Idempotent: stopping a store with no active run is accepted. The
    /// dispatcher observes the signal at its next batch boundary, which may
    /// lag by one in-flight batch plus one pacing delay.
    pub fn stop_run(&self, store: &str) {
        self.registry.cancel(store);
        self.registry.remove(store);
        info!(store, "stop requested");
    }

    pub async fn progress(&self, store: &str) -> Result<ProgressRecord, DispatchError> {
        self.progress
            .get(store)
            .await
            .ok_or_else(|| DispatchError::NotFound(store.to_string()))
    }

    pub async fn all_progress(
        &self,
    ) -> std::collections::HashMap<String, ProgressRecord> {
        self.progress.load().await
    }

    /// Stop any active run for `store`, then purge both its configuration
    /// and its progress record.
    pub async fn delete_store(&self, store: &str) -> Result<(), DispatchError> {
        self.stop_run(store);
        if !self.stores.delete(store).await? {
            return Err(DispatchError::NotFound(store.to_string()));
        }
        self.progress.delete(store).await?;
        info!(store, "store deleted");
        Ok(())
    }
}
