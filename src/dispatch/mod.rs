//! Batch dispatch engine.
//!
//! Turns an ordered list of pending orders into a throttled, cancellable
//! sequence of concurrent submission batches, persisting progress after each
//! batch. Batches execute strictly in input order; submissions within a batch
//! are unordered and a single failure never cancels its siblings or the run.

use crate::client::{ClientError, SubmissionClient};
use crate::model::{now_rfc3339, CatalogMap, DispatchConfig, OrderRecord, ProgressRecord, RunEvent};
use crate::storage::ProgressStore;
use futures::{stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The list was exhausted; `failed_submissions` were rejected remotely.
    Completed { failed_submissions: u64 },
    /// Cancellation was observed at a batch boundary; `pending` orders remain.
    Cancelled { pending: u64 },
}

pub struct BatchDispatcher {
    store: String,
    cfg: DispatchConfig,
    client: Arc<dyn SubmissionClient>,
    progress: Arc<ProgressStore>,
}

impl BatchDispatcher {
    pub fn new(
        store: impl Into<String>,
        cfg: DispatchConfig,
        client: Arc<dyn SubmissionClient>,
        progress: Arc<ProgressStore>,
    ) -> Self {
        Self {
            store: store.into(),
            cfg,
            client,
            progress,
        }
    }

    /// Process the whole order list, or stop at the first batch boundary
    /// where cancellation is observed.
    ///
    /// The last-written progress record is the stopping point on
    /// cancellation; no "completed" state is written over it.
    pub async fn run(
        &self,
        orders: &[OrderRecord],
        catalog: &CatalogMap,
        token: CancellationToken,
        events: &UnboundedSender<RunEvent>,
    ) -> RunOutcome {
        let total = orders.len() as u64;
        let batch_size = self.cfg.batch_size.max(1);
        let mut processed = 0u64;
        let mut failed_total = 0u64;

        for (index, batch) in orders.chunks(batch_size).enumerate() {
            if token.is_cancelled() {
                let pending = total - processed;
                info!(store = %self.store, pending, "run cancelled, stopping before batch");
                let _ = events.send(RunEvent::RunCancelled {
                    store: self.store.clone(),
                    pending,
                });
                return RunOutcome::Cancelled { pending };
            }

            let _ = events.send(RunEvent::BatchStarted {
                index: index as u64,
                orders: batch.len() as u64,
            });

            let (submitted, failed) = self.submit_batch(batch, catalog, events).await;
            failed_total += failed;
            processed += batch.len() as u64;
            let pending = total - processed;

            // A store deleted mid-batch has already had its record purged;
            // writing here would resurrect it.
            if token.is_cancelled() {
                debug!(store = %self.store, pending, "run cancelled mid-batch, skipping progress write");
            } else if let Err(e) = self
                .progress
                .save(
                    &self.store,
                    ProgressRecord {
                        total_orders: total,
                        pending_orders: pending,
                        failed_submissions: failed_total,
                        last_order_time: now_rfc3339(),
                    },
                )
                .await
            {
                // Progress is best-effort durability; the run itself goes on.
                warn!(store = %self.store, error = %e, "failed to persist progress");
            }

            let _ = events.send(RunEvent::BatchCompleted {
                index: index as u64,
                submitted,
                failed,
                pending,
            });

            if pending > 0 {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!(store = %self.store, pending, "run cancelled during pacing delay");
                        let _ = events.send(RunEvent::RunCancelled {
                            store: self.store.clone(),
                            pending,
                        });
                        return RunOutcome::Cancelled { pending };
                    }
                    _ = tokio::time::sleep(self.cfg.batch_delay) => {}
                }
            }
        }

        info!(store = %self.store, total, failed_total, "run completed");
        let _ = events.send(RunEvent::RunCompleted {
            store: self.store.clone(),
            failed_submissions: failed_total,
        });
        RunOutcome::Completed {
            failed_submissions: failed_total,
        }
    }

    /// Fan out one submission per resolved variant and wait for all of them.
    ///
    /// Orders whose SKU has no catalog entry are skipped, not failed; they
    /// still count as processed for pacing and progress purposes.
    async fn submit_batch(
        &self,
        batch: &[OrderRecord],
        catalog: &CatalogMap,
        events: &UnboundedSender<RunEvent>,
    ) -> (u64, u64) {
        // One submission per resolved variant; concurrency is bounded by the
        // batch size, same as the pacing granularity.
        let mut jobs: Vec<(u64, &OrderRecord)> = Vec::new();
        for order in batch {
            let Some(variants) = catalog.get(&order.sku) else {
                debug!(store = %self.store, sku = order.sku, "sku has no catalog entry, skipping");
                let _ = events.send(RunEvent::SkuUnresolved { sku: order.sku });
                continue;
            };
            for &variant_id in variants {
                jobs.push((variant_id, order));
            }
        }

        let futures: Vec<_> = jobs
            .into_iter()
            .map(|(variant_id, order)| {
                let client = Arc::clone(&self.client);
                async move {
                    let res: Result<(), ClientError> = client.submit_order(variant_id, order).await;
                    (order.sku, variant_id, res)
                }
            })
            .collect();
        let mut results = stream::iter(futures).buffer_unordered(self.cfg.batch_size.max(1));

        let mut submitted = 0u64;
        let mut failed = 0u64;
        while let Some((sku, variant_id, res)) = results.next().await {
            match res {
                Ok(()) => submitted += 1,
                Err(e) => {
                    failed += 1;
                    warn!(store = %self.store, sku, variant_id, error = %e, "submission failed");
                    let _ = events.send(RunEvent::SubmissionFailed {
                        sku,
                        variant_id,
                        detail: e.to_string(),
                    });
                }
            }
        }
        (submitted, failed)
    }
}
