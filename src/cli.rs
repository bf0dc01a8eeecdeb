//! Command-line surface over the run controller.
//!
//! Stands in for the web layer: each subcommand maps onto one operation of
//! the control surface (start, status, delete) or store configuration
//! management.

use crate::client::ShopifyClient;
use crate::controller::RunController;
use crate::error::DispatchError;
use crate::model::{DispatchConfig, RunEvent, StoreConfig};
use crate::registry::StoreRegistry;
use crate::storage::{ProgressStore, StoreConfigStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(
    name = "bulk-order-dispatch",
    version,
    about = "Throttled, cancellable bulk order submission to Shopify stores"
)]
pub struct Cli {
    /// Directory holding stores.json and progress.json
    /// (default: platform config dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a bulk order CSV for a store; Ctrl-C stops the run
    Run {
        /// Store name, as configured with add-store
        #[arg(long)]
        store: String,

        /// Path to the bulk order CSV file
        #[arg(long)]
        orders: PathBuf,

        /// Orders per batch (also the per-batch submission concurrency)
        #[arg(long, default_value_t = 1)]
        batch_size: usize,

        /// Pacing delay between batches
        #[arg(long, default_value = "15s")]
        delay: humantime::Duration,
    },

    /// Show progress records for all stores, or one
    Status {
        store: Option<String>,
    },

    /// Add or update a store's endpoint and credentials
    AddStore {
        store: String,

        /// Store hostname, e.g. example.myshopify.com
        #[arg(long)]
        url: String,

        #[arg(long)]
        api_key: String,

        #[arg(long)]
        api_password: String,
    },

    /// List configured stores
    Stores,

    /// Stop any active run, then purge the store's config and progress
    DeleteStore {
        store: String,
    },
}

fn data_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.data_dir {
        return Ok(dir.clone());
    }
    let base = dirs::config_dir().context("no platform config directory available")?;
    Ok(base.join("bulk-order-dispatch"))
}

fn build_controller(dir: &std::path::Path, dispatch_cfg: DispatchConfig) -> RunController {
    RunController::new(
        Arc::new(StoreRegistry::new()),
        Arc::new(StoreConfigStore::new(dir.join("stores.json"))),
        Arc::new(ProgressStore::new(dir.join("progress.json"))),
        dispatch_cfg,
        Box::new(|cfg: &StoreConfig| {
            Ok(Arc::new(ShopifyClient::new(cfg)?) as Arc<dyn crate::client::SubmissionClient>)
        }),
    )
}

pub async fn run(cli: Cli) -> Result<()> {
    let dir = data_dir(&cli)?;

    match cli.command {
        Command::Run {
            store,
            orders,
            batch_size,
            delay,
        } => {
            let cfg = DispatchConfig {
                batch_size,
                batch_delay: Duration::from(delay),
            };
            let controller = build_controller(&dir, cfg);
            run_store(&controller, &store, &orders).await
        }
        Command::Status { store } => {
            let controller = build_controller(&dir, DispatchConfig::default());
            match store {
                Some(name) => {
                    let record = controller.progress(&name).await?;
                    println!("{}", serde_json::to_string_pretty(&record)?);
                }
                None => {
                    let all = controller.all_progress().await;
                    println!("{}", serde_json::to_string_pretty(&all)?);
                }
            }
            Ok(())
        }
        Command::AddStore {
            store,
            url,
            api_key,
            api_password,
        } => {
            let stores = StoreConfigStore::new(dir.join("stores.json"));
            stores
                .upsert(
                    &store,
                    StoreConfig {
                        store_url: url,
                        api_key,
                        api_password,
                    },
                )
                .await
                .context("failed to save store configuration")?;
            println!("Saved store '{store}'");
            Ok(())
        }
        Command::Stores => {
            let stores = StoreConfigStore::new(dir.join("stores.json"));
            let mut names: Vec<String> = stores.list().await.into_keys().collect();
            names.sort();
            for name in names {
                println!("{name}");
            }
            Ok(())
        }
        Command::DeleteStore { store } => {
            let controller = build_controller(&dir, DispatchConfig::default());
            controller.delete_store(&store).await?;
            println!("Deleted store '{store}'");
            Ok(())
        }
    }
}

/// Drive one run to completion, streaming events to the terminal.
///
/// Ctrl-C requests a stop; the dispatcher honors it at the next batch
/// boundary, so the in-flight batch is allowed to finish.
async fn run_store(controller: &RunController, store: &str, orders_path: &std::path::Path) -> Result<()> {
    let orders = crate::ingest::read_orders_file(orders_path)
        .with_context(|| format!("failed to read orders from {}", orders_path.display()))?;
    if orders.is_empty() {
        anyhow::bail!("order file {} contains no orders", orders_path.display());
    }

    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<RunEvent>();
    let accepted = controller
        .start_run(store, orders, evt_tx)
        .await
        .map_err(|e| match e {
            DispatchError::NotFound(name) => {
                anyhow::anyhow!("store '{name}' is not configured; use add-store first")
            }
            other => anyhow::Error::from(other),
        })?;
    eprintln!(
        "Run {} accepted: {} orders in {} batches",
        accepted.run_id, accepted.total_orders, accepted.batches
    );

    let mut stop_requested = false;
    loop {
        tokio::select! {
            ev = evt_rx.recv() => {
                let Some(ev) = ev else { break };
                match ev {
                    RunEvent::RunStarted { .. } => {}
                    RunEvent::BatchStarted { index, orders } => {
                        eprintln!("== batch {} ({} orders) ==", index + 1, orders);
                    }
                    RunEvent::SkuUnresolved { sku } => {
                        eprintln!("SKU {sku}: no catalog entry, skipped");
                    }
                    RunEvent::SubmissionFailed { sku, variant_id, detail } => {
                        eprintln!("SKU {sku} variant {variant_id}: {detail}");
                    }
                    RunEvent::BatchCompleted { index, submitted, failed, pending } => {
                        eprintln!(
                            "batch {}: {} submitted, {} failed, {} orders pending",
                            index + 1, submitted, failed, pending
                        );
                    }
                    RunEvent::RunCancelled { store, pending } => {
                        println!("Run for '{store}' stopped with {pending} orders pending");
                    }
                    RunEvent::RunCompleted { store, failed_submissions } => {
                        if failed_submissions > 0 {
                            println!(
                                "Run for '{store}' completed; {failed_submissions} submissions failed"
                            );
                        } else {
                            println!("Run for '{store}' completed");
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c(), if !stop_requested => {
                eprintln!("Stop requested; finishing the in-flight batch…");
                controller.stop_run(store);
                stop_requested = true;
            }
        }
    }

    Ok(())
}
