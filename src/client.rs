//! Remote commerce backend boundary.
//!
//! The dispatcher only ever talks to the backend through [`SubmissionClient`];
//! [`ShopifyClient`] is the production implementation against the Shopify
//! Admin API. Tests substitute their own recording implementations.

use crate::model::{CatalogMap, OrderRecord, StoreConfig};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const ADMIN_API_VERSION: &str = "2023-10";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The catalog could not be resolved; aborts a run before it starts.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// A single order-creation call failed. Non-fatal to the batch and run.
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
}

/// Capability the dispatcher is handed for one store: resolve the catalog
/// once, then submit orders one variant at a time.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn resolve_catalog(&self) -> Result<CatalogMap, ClientError>;

    async fn submit_order(&self, variant_id: u64, order: &OrderRecord) -> Result<(), ClientError>;
}

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    id: u64,
    #[serde(default)]
    variants: Vec<Variant>,
}

#[derive(Debug, Deserialize)]
struct Variant {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    order: Option<CreatedOrder>,
}

#[derive(Debug, Deserialize)]
struct CreatedOrder {
    id: u64,
}

/// Shopify Admin API client bound to one store's endpoint and credentials.
#[derive(Clone)]
pub struct ShopifyClient {
    http: reqwest::Client,
    store_url: String,
    api_key: String,
    api_password: String,
}

impl ShopifyClient {
    pub fn new(cfg: &StoreConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("bulk-order-dispatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::CatalogUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            store_url: cfg.store_url.clone(),
            api_key: cfg.api_key.clone(),
            api_password: cfg.api_password.clone(),
        })
    }

    fn admin_url(&self, resource: &str) -> String {
        format!(
            "https://{}/admin/api/{}/{}.json",
            self.store_url, ADMIN_API_VERSION, resource
        )
    }

    /// Shopify order payload: one line item per variant, customer plus
    /// billing/shipping address from the order record.
    fn order_body(variant_id: u64, order: &OrderRecord) -> serde_json::Value {
        let address = serde_json::json!({
            "first_name": order.first_name,
            "last_name": order.last_name,
            "address1": order.address1,
            "address2": order.address2,
            "city": order.city,
            "province": order.state,
            "zip": order.pincode,
            "phone": order.phone,
        });
        serde_json::json!({
            "order": {
                "line_items": [{
                    "variant_id": variant_id,
                    "quantity": order.quantity,
                }],
                "customer": {
                    "first_name": order.first_name,
                    "last_name": order.last_name,
                    "phone": order.phone,
                },
                "billing_address": address.clone(),
                "shipping_address": address,
                "financial_status": order.payment_status,
                "send_receipt": true,
                "send_fulfillment_receipt": true,
            }
        })
    }
}

#[async_trait]
impl SubmissionClient for ShopifyClient {
    async fn resolve_catalog(&self) -> Result<CatalogMap, ClientError> {
        let resp = self
            .http
            .get(self.admin_url("products"))
            .basic_auth(&self.api_key, Some(&self.api_password))
            .send()
            .await
            .map_err(|e| ClientError::CatalogUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClientError::CatalogUnavailable(format!(
                "products request returned {}",
                resp.status()
            )));
        }

        let products: ProductsResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::CatalogUnavailable(e.to_string()))?;

        let map: CatalogMap = products
            .products
            .into_iter()
            .map(|p| (p.id, p.variants.into_iter().map(|v| v.id).collect()))
            .collect();
        debug!(products = map.len(), "resolved catalog");
        Ok(map)
    }

    async fn submit_order(&self, variant_id: u64, order: &OrderRecord) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(self.admin_url("orders"))
            .basic_auth(&self.api_key, Some(&self.api_password))
            .json(&Self::order_body(variant_id, order))
            .send()
            .await
            .map_err(|e| ClientError::SubmissionFailed(e.to_string()))?;

        let status = resp.status();
        if status != reqwest::StatusCode::CREATED {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::SubmissionFailed(format!(
                "order request returned {status}: {body}"
            )));
        }

        let created: OrderResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::SubmissionFailed(e.to_string()))?;
        if let Some(o) = created.order {
            debug!(order_id = o.id, variant_id, "order created");
        }
        Ok(())
    }
}
