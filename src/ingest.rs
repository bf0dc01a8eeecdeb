//! Bulk order file ingestion.
//!
//! Parses the upload CSV into normalized [`OrderRecord`]s. Column names match
//! the upload template exactly (upper-case, space-separated).

use crate::model::OrderRecord;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("row {row}: quantity must be positive")]
    InvalidQuantity { row: u64 },
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "QUANTITY")]
    quantity: u32,
    #[serde(rename = "SKU")]
    sku: u64,
    #[serde(rename = "FIRST NAME")]
    first_name: String,
    #[serde(rename = "LAST NAME")]
    last_name: String,
    #[serde(rename = "PHONE")]
    phone: String,
    #[serde(rename = "ADDRESS 1")]
    address1: String,
    #[serde(rename = "ADDRESS 2", default)]
    address2: String,
    #[serde(rename = "CITY")]
    city: String,
    #[serde(rename = "STATE")]
    state: String,
    #[serde(rename = "PINCODE")]
    pincode: String,
    #[serde(rename = "PAYMENT STATUS")]
    payment_status: String,
}

impl From<CsvRow> for OrderRecord {
    fn from(row: CsvRow) -> Self {
        OrderRecord {
            quantity: row.quantity,
            sku: row.sku,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            address1: row.address1,
            address2: row.address2,
            city: row.city,
            state: row.state,
            pincode: row.pincode,
            payment_status: row.payment_status,
        }
    }
}

/// Read every order row from `reader`. Fails on the first malformed row;
/// a bulk file with bad rows should be fixed, not half-submitted.
pub fn read_orders<R: std::io::Read>(reader: R) -> Result<Vec<OrderRecord>, IngestError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut orders = Vec::new();
    for (idx, result) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        if row.quantity == 0 {
            // Header is line 1, first data row is line 2.
            return Err(IngestError::InvalidQuantity {
                row: idx as u64 + 2,
            });
        }
        orders.push(row.into());
    }
    Ok(orders)
}

pub fn read_orders_file(path: &Path) -> Result<Vec<OrderRecord>, IngestError> {
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    read_orders(file)
}
