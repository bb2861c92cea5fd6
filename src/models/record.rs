use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One coerced source row, in destination column order.
///
/// `customer_id` and `description` are never empty: missing values are
/// replaced with their sentinels during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub invoice_id: String,
    pub stock_code: String,
    pub description: String,
    pub quantity: i64,
    pub invoice_timestamp: NaiveDateTime,
    pub unit_price: Decimal,
    pub customer_id: String,
    pub country: String,
}
