//! Stock balance models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Location;

/// Current balance of one product at one location. One row per
/// (product, location) pair; rows are created lazily by the first movement
/// touching the pair and only ever mutated by the movement applicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub id: Uuid,
    pub product_id: Uuid,
    pub location: Location,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Balance view for a (product, location) pair. A pair with no stored row
/// reads as a zero balance with no mutation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockBalance {
    pub product_id: Uuid,
    pub location: Location,
    pub quantity: Decimal,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockBalance {
    /// The zero balance reported for a pair with no stored row.
    pub fn empty(product_id: Uuid, location: Location) -> Self {
        Self {
            product_id,
            location,
            quantity: Decimal::ZERO,
            updated_at: None,
        }
    }
}

impl From<Stock> for StockBalance {
    fn from(stock: Stock) -> Self {
        Self {
            product_id: stock.product_id,
            location: stock.location,
            quantity: stock.quantity,
            updated_at: Some(stock.updated_at),
        }
    }
}
