//! Ledger services: the movement write path and the balance read paths

pub mod movement;
pub mod stock;

pub use movement::MovementService;
pub use stock::StockService;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use shared::{Location, Stock};

use crate::error::{AppError, AppResult};

/// Row shape of the `stocks` table.
#[derive(Debug, FromRow)]
pub(crate) struct StockRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl StockRow {
    pub(crate) fn into_stock(self) -> AppResult<Stock> {
        let location = Location::from_column_pair(self.branch_id, self.warehouse_id)
            .map_err(|err| AppError::Internal(anyhow::Error::new(err)))?;
        Ok(Stock {
            id: self.id,
            product_id: self.product_id,
            location,
            quantity: self.quantity,
            updated_at: self.updated_at,
        })
    }
}
