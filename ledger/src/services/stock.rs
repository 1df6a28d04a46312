//! Balance reads and stock projections
//!
//! Balances are a materialized projection of the movement log; nothing here
//! mutates quantities. The only write is the administrative removal of a
//! zero-balance row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::{
    Location, LocationKind, PaginatedResponse, Pagination, PaginationMeta, ProductUnit,
    StockBalance,
};

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};

use super::StockRow;

/// Stock service: read-only balance views over the ledger's balance table.
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
    config: LedgerConfig,
}

/// Stock list projection with display names resolved.
#[derive(Debug, Clone, Serialize)]
pub struct StockListItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: ProductUnit,
    pub location: Location,
    pub location_name: String,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// A (product, location) pair where the stored balance disagrees with the
/// replayed movement log. An empty report means the projection is healthy.
#[derive(Debug, Clone, Serialize)]
pub struct ConservationBreak {
    pub product_id: Uuid,
    pub location: Location,
    pub ledger_quantity: Decimal,
    pub stored_quantity: Decimal,
}

#[derive(Debug, FromRow)]
struct StockListRow {
    id: Uuid,
    product_id: Uuid,
    product_name: String,
    unit: String,
    branch_id: Option<Uuid>,
    warehouse_id: Option<Uuid>,
    location_name: String,
    quantity: Decimal,
    updated_at: DateTime<Utc>,
}

impl StockListRow {
    fn into_item(self) -> AppResult<StockListItem> {
        let location = Location::from_column_pair(self.branch_id, self.warehouse_id)
            .map_err(|err| AppError::Internal(anyhow::Error::new(err)))?;
        Ok(StockListItem {
            id: self.id,
            product_id: self.product_id,
            product_name: self.product_name,
            unit: ProductUnit::from_code(&self.unit).unwrap_or_default(),
            location,
            location_name: self.location_name,
            quantity: self.quantity,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ConservationRow {
    product_id: Uuid,
    branch_id: Option<Uuid>,
    warehouse_id: Option<Uuid>,
    ledger_quantity: Decimal,
    stored_quantity: Decimal,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Current balance for a (product, location) pair. A pair with no stored
    /// row reads as zero.
    pub async fn get_balance(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        location: Location,
    ) -> AppResult<StockBalance> {
        self.check_product_visible(store_id, product_id).await?;
        self.check_location_visible(store_id, location).await?;

        let (branch_id, warehouse_id) = location.column_pair();
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, product_id, branch_id, warehouse_id, quantity, updated_at
            FROM stocks
            WHERE product_id = $1
              AND branch_id IS NOT DISTINCT FROM $2
              AND warehouse_id IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(StockBalance::from(row.into_stock()?)),
            None => Ok(StockBalance::empty(product_id, location)),
        }
    }

    /// List balances held at one location, ordered by product name.
    pub async fn list_for_location(
        &self,
        store_id: Uuid,
        location: Location,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<StockListItem>> {
        self.check_location_visible(store_id, location).await?;

        let pagination = pagination.clamped(self.config.max_per_page);
        let (branch_id, warehouse_id) = location.column_pair();

        let total_items = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM stocks s
            JOIN products p ON p.id = s.product_id
            WHERE p.store_id = $1
              AND s.branch_id IS NOT DISTINCT FROM $2
              AND s.warehouse_id IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(store_id)
        .bind(branch_id)
        .bind(warehouse_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, StockListRow>(
            r#"
            SELECT s.id, s.product_id, p.name AS product_name, p.unit,
                   s.branch_id, s.warehouse_id,
                   COALESCE(b.name, w.name, '') AS location_name,
                   s.quantity, s.updated_at
            FROM stocks s
            JOIN products p ON p.id = s.product_id
            LEFT JOIN branches b ON b.id = s.branch_id
            LEFT JOIN warehouses w ON w.id = s.warehouse_id
            WHERE p.store_id = $1
              AND s.branch_id IS NOT DISTINCT FROM $2
              AND s.warehouse_id IS NOT DISTINCT FROM $3
            ORDER BY p.name
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(store_id)
        .bind(branch_id)
        .bind(warehouse_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(|row| row.into_item())
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(pagination, total_items.max(0) as u64),
        })
    }

    /// List a product's balances across all locations of the store.
    pub async fn list_for_product(
        &self,
        store_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<StockListItem>> {
        self.check_product_visible(store_id, product_id).await?;

        let rows = sqlx::query_as::<_, StockListRow>(
            r#"
            SELECT s.id, s.product_id, p.name AS product_name, p.unit,
                   s.branch_id, s.warehouse_id,
                   COALESCE(b.name, w.name, '') AS location_name,
                   s.quantity, s.updated_at
            FROM stocks s
            JOIN products p ON p.id = s.product_id
            LEFT JOIN branches b ON b.id = s.branch_id
            LEFT JOIN warehouses w ON w.id = s.warehouse_id
            WHERE p.store_id = $1 AND s.product_id = $2
            ORDER BY location_name
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(|row| row.into_item()).collect()
    }

    /// Administrative removal of a stock row. Only zero-balance rows may be
    /// removed; balances themselves change only through movements.
    pub async fn remove_empty_stock(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        location: Location,
    ) -> AppResult<()> {
        let (branch_id, warehouse_id) = location.column_pair();
        let result = sqlx::query(
            r#"
            DELETE FROM stocks s
            USING products p
            WHERE p.id = s.product_id AND p.store_id = $1
              AND s.product_id = $2
              AND s.branch_id IS NOT DISTINCT FROM $3
              AND s.warehouse_id IS NOT DISTINCT FROM $4
              AND s.quantity = 0
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(branch_id)
        .bind(warehouse_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let existing = sqlx::query_scalar::<_, Decimal>(
                r#"
                SELECT s.quantity
                FROM stocks s
                JOIN products p ON p.id = s.product_id
                WHERE p.store_id = $1
                  AND s.product_id = $2
                  AND s.branch_id IS NOT DISTINCT FROM $3
                  AND s.warehouse_id IS NOT DISTINCT FROM $4
                "#,
            )
            .bind(store_id)
            .bind(product_id)
            .bind(branch_id)
            .bind(warehouse_id)
            .fetch_optional(&self.db)
            .await?;

            return Err(match existing {
                Some(quantity) => AppError::Conflict(format!(
                    "stock balance is {quantity}; only zero-balance rows can be removed"
                )),
                None => AppError::NotFound("Stock".to_string()),
            });
        }

        Ok(())
    }

    /// Compare the stored balances against a replay of the movement log and
    /// report every pair that disagrees.
    pub async fn check_conservation(&self, store_id: Uuid) -> AppResult<Vec<ConservationBreak>> {
        let rows = sqlx::query_as::<_, ConservationRow>(
            r#"
            WITH deltas AS (
                SELECT product_id, to_branch_id AS branch_id, to_warehouse_id AS warehouse_id,
                       quantity AS delta
                FROM stock_movements
                WHERE to_branch_id IS NOT NULL OR to_warehouse_id IS NOT NULL
                UNION ALL
                SELECT product_id, from_branch_id, from_warehouse_id, -quantity
                FROM stock_movements
                WHERE from_branch_id IS NOT NULL OR from_warehouse_id IS NOT NULL
            ),
            replayed AS (
                SELECT product_id, branch_id, warehouse_id, SUM(delta) AS ledger_quantity
                FROM deltas
                GROUP BY product_id, branch_id, warehouse_id
            )
            SELECT COALESCE(r.product_id, s.product_id) AS product_id,
                   COALESCE(r.branch_id, s.branch_id) AS branch_id,
                   COALESCE(r.warehouse_id, s.warehouse_id) AS warehouse_id,
                   COALESCE(r.ledger_quantity, 0) AS ledger_quantity,
                   COALESCE(s.quantity, 0) AS stored_quantity
            FROM replayed r
            FULL OUTER JOIN stocks s
              ON s.product_id = r.product_id
             AND s.branch_id IS NOT DISTINCT FROM r.branch_id
             AND s.warehouse_id IS NOT DISTINCT FROM r.warehouse_id
            JOIN products p ON p.id = COALESCE(r.product_id, s.product_id)
            WHERE p.store_id = $1
              AND COALESCE(r.ledger_quantity, 0) <> COALESCE(s.quantity, 0)
            ORDER BY product_id
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let location = Location::from_column_pair(row.branch_id, row.warehouse_id)
                    .map_err(|err| AppError::Internal(anyhow::Error::new(err)))?;
                Ok(ConservationBreak {
                    product_id: row.product_id,
                    location,
                    ledger_quantity: row.ledger_quantity,
                    stored_quantity: row.stored_quantity,
                })
            })
            .collect()
    }

    async fn check_product_visible(&self, store_id: Uuid, product_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND store_id = $2)",
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }

    async fn check_location_visible(&self, store_id: Uuid, location: Location) -> AppResult<()> {
        let (sql, entity) = match location.kind() {
            LocationKind::Branch => (
                "SELECT EXISTS(SELECT 1 FROM branches WHERE id = $1 AND store_id = $2)",
                "Branch",
            ),
            LocationKind::Warehouse => (
                "SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1 AND store_id = $2)",
                "Warehouse",
            ),
        };
        let exists = sqlx::query_scalar::<_, bool>(sql)
            .bind(location.id())
            .bind(store_id)
            .fetch_one(&self.db)
            .await?;

        if !exists {
            return Err(AppError::NotFound(entity.to_string()));
        }
        Ok(())
    }
}
