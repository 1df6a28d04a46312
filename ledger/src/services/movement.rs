//! Movement recording and history: the write path of the ledger
//!
//! Every balance change in the system goes through
//! [`MovementService::record_movement`]: validate the request, then apply the
//! log append and the balance update(s) as one transaction. Validation is
//! advisory; the transaction re-checks source sufficiency under row locks and
//! is the only authority on whether a movement is accepted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{
    validation, DateRange, Location, LocationKind, MovementType, PaginatedResponse, Pagination,
    PaginationMeta, ProductUnit, Stock, StockMovement,
};

use crate::audit::{AuditSink, MovementRecorded};
use crate::config::LedgerConfig;
use crate::error::{map_lock_error, AppError, AppResult};

/// Movement service: records inventory events and serves the movement log.
#[derive(Clone)]
pub struct MovementService {
    db: PgPool,
    audit: Arc<dyn AuditSink>,
    config: LedgerConfig,
}

/// Input for recording a stock movement
#[derive(Debug, Clone, Deserialize)]
pub struct RecordMovementInput {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub from_location: Option<Location>,
    pub to_location: Option<Location>,
    pub note: Option<String>,
}

/// A movement that has been applied, with the balance row(s) it touched.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedMovement {
    pub movement: StockMovement,
    pub stocks: Vec<Stock>,
}

/// Filters for listing movements
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    /// Matches movements touching this location on either side.
    pub location: Option<Location>,
    pub dates: Option<DateRange>,
}

/// Movement list projection with display names resolved.
#[derive(Debug, Clone, Serialize)]
pub struct MovementListItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: ProductUnit,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub from_location: Option<Location>,
    pub from_name: Option<String>,
    pub to_location: Option<Location>,
    pub to_name: Option<String>,
    pub note: Option<String>,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Shape-checked view of a movement request: exactly the locations the
/// movement type requires, nothing optional left to re-check downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementPlan {
    In { to: Location },
    Out { from: Location },
    Transfer { from: Location, to: Location },
}

impl MovementPlan {
    pub fn from_location(&self) -> Option<Location> {
        match self {
            MovementPlan::In { .. } => None,
            MovementPlan::Out { from } | MovementPlan::Transfer { from, .. } => Some(*from),
        }
    }

    pub fn to_location(&self) -> Option<Location> {
        match self {
            MovementPlan::Out { .. } => None,
            MovementPlan::In { to } | MovementPlan::Transfer { to, .. } => Some(*to),
        }
    }
}

/// Validate the storage-independent rules of a movement request: positive
/// quantity at ledger scale, location shape per movement type, and transfer
/// distinctness. Fails fast with the first violated rule; no side effects.
pub fn validate_structure(input: &RecordMovementInput) -> AppResult<MovementPlan> {
    if !validation::quantity_is_positive(input.quantity)
        || !validation::quantity_fits_scale(input.quantity)
    {
        return Err(AppError::InvalidQuantity);
    }

    let plan = match input.movement_type {
        MovementType::In => match (input.from_location, input.to_location) {
            (None, Some(to)) => MovementPlan::In { to },
            (Some(_), _) => {
                return Err(AppError::InvalidLocationShape {
                    detail: "an IN movement must not name a source location",
                })
            }
            (None, None) => {
                return Err(AppError::InvalidLocationShape {
                    detail: "an IN movement requires a destination location",
                })
            }
        },
        MovementType::Out => match (input.from_location, input.to_location) {
            (Some(from), None) => MovementPlan::Out { from },
            (_, Some(_)) => {
                return Err(AppError::InvalidLocationShape {
                    detail: "an OUT movement must not name a destination location",
                })
            }
            (None, None) => {
                return Err(AppError::InvalidLocationShape {
                    detail: "an OUT movement requires a source location",
                })
            }
        },
        MovementType::Transfer => match (input.from_location, input.to_location) {
            (Some(from), Some(to)) if from == to => return Err(AppError::NoOpTransfer),
            (Some(from), Some(to)) => MovementPlan::Transfer { from, to },
            _ => {
                return Err(AppError::InvalidLocationShape {
                    detail: "a transfer requires both source and destination locations",
                })
            }
        },
    };

    if let Some(note) = &input.note {
        validation::validate_note(note).map_err(|msg| AppError::Validation(msg.to_string()))?;
    }

    Ok(plan)
}

/// Row shape of the `stock_movements` table.
#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    movement_type: String,
    quantity: Decimal,
    from_branch_id: Option<Uuid>,
    from_warehouse_id: Option<Uuid>,
    to_branch_id: Option<Uuid>,
    to_warehouse_id: Option<Uuid>,
    note: Option<String>,
    actor_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl MovementRow {
    fn into_movement(self) -> AppResult<StockMovement> {
        let movement_type = MovementType::from_code(&self.movement_type).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "movement {} has unknown type {:?}",
                self.id,
                self.movement_type
            ))
        })?;
        let from_location =
            Location::from_optional_pair(self.from_branch_id, self.from_warehouse_id)
                .map_err(|err| AppError::Internal(anyhow::Error::new(err)))?;
        let to_location = Location::from_optional_pair(self.to_branch_id, self.to_warehouse_id)
            .map_err(|err| AppError::Internal(anyhow::Error::new(err)))?;
        Ok(StockMovement {
            id: self.id,
            product_id: self.product_id,
            movement_type,
            quantity: self.quantity,
            from_location,
            to_location,
            note: self.note,
            actor_id: self.actor_id,
            created_at: self.created_at,
        })
    }
}

/// Row for the movement list projection.
#[derive(Debug, FromRow)]
struct MovementListRow {
    id: Uuid,
    product_id: Uuid,
    product_name: String,
    unit: String,
    movement_type: String,
    quantity: Decimal,
    from_branch_id: Option<Uuid>,
    from_warehouse_id: Option<Uuid>,
    to_branch_id: Option<Uuid>,
    to_warehouse_id: Option<Uuid>,
    from_name: Option<String>,
    to_name: Option<String>,
    note: Option<String>,
    actor_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl MovementListRow {
    fn into_item(self) -> AppResult<MovementListItem> {
        let movement_type = MovementType::from_code(&self.movement_type).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "movement {} has unknown type {:?}",
                self.id,
                self.movement_type
            ))
        })?;
        let from_location =
            Location::from_optional_pair(self.from_branch_id, self.from_warehouse_id)
                .map_err(|err| AppError::Internal(anyhow::Error::new(err)))?;
        let to_location = Location::from_optional_pair(self.to_branch_id, self.to_warehouse_id)
            .map_err(|err| AppError::Internal(anyhow::Error::new(err)))?;
        Ok(MovementListItem {
            id: self.id,
            product_id: self.product_id,
            product_name: self.product_name,
            unit: ProductUnit::from_code(&self.unit).unwrap_or_default(),
            movement_type,
            quantity: self.quantity,
            from_location,
            from_name: self.from_name,
            to_location,
            to_name: self.to_name,
            note: self.note,
            actor_id: self.actor_id,
            created_at: self.created_at,
        })
    }
}

impl MovementService {
    /// Create a new MovementService instance
    pub fn new(db: PgPool, audit: Arc<dyn AuditSink>, config: LedgerConfig) -> Self {
        Self { db, audit, config }
    }

    /// Record a stock movement: validate, then atomically append the log
    /// entry and update the affected balance row(s). Returns the created
    /// movement and the balance rows after the change.
    ///
    /// Not idempotent: submitting the same arguments twice records two
    /// movements, because two identical-looking real-world events are two
    /// events. Callers needing retry deduplication must key it themselves.
    pub async fn record_movement(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: RecordMovementInput,
    ) -> AppResult<RecordedMovement> {
        let plan = validate_structure(&input)?;

        // Tenant ownership checks; the product lookup also yields the display
        // unit carried in insufficient-stock errors.
        let unit = self.product_unit(store_id, input.product_id).await?;
        for location in [plan.from_location(), plan.to_location()]
            .into_iter()
            .flatten()
        {
            self.check_location_owned(store_id, location).await?;
        }

        // Advisory sufficiency pre-check, read without locks: callers get a
        // fast, specific error before the transaction is opened. The locked
        // re-check inside apply() is the one that counts.
        if let Some(source) = plan.from_location() {
            let available = self.unlocked_balance(input.product_id, source).await?;
            if available < input.quantity {
                return Err(AppError::InsufficientStock { available, unit });
            }
        }

        let (movement_row, stock_rows) = self.apply(actor_id, &input, plan, unit).await?;

        let movement = movement_row.into_movement()?;
        let stocks = stock_rows
            .into_iter()
            .map(|row| row.into_stock())
            .collect::<AppResult<Vec<_>>>()?;

        tracing::info!(
            movement_id = %movement.id,
            store_id = %store_id,
            movement_type = movement.movement_type.as_str(),
            quantity = %movement.quantity,
            "stock movement accepted"
        );

        // Fire-and-forget: the movement is committed, audit delivery must not
        // undo it.
        let event = MovementRecorded {
            movement_id: movement.id,
            store_id,
            product_id: movement.product_id,
            movement_type: movement.movement_type,
            quantity: movement.quantity,
            from_location: movement.from_location,
            to_location: movement.to_location,
            actor_id: movement.actor_id,
            recorded_at: movement.created_at,
        };
        if let Err(err) = self.audit.movement_recorded(event).await {
            tracing::warn!(error = %err, movement_id = %movement.id, "audit sink rejected movement event");
        }

        Ok(RecordedMovement { movement, stocks })
    }

    /// Get a movement by id
    pub async fn get_movement(&self, store_id: Uuid, movement_id: Uuid) -> AppResult<StockMovement> {
        let row = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT m.id, m.product_id, m.movement_type, m.quantity,
                   m.from_branch_id, m.from_warehouse_id, m.to_branch_id, m.to_warehouse_id,
                   m.note, m.actor_id, m.created_at
            FROM stock_movements m
            JOIN products p ON p.id = m.product_id
            WHERE m.id = $1 AND p.store_id = $2
            "#,
        )
        .bind(movement_id)
        .bind(store_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Movement".to_string()))?;

        row.into_movement()
    }

    /// List movements for a store, newest first, with optional filters.
    pub async fn list_movements(
        &self,
        store_id: Uuid,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<MovementListItem>> {
        let pagination = pagination.clamped(self.config.max_per_page);

        let movement_type = filter.movement_type.map(|t| t.as_str());
        let (branch_id, warehouse_id) = match filter.location {
            Some(location) => location.column_pair(),
            None => (None, None),
        };
        let (date_start, date_end) = match filter.dates {
            Some(range) => (Some(range.start), Some(range.end)),
            None => (None, None),
        };

        let total_items = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM stock_movements m
            JOIN products p ON p.id = m.product_id
            WHERE p.store_id = $1
              AND ($2::uuid IS NULL OR m.product_id = $2)
              AND ($3::text IS NULL OR m.movement_type = $3)
              AND ($4::uuid IS NULL OR m.from_branch_id = $4 OR m.to_branch_id = $4)
              AND ($5::uuid IS NULL OR m.from_warehouse_id = $5 OR m.to_warehouse_id = $5)
              AND ($6::date IS NULL OR m.created_at >= $6)
              AND ($7::date IS NULL OR m.created_at < $7 + 1)
            "#,
        )
        .bind(store_id)
        .bind(filter.product_id)
        .bind(movement_type)
        .bind(branch_id)
        .bind(warehouse_id)
        .bind(date_start)
        .bind(date_end)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, MovementListRow>(
            r#"
            SELECT m.id, m.product_id, p.name AS product_name, p.unit,
                   m.movement_type, m.quantity,
                   m.from_branch_id, m.from_warehouse_id, m.to_branch_id, m.to_warehouse_id,
                   COALESCE(fb.name, fw.name) AS from_name,
                   COALESCE(tb.name, tw.name) AS to_name,
                   m.note, m.actor_id, m.created_at
            FROM stock_movements m
            JOIN products p ON p.id = m.product_id
            LEFT JOIN branches fb ON fb.id = m.from_branch_id
            LEFT JOIN warehouses fw ON fw.id = m.from_warehouse_id
            LEFT JOIN branches tb ON tb.id = m.to_branch_id
            LEFT JOIN warehouses tw ON tw.id = m.to_warehouse_id
            WHERE p.store_id = $1
              AND ($2::uuid IS NULL OR m.product_id = $2)
              AND ($3::text IS NULL OR m.movement_type = $3)
              AND ($4::uuid IS NULL OR m.from_branch_id = $4 OR m.to_branch_id = $4)
              AND ($5::uuid IS NULL OR m.from_warehouse_id = $5 OR m.to_warehouse_id = $5)
              AND ($6::date IS NULL OR m.created_at >= $6)
              AND ($7::date IS NULL OR m.created_at < $7 + 1)
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $8 OFFSET $9
            "#,
        )
        .bind(store_id)
        .bind(filter.product_id)
        .bind(movement_type)
        .bind(branch_id)
        .bind(warehouse_id)
        .bind(date_start)
        .bind(date_end)
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

    /// Apply the validated movement as one transaction: lock the affected
    /// stock row(s) in the deterministic location order, re-check source
    /// sufficiency under the lock, update balances, append the log entry.
    /// Either all three effects commit or none do.
    async fn apply(
        &self,
        actor_id: Uuid,
        input: &RecordMovementInput,
        plan: MovementPlan,
        unit: ProductUnit,
    ) -> AppResult<(MovementRow, Vec<super::StockRow>)> {
        let mut tx = self.db.begin().await?;

        // Bounded wait on row locks, scoped to this transaction.
        let set_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.config.lock_timeout().as_millis()
        );
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        let stock_rows = match plan {
            MovementPlan::In { to } => {
                // Create-if-absent and increment as one atomic statement; the
                // upsert takes the row lock itself.
                vec![credit_stock(&mut tx, input.product_id, to, input.quantity).await?]
            }
            MovementPlan::Out { from } => {
                let available = lock_balance(&mut tx, input.product_id, from)
                    .await?
                    .unwrap_or(Decimal::ZERO);
                if available < input.quantity {
                    tx.rollback().await?;
                    return Err(AppError::InsufficientStock { available, unit });
                }
                vec![debit_stock(&mut tx, input.product_id, from, input.quantity).await?]
            }
            MovementPlan::Transfer { from, to } => {
                // The destination row must exist before the ordered lock pass,
                // otherwise the upsert would acquire its lock out of order.
                ensure_stock_row(&mut tx, input.product_id, to).await?;

                // Lock both rows for the duration of the transaction, in the
                // Location order, so two opposite transfers on the same pair
                // serialize instead of deadlocking.
                let mut keys = [from, to];
                keys.sort();
                let mut available = Decimal::ZERO;
                for location in keys {
                    let balance = lock_balance(&mut tx, input.product_id, location)
                        .await?
                        .unwrap_or(Decimal::ZERO);
                    if location == from {
                        available = balance;
                    }
                }
                if available < input.quantity {
                    tx.rollback().await?;
                    return Err(AppError::InsufficientStock { available, unit });
                }

                let debited = debit_stock(&mut tx, input.product_id, from, input.quantity).await?;
                let credited =
                    add_to_stock(&mut tx, input.product_id, to, input.quantity).await?;
                vec![debited, credited]
            }
        };

        let movement_row = insert_movement(&mut tx, actor_id, input, plan).await?;

        tx.commit().await?;
        Ok((movement_row, stock_rows))
    }

    /// Look up the product's display unit, proving store ownership on the way.
    async fn product_unit(&self, store_id: Uuid, product_id: Uuid) -> AppResult<ProductUnit> {
        let unit = sqlx::query_scalar::<_, String>(
            "SELECT unit FROM products WHERE id = $1 AND store_id = $2",
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::CrossTenantReference { entity: "product" })?;

        Ok(ProductUnit::from_code(&unit).unwrap_or_default())
    }

    async fn check_location_owned(&self, store_id: Uuid, location: Location) -> AppResult<()> {
        let (sql, entity) = match location.kind() {
            LocationKind::Branch => (
                "SELECT EXISTS(SELECT 1 FROM branches WHERE id = $1 AND store_id = $2)",
                "branch",
            ),
            LocationKind::Warehouse => (
                "SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1 AND store_id = $2)",
                "warehouse",
            ),
        };
        let owned = sqlx::query_scalar::<_, bool>(sql)
            .bind(location.id())
            .bind(store_id)
            .fetch_one(&self.db)
            .await?;

        if !owned {
            return Err(AppError::CrossTenantReference { entity });
        }
        Ok(())
    }

    /// Current balance without taking a lock; a missing row reads as zero.
    async fn unlocked_balance(&self, product_id: Uuid, location: Location) -> AppResult<Decimal> {
        let (branch_id, warehouse_id) = location.column_pair();
        let quantity = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT quantity FROM stocks
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

        Ok(quantity.unwrap_or(Decimal::ZERO))
    }
}

/// Lock the stock row for a (product, location) pair and return its quantity;
/// `None` if no row exists yet.
async fn lock_balance(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    location: Location,
) -> AppResult<Option<Decimal>> {
    let (branch_id, warehouse_id) = location.column_pair();
    sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT quantity FROM stocks
        WHERE product_id = $1
          AND branch_id IS NOT DISTINCT FROM $2
          AND warehouse_id IS NOT DISTINCT FROM $3
        FOR UPDATE
        "#,
    )
    .bind(product_id)
    .bind(branch_id)
    .bind(warehouse_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_lock_error)
}

/// Upsert-increment for IN movements: create the row at the new quantity or
/// add to the existing one, atomically.
async fn credit_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    location: Location,
    quantity: Decimal,
) -> AppResult<super::StockRow> {
    let sql = match location.kind() {
        LocationKind::Branch => {
            r#"
            INSERT INTO stocks (product_id, branch_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, branch_id) WHERE branch_id IS NOT NULL
            DO UPDATE SET quantity = stocks.quantity + EXCLUDED.quantity, updated_at = now()
            RETURNING id, product_id, branch_id, warehouse_id, quantity, updated_at
            "#
        }
        LocationKind::Warehouse => {
            r#"
            INSERT INTO stocks (product_id, warehouse_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, warehouse_id) WHERE warehouse_id IS NOT NULL
            DO UPDATE SET quantity = stocks.quantity + EXCLUDED.quantity, updated_at = now()
            RETURNING id, product_id, branch_id, warehouse_id, quantity, updated_at
            "#
        }
    };

    sqlx::query_as::<_, super::StockRow>(sql)
        .bind(product_id)
        .bind(location.id())
        .bind(quantity)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_lock_error)
}

/// Create a zero-quantity row for the pair if none exists. Does not lock an
/// existing row.
async fn ensure_stock_row(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    location: Location,
) -> AppResult<()> {
    let sql = match location.kind() {
        LocationKind::Branch => {
            r#"
            INSERT INTO stocks (product_id, branch_id, quantity)
            VALUES ($1, $2, 0)
            ON CONFLICT (product_id, branch_id) WHERE branch_id IS NOT NULL
            DO NOTHING
            "#
        }
        LocationKind::Warehouse => {
            r#"
            INSERT INTO stocks (product_id, warehouse_id, quantity)
            VALUES ($1, $2, 0)
            ON CONFLICT (product_id, warehouse_id) WHERE warehouse_id IS NOT NULL
            DO NOTHING
            "#
        }
    };

    sqlx::query(sql)
        .bind(product_id)
        .bind(location.id())
        .execute(&mut **tx)
        .await
        .map_err(map_lock_error)?;
    Ok(())
}

async fn debit_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    location: Location,
    quantity: Decimal,
) -> AppResult<super::StockRow> {
    let (branch_id, warehouse_id) = location.column_pair();
    sqlx::query_as::<_, super::StockRow>(
        r#"
        UPDATE stocks
        SET quantity = quantity - $4, updated_at = now()
        WHERE product_id = $1
          AND branch_id IS NOT DISTINCT FROM $2
          AND warehouse_id IS NOT DISTINCT FROM $3
        RETURNING id, product_id, branch_id, warehouse_id, quantity, updated_at
        "#,
    )
    .bind(product_id)
    .bind(branch_id)
    .bind(warehouse_id)
    .bind(quantity)
    .fetch_one(&mut **tx)
    .await
    .map_err(map_lock_error)
}

async fn add_to_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    location: Location,
    quantity: Decimal,
) -> AppResult<super::StockRow> {
    let (branch_id, warehouse_id) = location.column_pair();
    sqlx::query_as::<_, super::StockRow>(
        r#"
        UPDATE stocks
        SET quantity = quantity + $4, updated_at = now()
        WHERE product_id = $1
          AND branch_id IS NOT DISTINCT FROM $2
          AND warehouse_id IS NOT DISTINCT FROM $3
        RETURNING id, product_id, branch_id, warehouse_id, quantity, updated_at
        "#,
    )
    .bind(product_id)
    .bind(branch_id)
    .bind(warehouse_id)
    .bind(quantity)
    .fetch_one(&mut **tx)
    .await
    .map_err(map_lock_error)
}

async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    actor_id: Uuid,
    input: &RecordMovementInput,
    plan: MovementPlan,
) -> AppResult<MovementRow> {
    let (from_branch_id, from_warehouse_id) = plan
        .from_location()
        .map(|location| location.column_pair())
        .unwrap_or((None, None));
    let (to_branch_id, to_warehouse_id) = plan
        .to_location()
        .map(|location| location.column_pair())
        .unwrap_or((None, None));

    let row = sqlx::query_as::<_, MovementRow>(
        r#"
        INSERT INTO stock_movements (
            product_id, movement_type, quantity,
            from_branch_id, from_warehouse_id, to_branch_id, to_warehouse_id,
            note, actor_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, product_id, movement_type, quantity,
                  from_branch_id, from_warehouse_id, to_branch_id, to_warehouse_id,
                  note, actor_id, created_at
        "#,
    )
    .bind(input.product_id)
    .bind(input.movement_type.as_str())
    .bind(input.quantity)
    .bind(from_branch_id)
    .bind(from_warehouse_id)
    .bind(to_branch_id)
    .bind(to_warehouse_id)
    .bind(&input.note)
    .bind(actor_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn input(
        movement_type: MovementType,
        quantity: Decimal,
        from: Option<Location>,
        to: Option<Location>,
    ) -> RecordMovementInput {
        RecordMovementInput {
            product_id: Uuid::from_u128(1),
            movement_type,
            quantity,
            from_location: from,
            to_location: to,
            note: None,
        }
    }

    #[test]
    fn quantity_check_runs_before_shape_check() {
        // Both rules are violated; the quantity rule wins.
        let err = validate_structure(&input(MovementType::In, Decimal::ZERO, None, None))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_QUANTITY");
    }

    #[test]
    fn plan_exposes_exactly_the_required_locations() {
        let branch = Location::Branch(Uuid::from_u128(2));
        let warehouse = Location::Warehouse(Uuid::from_u128(3));

        let plan =
            validate_structure(&input(MovementType::In, dec("1"), None, Some(branch))).unwrap();
        assert_eq!(plan, MovementPlan::In { to: branch });
        assert_eq!(plan.from_location(), None);
        assert_eq!(plan.to_location(), Some(branch));

        let plan = validate_structure(&input(
            MovementType::Transfer,
            dec("1"),
            Some(branch),
            Some(warehouse),
        ))
        .unwrap();
        assert_eq!(
            plan,
            MovementPlan::Transfer {
                from: branch,
                to: warehouse
            }
        );
    }

    #[test]
    fn transfer_between_same_id_different_kind_is_allowed() {
        // A branch and a warehouse sharing an id are still different places.
        let id = Uuid::from_u128(5);
        let result = validate_structure(&input(
            MovementType::Transfer,
            dec("1"),
            Some(Location::Branch(id)),
            Some(Location::Warehouse(id)),
        ));
        assert!(result.is_ok());
    }

    #[test]
    fn oversized_note_fails_validation() {
        let mut request = input(
            MovementType::In,
            dec("1"),
            None,
            Some(Location::Branch(Uuid::from_u128(2))),
        );
        request.note = Some("x".repeat(shared::validation::MAX_NOTE_LEN + 1));
        assert_eq!(
            validate_structure(&request).unwrap_err().code(),
            "VALIDATION_ERROR"
        );
    }
}
