//! Audit event emission for accepted movements
//!
//! Audit persistence lives outside the ledger. After a movement commits, the
//! ledger hands a structured event to the configured sink; sink failures are
//! logged and swallowed so they can never roll back a recorded movement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use shared::{Location, MovementType};

/// Structured event describing one accepted movement.
#[derive(Debug, Clone, Serialize)]
pub struct MovementRecorded {
    pub movement_id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub from_location: Option<Location>,
    pub to_location: Option<Location>,
    pub actor_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Deliver one audit event. Called after the movement transaction has
    /// committed; the movement stands regardless of what happens here.
    async fn movement_recorded(&self, event: MovementRecorded) -> anyhow::Result<()>;
}

/// Default sink: logs the event and leaves persistence to the embedding
/// application's audit component.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn movement_recorded(&self, event: MovementRecorded) -> anyhow::Result<()> {
        tracing::info!(
            movement_id = %event.movement_id,
            store_id = %event.store_id,
            product_id = %event.product_id,
            movement_type = event.movement_type.as_str(),
            quantity = %event.quantity,
            actor_id = ?event.actor_id,
            "stock movement recorded"
        );
        Ok(())
    }
}
