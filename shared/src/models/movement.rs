//! Stock movement models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Location;

/// Kinds of inventory movements. IN and OUT cross the system boundary;
/// TRANSFER moves stock between two locations of the same store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    Transfer,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Transfer => "transfer",
        }
    }

    /// Parse the code stored in the database.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "in" => Some(MovementType::In),
            "out" => Some(MovementType::Out),
            "transfer" => Some(MovementType::Transfer),
            _ => None,
        }
    }
}

/// A single recorded inventory event. Immutable once created; to correct a
/// mistake, record a compensating movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub from_location: Option<Location>,
    pub to_location: Option<Location>,
    pub note: Option<String>,
    /// Who recorded the movement. Nullable because worker accounts outlive
    /// the ledger only as opaque references.
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// The signed balance deltas this movement applies, one per affected
    /// location: negative at the source, positive at the destination.
    pub fn deltas(&self) -> Vec<(Location, Decimal)> {
        let mut deltas = Vec::with_capacity(2);
        if let Some(from) = self.from_location {
            deltas.push((from, -self.quantity));
        }
        if let Some(to) = self.to_location {
            deltas.push((to, self.quantity));
        }
        deltas
    }
}
