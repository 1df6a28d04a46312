//! Locations where stock can be held

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical place stock can sit: a branch shopfront or a standalone
/// warehouse. Two locations are equal only if both the kind and the id match.
///
/// The derived ordering (branches before warehouses, then by id) is the order
/// in which the ledger acquires row locks; keep the variant order stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Location {
    Branch(Uuid),
    Warehouse(Uuid),
}

/// The kind tag of a [`Location`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Branch,
    Warehouse,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationKind::Branch => "branch",
            LocationKind::Warehouse => "warehouse",
        }
    }
}

/// A location column pair that violates the exactly-one-side storage
/// invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationColumnError {
    #[error("location columns reference neither a branch nor a warehouse")]
    Missing,
    #[error("location columns reference both a branch and a warehouse")]
    Ambiguous,
}

impl Location {
    pub fn kind(&self) -> LocationKind {
        match self {
            Location::Branch(_) => LocationKind::Branch,
            Location::Warehouse(_) => LocationKind::Warehouse,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Location::Branch(id) | Location::Warehouse(id) => *id,
        }
    }

    /// Split into the `(branch_id, warehouse_id)` nullable column pair used
    /// at the storage boundary.
    pub fn column_pair(&self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            Location::Branch(id) => (Some(*id), None),
            Location::Warehouse(id) => (None, Some(*id)),
        }
    }

    /// Rebuild a location from a storage column pair. Exactly one side must
    /// be set.
    pub fn from_column_pair(
        branch_id: Option<Uuid>,
        warehouse_id: Option<Uuid>,
    ) -> Result<Self, LocationColumnError> {
        match (branch_id, warehouse_id) {
            (Some(id), None) => Ok(Location::Branch(id)),
            (None, Some(id)) => Ok(Location::Warehouse(id)),
            (None, None) => Err(LocationColumnError::Missing),
            (Some(_), Some(_)) => Err(LocationColumnError::Ambiguous),
        }
    }

    /// Like [`Location::from_column_pair`], but an all-null pair reads as
    /// "no location" (movement rows leave the unused side null).
    pub fn from_optional_pair(
        branch_id: Option<Uuid>,
        warehouse_id: Option<Uuid>,
    ) -> Result<Option<Self>, LocationColumnError> {
        if branch_id.is_none() && warehouse_id.is_none() {
            return Ok(None);
        }
        Location::from_column_pair(branch_id, warehouse_id).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn same_id_different_kind_is_not_equal() {
        assert_ne!(Location::Branch(uid(1)), Location::Warehouse(uid(1)));
    }

    #[test]
    fn branches_lock_before_warehouses() {
        let mut locations = vec![Location::Warehouse(uid(1)), Location::Branch(uid(9))];
        locations.sort();
        assert_eq!(
            locations,
            vec![Location::Branch(uid(9)), Location::Warehouse(uid(1))]
        );
    }

    #[test]
    fn lock_order_is_direction_independent() {
        let a = Location::Branch(uid(3));
        let b = Location::Warehouse(uid(2));
        let mut forward = [a, b];
        let mut backward = [b, a];
        forward.sort();
        backward.sort();
        assert_eq!(forward, backward);
    }

    #[test]
    fn column_pair_round_trips() {
        for location in [Location::Branch(uid(7)), Location::Warehouse(uid(8))] {
            let (branch_id, warehouse_id) = location.column_pair();
            assert_eq!(
                Location::from_column_pair(branch_id, warehouse_id),
                Ok(location)
            );
        }
    }

    #[test]
    fn invalid_column_pairs_are_rejected() {
        assert_eq!(
            Location::from_column_pair(None, None),
            Err(LocationColumnError::Missing)
        );
        assert_eq!(
            Location::from_column_pair(Some(uid(1)), Some(uid(2))),
            Err(LocationColumnError::Ambiguous)
        );
    }

    #[test]
    fn optional_pair_treats_all_null_as_absent() {
        assert_eq!(Location::from_optional_pair(None, None), Ok(None));
        assert_eq!(
            Location::from_optional_pair(Some(uid(4)), None),
            Ok(Some(Location::Branch(uid(4))))
        );
        assert_eq!(
            Location::from_optional_pair(Some(uid(4)), Some(uid(5))),
            Err(LocationColumnError::Ambiguous)
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_column_pair_round_trips(n in any::<u128>(), warehouse in any::<bool>()) {
                let location = if warehouse {
                    Location::Warehouse(Uuid::from_u128(n))
                } else {
                    Location::Branch(Uuid::from_u128(n))
                };
                let (branch_id, warehouse_id) = location.column_pair();
                prop_assert_eq!(Location::from_column_pair(branch_id, warehouse_id), Ok(location));
            }

            #[test]
            fn prop_sort_is_stable_under_reversal(a in any::<u128>(), b in any::<u128>()) {
                let mut forward = [Location::Branch(Uuid::from_u128(a)), Location::Warehouse(Uuid::from_u128(b))];
                let mut backward = [forward[1], forward[0]];
                forward.sort();
                backward.sort();
                prop_assert_eq!(forward, backward);
            }
        }
    }
}
