//! Shared domain types for the shop management platform.
//!
//! This crate contains the inventory-ledger domain model shared between the
//! ledger engine and the components that embed it (API layer, reporting).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
