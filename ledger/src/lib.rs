//! Inventory ledger engine for the shop management platform.
//!
//! The ledger keeps one balance row per (product, location) pair and an
//! append-only log of the movements that produced those balances. Every
//! balance change in the system flows through [`services::MovementService`];
//! the balance table is a materialized projection of the movement log and can
//! always be rebuilt by replaying it from zero.
//!
//! The crate is a library boundary: authentication, authorization, entity
//! CRUD and HTTP routing live in the embedding application. Callers are
//! expected to arrive with a resolved store id (the tenant) and an actor id.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::{MovementService, StockService};
