//! `pricesync-recon` — Price reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tables, returns an update plan.
//! No CLI or file I/O dependencies.

pub mod columns;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod price_map;

pub use config::PriceSyncConfig;
pub use engine::{load_prices, plan_updates, reconcile, reconcile_prices, SourcePrices};
pub use error::ReconError;
pub use model::{CellValue, Reconciliation, SourceTable, TargetRow, TargetSheet, UpdatePlan};
pub use price_map::PriceMap;
