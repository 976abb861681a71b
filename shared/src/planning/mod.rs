//! Dispatch planning: unit expansion, load packing and manifest aggregation
//!
//! Everything here is pure and synchronous. The backend wraps it with store
//! access and transactions; the WASM crate reuses it for browser previews.

mod manifest;
mod packer;
mod units;

pub use manifest::*;
pub use packer::*;
pub use units::*;

use rust_decimal::Decimal;

/// Errors raised by the pure planning steps
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanningError {
    #[error("quotation has no items to dispatch")]
    NoItems,

    #[error("product {sku} is not in the catalog")]
    UnknownProduct { sku: String },

    #[error("item {sku} has non-positive quantity {quantity}")]
    InvalidQuantity { sku: String, quantity: i32 },

    #[error("no truck type can carry {weight_kg} kg / {volume_m3} m3")]
    NoSuitableTruckType {
        weight_kg: Decimal,
        volume_m3: Decimal,
    },

    #[error("volume of product {sku} is out of range")]
    VolumeOverflow { sku: String },

    #[error("quotation expands to {requested} units, the limit is {limit}")]
    TooManyUnits { requested: u64, limit: usize },

    #[error("volume scale factor must be positive, got {0}")]
    InvalidScaleFactor(Decimal),
}
