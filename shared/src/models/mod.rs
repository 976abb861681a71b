//! Domain models for the Inventory Dispatch platform

mod catalog;
mod dispatch;
mod fleet;
mod quotation;

pub use catalog::*;
pub use dispatch::*;
pub use fleet::*;
pub use quotation::*;
