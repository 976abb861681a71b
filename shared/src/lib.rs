//! Shared types and planning logic for the Inventory Dispatch platform
//!
//! This crate contains the domain models and the pure dispatch planning
//! algorithms shared between the backend, the browser preview (via WASM),
//! and the test suites.

pub mod models;
pub mod planning;
pub mod types;
pub mod validation;

pub use models::*;
pub use planning::*;
pub use types::*;
pub use validation::*;
