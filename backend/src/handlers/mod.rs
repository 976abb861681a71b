//! HTTP handlers

pub mod dispatch;
pub mod distance;
pub mod health;

pub use dispatch::*;
pub use distance::*;
pub use health::*;
