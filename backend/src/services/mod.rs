//! Business logic services for the Inventory Dispatch platform

pub mod dispatch;
pub mod planning;

pub use dispatch::DispatchService;
pub use planning::PlanningService;
