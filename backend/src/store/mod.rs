//! Storage seams for dispatch planning
//!
//! The planner only talks to the database through these traits, so the same
//! engine runs against PostgreSQL in production and an in-memory store in
//! tests. Dropping a [`DispatchTransaction`] without committing rolls it back.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgPlanningStore;

use shared::models::{
    Branch, ClientAddress, Dispatch, DispatchManifestLine, DispatchStatus, NewDispatch, Product,
    Quotation, QuotationItem, Truck, TruckType,
};
use uuid::Uuid;

use crate::error::AppResult;

/// Reads and single-statement writes used around a planning run
#[axum::async_trait]
pub trait PlanningStore: Send + Sync {
    async fn quotation(&self, quotation_id: Uuid) -> AppResult<Option<Quotation>>;

    /// Items of a quotation in insertion order
    async fn quotation_items(&self, quotation_id: Uuid) -> AppResult<Vec<QuotationItem>>;

    async fn product(&self, sku: &str) -> AppResult<Option<Product>>;

    /// Every truck type, ascending by max weight
    async fn truck_types(&self) -> AppResult<Vec<TruckType>>;

    /// The client's registered delivery address
    async fn delivery_address(&self, client_rut: &str) -> AppResult<Option<ClientAddress>>;

    async fn branch(&self, branch_id: Uuid) -> AppResult<Option<Branch>>;

    async fn client_address(&self, address_id: Uuid) -> AppResult<Option<ClientAddress>>;

    async fn dispatch(&self, dispatch_id: Uuid) -> AppResult<Option<Dispatch>>;

    /// Store distance and duration texts; returns rows affected
    async fn set_dispatch_travel(
        &self,
        dispatch_id: Uuid,
        distance: &str,
        duration: &str,
    ) -> AppResult<u64>;

    /// Set the status of every dispatch of a quotation; returns rows affected
    async fn set_dispatch_status(
        &self,
        quotation_id: Uuid,
        status: DispatchStatus,
    ) -> AppResult<u64>;

    async fn begin(&self) -> AppResult<Box<dyn DispatchTransaction>>;
}

/// Writes that must succeed or fail together
#[axum::async_trait]
pub trait DispatchTransaction: Send {
    /// Remove a quotation's dispatches and their manifest lines
    async fn delete_dispatches_for_quotation(&mut self, quotation_id: Uuid) -> AppResult<u64>;

    /// An active truck of the type, lowest license plate first
    async fn find_active_truck(&mut self, truck_type_id: Uuid) -> AppResult<Option<Truck>>;

    async fn insert_dispatch(&mut self, dispatch: &NewDispatch) -> AppResult<Dispatch>;

    async fn insert_manifest_line(&mut self, line: &DispatchManifestLine) -> AppResult<()>;

    /// Take `quantity` from a branch's stock. Returns 0 when the row is
    /// missing or holds less than requested.
    async fn decrement_stock(&mut self, sku: &str, branch_id: Uuid, quantity: i32)
        -> AppResult<u64>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
