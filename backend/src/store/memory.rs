//! In-memory planning store
//!
//! Transactions read from a private snapshot taken at `begin` and record
//! their writes. Commit replays the writes onto the live state under the
//! lock, so overlapping transactions keep each other's work, and an
//! abandoned transaction leaves nothing behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use shared::models::{
    sort_truck_types, Branch, ClientAddress, Dispatch, DispatchManifestLine, DispatchStatus,
    NewDispatch, Product, Quotation, QuotationItem, Truck, TruckType,
};
use uuid::Uuid;

use super::{DispatchTransaction, PlanningStore};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct State {
    quotations: HashMap<Uuid, Quotation>,
    items: Vec<QuotationItem>,
    products: HashMap<String, Product>,
    truck_types: Vec<TruckType>,
    trucks: Vec<Truck>,
    branches: HashMap<Uuid, Branch>,
    /// Registration order stands in for `created_at`
    addresses: Vec<ClientAddress>,
    stock: HashMap<(Uuid, String), i32>,
    dispatches: Vec<Dispatch>,
    manifest: Vec<DispatchManifestLine>,
}

/// Thread-safe store holding everything in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    product_lookups: Arc<AtomicUsize>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product: Product) {
        lock(&self.state)
            .products
            .insert(product.sku.clone(), product);
    }

    pub fn add_truck_type(&self, truck_type: TruckType) {
        let mut state = lock(&self.state);
        state.truck_types.push(truck_type);
        sort_truck_types(&mut state.truck_types);
    }

    pub fn add_truck(&self, truck: Truck) {
        lock(&self.state).trucks.push(truck);
    }

    pub fn add_branch(&self, branch: Branch) {
        lock(&self.state).branches.insert(branch.id, branch);
    }

    pub fn add_client_address(&self, address: ClientAddress) {
        lock(&self.state).addresses.push(address);
    }

    pub fn add_quotation(&self, quotation: Quotation, items: Vec<QuotationItem>) {
        let mut state = lock(&self.state);
        state.items.extend(items);
        state.quotations.insert(quotation.id, quotation);
    }

    pub fn set_stock(&self, branch_id: Uuid, sku: &str, quantity: i32) {
        lock(&self.state)
            .stock
            .insert((branch_id, sku.to_string()), quantity);
    }

    /// Current stock, `None` when the branch never held the SKU
    pub fn stock(&self, branch_id: Uuid, sku: &str) -> Option<i32> {
        lock(&self.state)
            .stock
            .get(&(branch_id, sku.to_string()))
            .copied()
    }

    /// Committed dispatches of a quotation, in creation order
    pub fn dispatches_for(&self, quotation_id: Uuid) -> Vec<Dispatch> {
        lock(&self.state)
            .dispatches
            .iter()
            .filter(|d| d.quotation_id == quotation_id)
            .cloned()
            .collect()
    }

    /// Committed manifest lines of a dispatch, in insertion order
    pub fn manifest_for(&self, dispatch_id: Uuid) -> Vec<DispatchManifestLine> {
        lock(&self.state)
            .manifest
            .iter()
            .filter(|l| l.dispatch_id == dispatch_id)
            .cloned()
            .collect()
    }

    pub fn truck(&self, truck_id: Uuid) -> Option<Truck> {
        lock(&self.state)
            .trucks
            .iter()
            .find(|t| t.id == truck_id)
            .cloned()
    }

    /// Number of `product` calls served so far
    pub fn product_lookups(&self) -> usize {
        self.product_lookups.load(Ordering::SeqCst)
    }
}

#[axum::async_trait]
impl PlanningStore for MemoryStore {
    async fn quotation(&self, quotation_id: Uuid) -> AppResult<Option<Quotation>> {
        Ok(lock(&self.state).quotations.get(&quotation_id).cloned())
    }

    async fn quotation_items(&self, quotation_id: Uuid) -> AppResult<Vec<QuotationItem>> {
        Ok(lock(&self.state)
            .items
            .iter()
            .filter(|i| i.quotation_id == quotation_id)
            .cloned()
            .collect())
    }

    async fn product(&self, sku: &str) -> AppResult<Option<Product>> {
        self.product_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.state).products.get(sku).cloned())
    }

    async fn truck_types(&self) -> AppResult<Vec<TruckType>> {
        Ok(lock(&self.state).truck_types.clone())
    }

    async fn delivery_address(&self, client_rut: &str) -> AppResult<Option<ClientAddress>> {
        Ok(lock(&self.state)
            .addresses
            .iter()
            .find(|a| a.is_delivery && a.client_rut == client_rut)
            .cloned())
    }

    async fn branch(&self, branch_id: Uuid) -> AppResult<Option<Branch>> {
        Ok(lock(&self.state).branches.get(&branch_id).cloned())
    }

    async fn client_address(&self, address_id: Uuid) -> AppResult<Option<ClientAddress>> {
        Ok(lock(&self.state)
            .addresses
            .iter()
            .find(|a| a.id == address_id)
            .cloned())
    }

    async fn dispatch(&self, dispatch_id: Uuid) -> AppResult<Option<Dispatch>> {
        Ok(lock(&self.state)
            .dispatches
            .iter()
            .find(|d| d.id == dispatch_id)
            .cloned())
    }

    async fn set_dispatch_travel(
        &self,
        dispatch_id: Uuid,
        distance: &str,
        duration: &str,
    ) -> AppResult<u64> {
        let mut state = lock(&self.state);
        let mut affected = 0;
        for dispatch in state.dispatches.iter_mut().filter(|d| d.id == dispatch_id) {
            dispatch.distance = Some(distance.to_string());
            dispatch.duration = Some(duration.to_string());
            affected += 1;
        }
        Ok(affected)
    }

    async fn set_dispatch_status(
        &self,
        quotation_id: Uuid,
        status: DispatchStatus,
    ) -> AppResult<u64> {
        let mut state = lock(&self.state);
        let mut affected = 0;
        for dispatch in state
            .dispatches
            .iter_mut()
            .filter(|d| d.quotation_id == quotation_id)
        {
            dispatch.status = status;
            affected += 1;
        }
        Ok(affected)
    }

    async fn begin(&self) -> AppResult<Box<dyn DispatchTransaction>> {
        let working = lock(&self.state).clone();
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.state),
            working,
            writes: Vec::new(),
        }))
    }
}

/// A write recorded by an open transaction
#[derive(Debug)]
enum Write {
    DeleteQuotation(Uuid),
    Dispatch(Dispatch),
    ManifestLine(DispatchManifestLine),
    Decrement {
        branch_id: Uuid,
        sku: String,
        quantity: i32,
    },
}

impl State {
    fn delete_dispatches_for(&mut self, quotation_id: Uuid) -> u64 {
        let doomed: Vec<Uuid> = self
            .dispatches
            .iter()
            .filter(|d| d.quotation_id == quotation_id)
            .map(|d| d.id)
            .collect();

        self.dispatches.retain(|d| !doomed.contains(&d.id));
        self.manifest.retain(|l| !doomed.contains(&l.dispatch_id));

        doomed.len() as u64
    }

    /// Take `quantity` from the branch stock; false when there is not enough
    fn decrement(&mut self, branch_id: Uuid, sku: &str, quantity: i32) -> bool {
        match self.stock.get_mut(&(branch_id, sku.to_string())) {
            Some(available) if *available >= quantity => {
                *available -= quantity;
                true
            }
            _ => false,
        }
    }

    fn apply(&mut self, write: Write) -> AppResult<()> {
        match write {
            Write::DeleteQuotation(quotation_id) => {
                self.delete_dispatches_for(quotation_id);
            }
            Write::Dispatch(dispatch) => self.dispatches.push(dispatch),
            Write::ManifestLine(line) => self.manifest.push(line),
            Write::Decrement {
                branch_id,
                sku,
                quantity,
            } => {
                if !self.decrement(branch_id, &sku, quantity) {
                    return Err(AppError::InsufficientStock { sku, branch_id });
                }
            }
        }
        Ok(())
    }
}

struct MemoryTx {
    shared: Arc<Mutex<State>>,
    /// Snapshot from `begin` with this transaction's own writes applied
    working: State,
    writes: Vec<Write>,
}

#[axum::async_trait]
impl DispatchTransaction for MemoryTx {
    async fn delete_dispatches_for_quotation(&mut self, quotation_id: Uuid) -> AppResult<u64> {
        self.writes.push(Write::DeleteQuotation(quotation_id));
        Ok(self.working.delete_dispatches_for(quotation_id))
    }

    async fn find_active_truck(&mut self, truck_type_id: Uuid) -> AppResult<Option<Truck>> {
        Ok(self
            .working
            .trucks
            .iter()
            .filter(|t| t.active && t.truck_type_id == truck_type_id)
            .min_by(|a, b| a.license_plate.cmp(&b.license_plate))
            .cloned())
    }

    async fn insert_dispatch(&mut self, dispatch: &NewDispatch) -> AppResult<Dispatch> {
        let created = Dispatch {
            id: Uuid::new_v4(),
            quotation_id: dispatch.quotation_id,
            truck_id: dispatch.truck_id,
            origin_branch_id: dispatch.origin_branch_id,
            destination_address_id: dispatch.destination_address_id,
            scheduled_date: dispatch.scheduled_date,
            status: dispatch.status,
            value: dispatch.value,
            distance: None,
            duration: None,
            created_at: Utc::now(),
        };
        self.working.dispatches.push(created.clone());
        self.writes.push(Write::Dispatch(created.clone()));
        Ok(created)
    }

    async fn insert_manifest_line(&mut self, line: &DispatchManifestLine) -> AppResult<()> {
        self.working.manifest.push(line.clone());
        self.writes.push(Write::ManifestLine(line.clone()));
        Ok(())
    }

    async fn decrement_stock(
        &mut self,
        sku: &str,
        branch_id: Uuid,
        quantity: i32,
    ) -> AppResult<u64> {
        if !self.working.decrement(branch_id, sku, quantity) {
            return Ok(0);
        }
        self.writes.push(Write::Decrement {
            branch_id,
            sku: sku.to_string(),
            quantity,
        });
        Ok(1)
    }

    /// Replay the recorded writes on the live state. Stock is checked again
    /// against what other transactions committed in the meantime; if any
    /// decrement no longer fits, nothing is applied.
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { shared, writes, .. } = *self;
        let mut state = lock(&shared);

        let mut next = state.clone();
        for write in writes {
            next.apply(write)?;
        }
        *state = next;
        Ok(())
    }
}
