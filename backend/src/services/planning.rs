//! Dispatch planning engine
//!
//! Turns a quotation into dispatches: expands its items into units, packs
//! the units into truck loads, then writes one dispatch per load with its
//! manifest inside a single transaction. Distance enrichment runs after the
//! commit and never fails a plan.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use shared::models::{
    sort_truck_types, Dispatch, DispatchManifestLine, DispatchStatus, NewDispatch, Product,
    QuotationItem,
};
use shared::planning::{aggregate_by_sku, expand_units, pack_units, require_truck_type};
use shared::validation::{validate_address_query, validate_truck_type};
use uuid::Uuid;

use crate::config::PlanningConfig;
use crate::error::{AppError, AppResult};
use crate::external::{DistanceLookup, TravelEstimate};
use crate::store::PlanningStore;

/// Planning service shared by all requests
#[derive(Clone)]
pub struct PlanningService {
    store: Arc<dyn PlanningStore>,
    distance: Arc<dyn DistanceLookup>,
    config: PlanningConfig,
}

impl PlanningService {
    pub fn new(
        store: Arc<dyn PlanningStore>,
        distance: Arc<dyn DistanceLookup>,
        config: PlanningConfig,
    ) -> Self {
        Self {
            store,
            distance,
            config,
        }
    }

    /// Replace the quotation's dispatches with a fresh plan
    pub async fn plan_dispatches(&self, quotation_id: Uuid) -> AppResult<Vec<Dispatch>> {
        let quotation = self
            .store
            .quotation(quotation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quotation {}", quotation_id)))?;

        let items = self.store.quotation_items(quotation_id).await?;
        if items.is_empty() {
            return Err(AppError::NoItems { quotation_id });
        }

        let products = self.load_products(&items).await?;

        let destination = self
            .store
            .delivery_address(&quotation.client_rut)
            .await?
            .ok_or_else(|| AppError::NoDestination {
                client_rut: quotation.client_rut.clone(),
            })?;

        let units = expand_units(
            &items,
            &products,
            self.config.volume_scale_factor,
            self.config.max_units_per_quotation,
        )?;

        let mut truck_types = self.store.truck_types().await?;
        truck_types.retain(|truck_type| match validate_truck_type(truck_type) {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(truck_type = %truck_type.name, "Ignoring truck type: {}", reason);
                false
            }
        });
        sort_truck_types(&mut truck_types);

        let loads = pack_units(&units, &truck_types, self.config.packing_options());

        tracing::info!(
            %quotation_id,
            units = units.len(),
            loads = loads.len(),
            "Planning dispatches"
        );

        let scheduled_date = Utc::now() + Duration::days(self.config.dispatch_lead_days);
        let mut tx = self.store.begin().await?;

        let replaced = tx.delete_dispatches_for_quotation(quotation_id).await?;
        if replaced > 0 {
            tracing::debug!(%quotation_id, replaced, "Replacing existing dispatches");
        }

        let mut created = Vec::with_capacity(loads.len());

        for (index, load) in loads.iter().enumerate() {
            let truck_type = require_truck_type(load, &truck_types)?;

            let truck = tx
                .find_active_truck(truck_type.id)
                .await?
                .ok_or_else(|| AppError::NoActiveTruck {
                    truck_type_id: truck_type.id,
                    truck_type_name: truck_type.name.clone(),
                })?;

            let origin_branch_id = load
                .origin_branch()
                .ok_or_else(|| AppError::Internal("Packer produced an empty load".to_string()))?;

            tracing::debug!(
                load = index + 1,
                units = load.len(),
                weight_kg = %load.weight_kg(),
                volume_m3 = %load.volume_m3(),
                truck_type = %truck_type.name,
                truck = %truck.license_plate,
                "Load assigned"
            );

            let dispatch = tx
                .insert_dispatch(&NewDispatch {
                    quotation_id,
                    truck_id: truck.id,
                    origin_branch_id,
                    destination_address_id: destination.id,
                    scheduled_date,
                    status: DispatchStatus::Pendiente,
                    value: Decimal::ZERO,
                })
                .await?;

            for entry in aggregate_by_sku(load.units()) {
                tx.insert_manifest_line(&DispatchManifestLine {
                    dispatch_id: dispatch.id,
                    sku: entry.sku.clone(),
                    quantity: entry.quantity,
                })
                .await?;

                if self.config.decrement_stock {
                    let affected = tx
                        .decrement_stock(&entry.sku, origin_branch_id, entry.quantity)
                        .await?;
                    if affected == 0 {
                        return Err(AppError::InsufficientStock {
                            sku: entry.sku,
                            branch_id: origin_branch_id,
                        });
                    }
                }
            }

            created.push(dispatch);
        }

        tx.commit().await?;
        tracing::info!(%quotation_id, dispatches = created.len(), "Dispatch plan committed");

        for dispatch in created.iter_mut() {
            match self.enrich(dispatch).await {
                Ok(estimate) => {
                    dispatch.distance = Some(estimate.distance_text);
                    dispatch.duration = Some(estimate.duration_text);
                }
                Err(e) => {
                    tracing::warn!(dispatch_id = %dispatch.id, "Distance enrichment skipped: {}", e);
                }
            }
        }

        Ok(created)
    }

    /// Mark every dispatch of the quotation as approved
    pub async fn approve_dispatches(&self, quotation_id: Uuid) -> AppResult<u64> {
        self.apply_status(quotation_id, DispatchStatus::Aprobado)
            .await
    }

    /// Set the state of every dispatch of the quotation by name
    pub async fn set_dispatch_state(&self, quotation_id: Uuid, state: &str) -> AppResult<u64> {
        let status: DispatchStatus = state.parse()?;
        self.apply_status(quotation_id, status).await
    }

    async fn apply_status(&self, quotation_id: Uuid, status: DispatchStatus) -> AppResult<u64> {
        let affected = self.store.set_dispatch_status(quotation_id, status).await?;
        if affected == 0 {
            return Err(AppError::NotFound(format!(
                "Dispatches for quotation {}",
                quotation_id
            )));
        }

        tracing::info!(%quotation_id, %status, affected, "Dispatch state updated");
        Ok(affected)
    }

    /// Recompute and store the travel estimate of one dispatch
    pub async fn refresh_distance(&self, dispatch_id: Uuid) -> AppResult<Dispatch> {
        let mut dispatch = self
            .store
            .dispatch(dispatch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dispatch {}", dispatch_id)))?;

        let estimate = self.enrich(&dispatch).await?;
        dispatch.distance = Some(estimate.distance_text);
        dispatch.duration = Some(estimate.duration_text);
        Ok(dispatch)
    }

    /// Travel estimate between two free-text addresses
    pub async fn distance_between(
        &self,
        origin: &str,
        destination: &str,
    ) -> AppResult<TravelEstimate> {
        check_address("origin", origin)?;
        check_address("destination", destination)?;
        self.distance.travel_estimate(origin, destination).await
    }

    /// Fetch each distinct product of the items once
    async fn load_products(&self, items: &[QuotationItem]) -> AppResult<HashMap<String, Product>> {
        let mut products = HashMap::new();

        for item in items {
            if products.contains_key(&item.sku) {
                continue;
            }
            let product = self
                .store
                .product(&item.sku)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Product {}", item.sku)))?;
            products.insert(item.sku.clone(), product);
        }

        Ok(products)
    }

    async fn enrich(&self, dispatch: &Dispatch) -> AppResult<TravelEstimate> {
        let origin = self
            .store
            .branch(dispatch.origin_branch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Branch {}", dispatch.origin_branch_id)))?;

        let destination = self
            .store
            .client_address(dispatch.destination_address_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Address {}", dispatch.destination_address_id))
            })?;

        let origin = origin.address.one_line();
        let destination = destination.address.one_line();
        check_address("origin", &origin)?;
        check_address("destination", &destination)?;

        let estimate = self.distance.travel_estimate(&origin, &destination).await?;

        self.store
            .set_dispatch_travel(dispatch.id, &estimate.distance_text, &estimate.duration_text)
            .await?;

        Ok(estimate)
    }
}

fn check_address(field: &str, address: &str) -> AppResult<()> {
    validate_address_query(address).map_err(|msg| AppError::Validation {
        field: field.to_string(),
        message: msg.to_string(),
        message_es: "La dirección no puede estar vacía".to_string(),
    })
}
