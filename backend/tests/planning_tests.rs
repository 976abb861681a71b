//! Dispatch planning engine tests
//!
//! Runs the planner against the in-memory store and a scripted distance
//! lookup:
//! - Load packing and truck selection end to end
//! - Transactional replacement and rollback
//! - Distance enrichment never failing a plan
//! - Manifest conservation

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dispatch_backend::config::PlanningConfig;
use dispatch_backend::external::{DistanceLookup, TravelEstimate};
use dispatch_backend::services::PlanningService;
use dispatch_backend::store::{DispatchTransaction, MemoryStore, PlanningStore};
use dispatch_backend::{AppError, AppResult};
use proptest::prelude::*;
use chrono::Utc;
use rust_decimal::Decimal;
use shared::models::{
    Branch, ClientAddress, DispatchManifestLine, DispatchStatus, NewDispatch, Product, Quotation,
    QuotationItem, Truck, TruckType,
};
use shared::planning::{manifest_quantities, requested_quantities};
use shared::types::PostalAddress;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Fixtures
// ============================================================================

const CLIENT_RUT: &str = "12.345.678-5";

/// Distance lookup answering from a script
struct ScriptedLookup {
    result: Result<TravelEstimate, String>,
    calls: AtomicUsize,
    last_query: Mutex<Option<(String, String)>>,
}

impl ScriptedLookup {
    fn ok() -> Self {
        Self {
            result: Ok(TravelEstimate {
                distance_km: dec("18.2"),
                duration_min: 27,
                distance_text: "18,2 km".to_string(),
                duration_text: "27 min".to_string(),
            }),
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[axum::async_trait]
impl DistanceLookup for ScriptedLookup {
    async fn travel_estimate(&self, origin: &str, destination: &str) -> AppResult<TravelEstimate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some((origin.to_string(), destination.to_string()));
        match &self.result {
            Ok(estimate) => Ok(estimate.clone()),
            Err(message) => Err(AppError::DistanceLookup(message.clone())),
        }
    }
}

struct Fixture {
    store: MemoryStore,
    north: Uuid,
    south: Uuid,
    address_id: Uuid,
}

impl Fixture {
    /// Catalog, two branches, a client with a delivery address and trucks
    /// for a 100 kg / 1 m3 type. `with_big_type` adds a 500 kg / 5 m3 type.
    fn new(with_big_type: bool) -> Self {
        let store = MemoryStore::new();
        let north = Uuid::new_v4();
        let south = Uuid::new_v4();
        let small_type = Uuid::new_v4();
        let big_type = Uuid::new_v4();
        let address_id = Uuid::new_v4();

        // 100 x 10 x 100 cm = 0.1 m3
        store.add_product(product("BOX", "10", "100", "10", "100", "2500"));
        store.add_product(product("CRATE", "20", "100", "20", "100", "4000"));
        store.add_product(product("ANVIL", "900", "40", "30", "30", "99000"));

        store.add_branch(Branch {
            id: north,
            name: "Casa Matriz".to_string(),
            address: PostalAddress::new("Av. Matta 500", "Santiago Centro", "Santiago"),
        });
        store.add_branch(Branch {
            id: south,
            name: "Sucursal Maipú".to_string(),
            address: PostalAddress::new("Pajaritos 3000", "Maipú", "Santiago"),
        });

        store.add_client_address(ClientAddress {
            id: address_id,
            client_rut: CLIENT_RUT.to_string(),
            address: PostalAddress::new("Los Aromos 123", "", "Talagante"),
            is_delivery: true,
        });

        store.add_truck_type(TruckType {
            id: small_type,
            name: "Camioneta".to_string(),
            max_weight_kg: dec("100"),
            max_volume_m3: dec("1"),
        });
        store.add_truck(truck("AA-1000", small_type, false));
        store.add_truck(truck("CC-3000", small_type, true));
        store.add_truck(truck("BB-2000", small_type, true));

        if with_big_type {
            store.add_truck_type(TruckType {
                id: big_type,
                name: "Camión 3/4".to_string(),
                max_weight_kg: dec("500"),
                max_volume_m3: dec("5"),
            });
            store.add_truck(truck("ZZ-9000", big_type, true));
        }

        for branch in [north, south] {
            for sku in ["BOX", "CRATE", "ANVIL"] {
                store.set_stock(branch, sku, 1_000);
            }
        }

        Self {
            store,
            north,
            south,
            address_id,
        }
    }

    fn quotation(&self, items: &[(&str, Uuid, i32)]) -> Uuid {
        let quotation_id = Uuid::new_v4();
        self.store.add_quotation(
            Quotation {
                id: quotation_id,
                client_rut: CLIENT_RUT.to_string(),
                status: "aprobada".to_string(),
            },
            items
                .iter()
                .map(|(sku, branch_id, quantity)| QuotationItem {
                    quotation_id,
                    sku: sku.to_string(),
                    branch_id: *branch_id,
                    quantity: *quantity,
                })
                .collect(),
        );
        quotation_id
    }

    fn planner(&self, lookup: Arc<ScriptedLookup>) -> PlanningService {
        self.planner_with(lookup, PlanningConfig::default())
    }

    fn planner_with(&self, lookup: Arc<ScriptedLookup>, config: PlanningConfig) -> PlanningService {
        PlanningService::new(Arc::new(self.store.clone()), lookup, config)
    }

    fn new_dispatch(&self, quotation_id: Uuid) -> NewDispatch {
        NewDispatch {
            quotation_id,
            truck_id: Uuid::new_v4(),
            origin_branch_id: self.north,
            destination_address_id: self.address_id,
            scheduled_date: Utc::now(),
            status: DispatchStatus::Pendiente,
            value: Decimal::ZERO,
        }
    }

    /// Insert one dispatch carrying `quantity` BOX units from the north branch
    async fn stage_dispatch(
        &self,
        tx: &mut dyn DispatchTransaction,
        quotation_id: Uuid,
        quantity: i32,
    ) -> Uuid {
        tx.delete_dispatches_for_quotation(quotation_id)
            .await
            .unwrap();
        let dispatch = tx
            .insert_dispatch(&self.new_dispatch(quotation_id))
            .await
            .unwrap();
        tx.insert_manifest_line(&DispatchManifestLine {
            dispatch_id: dispatch.id,
            sku: "BOX".to_string(),
            quantity,
        })
        .await
        .unwrap();
        assert_eq!(
            tx.decrement_stock("BOX", self.north, quantity).await.unwrap(),
            1
        );
        dispatch.id
    }

    fn plate_of(&self, truck_id: Uuid) -> String {
        self.store
            .truck(truck_id)
            .map(|t| t.license_plate)
            .unwrap_or_default()
    }
}

fn product(sku: &str, weight: &str, l: &str, w: &str, h: &str, price: &str) -> Product {
    Product {
        sku: sku.to_string(),
        name: sku.to_string(),
        description: None,
        weight_kg: dec(weight),
        length_cm: dec(l),
        width_cm: dec(w),
        height_cm: dec(h),
        price: dec(price),
    }
}

fn truck(plate: &str, truck_type_id: Uuid, active: bool) -> Truck {
    Truck {
        id: Uuid::new_v4(),
        license_plate: plate.to_string(),
        truck_type_id,
        active,
    }
}

// ============================================================================
// Packing and Truck Selection
// ============================================================================

#[tokio::test]
async fn test_twelve_units_with_single_type_give_two_dispatches() {
    let fx = Fixture::new(false);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 12)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let dispatches = planner.plan_dispatches(quotation_id).await.unwrap();

    assert_eq!(dispatches.len(), 2);
    let first = fx.store.manifest_for(dispatches[0].id);
    let second = fx.store.manifest_for(dispatches[1].id);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].quantity, 10);
    assert_eq!(second[0].quantity, 2);

    for dispatch in &dispatches {
        assert_eq!(dispatch.status, DispatchStatus::Pendiente);
        assert_eq!(dispatch.value, Decimal::ZERO);
        assert_eq!(dispatch.origin_branch_id, fx.north);
        assert_eq!(dispatch.destination_address_id, fx.address_id);
        assert!(dispatch.scheduled_date > dispatch.created_at);
    }
}

#[tokio::test]
async fn test_larger_type_carries_twelve_units_in_one_dispatch() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 12)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let dispatches = planner.plan_dispatches(quotation_id).await.unwrap();

    assert_eq!(dispatches.len(), 1);
    assert_eq!(fx.plate_of(dispatches[0].truck_id), "ZZ-9000");
    assert_eq!(fx.store.manifest_for(dispatches[0].id)[0].quantity, 12);
}

#[tokio::test]
async fn test_lowest_active_plate_is_chosen() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 3)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let dispatches = planner.plan_dispatches(quotation_id).await.unwrap();

    // AA-1000 is inactive; BB-2000 sorts before CC-3000
    assert_eq!(dispatches.len(), 1);
    assert_eq!(fx.plate_of(dispatches[0].truck_id), "BB-2000");
}

#[tokio::test]
async fn test_manifest_lines_follow_first_appearance() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[
        ("CRATE", fx.north, 2),
        ("BOX", fx.north, 3),
        ("CRATE", fx.north, 1),
    ]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let dispatches = planner.plan_dispatches(quotation_id).await.unwrap();
    let lines = fx.store.manifest_for(dispatches[0].id);

    let summary: Vec<(&str, i32)> = lines.iter().map(|l| (l.sku.as_str(), l.quantity)).collect();
    assert_eq!(summary, vec![("CRATE", 3), ("BOX", 3)]);
}

#[tokio::test]
async fn test_each_product_fetched_once() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 3), ("BOX", fx.south, 2)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    planner.plan_dispatches(quotation_id).await.unwrap();

    assert_eq!(fx.store.product_lookups(), 1);
}

#[tokio::test]
async fn test_branches_are_split_into_separate_dispatches() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 2), ("BOX", fx.south, 3)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let dispatches = planner.plan_dispatches(quotation_id).await.unwrap();

    assert_eq!(dispatches.len(), 2);
    assert_eq!(dispatches[0].origin_branch_id, fx.north);
    assert_eq!(dispatches[1].origin_branch_id, fx.south);
    assert_eq!(fx.store.stock(fx.north, "BOX"), Some(998));
    assert_eq!(fx.store.stock(fx.south, "BOX"), Some(997));
}

#[tokio::test]
async fn test_mixed_branches_share_a_load_when_split_disabled() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 2), ("BOX", fx.south, 3)]);
    let config = PlanningConfig {
        split_loads_by_branch: false,
        decrement_stock: false,
        ..PlanningConfig::default()
    };
    let planner = fx.planner_with(Arc::new(ScriptedLookup::ok()), config);

    let dispatches = planner.plan_dispatches(quotation_id).await.unwrap();

    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].origin_branch_id, fx.north);
    assert_eq!(fx.store.stock(fx.north, "BOX"), Some(1_000));
}

// ============================================================================
// Failure Paths
// ============================================================================

#[tokio::test]
async fn test_quotation_without_items_fails() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.plan_dispatches(quotation_id).await;

    assert!(matches!(result, Err(AppError::NoItems { quotation_id: id }) if id == quotation_id));
    assert!(fx.store.dispatches_for(quotation_id).is_empty());
}

#[tokio::test]
async fn test_unknown_quotation_is_not_found() {
    let fx = Fixture::new(true);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.plan_dispatches(Uuid::new_v4()).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("GHOST", fx.north, 1)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.plan_dispatches(quotation_id).await;

    assert!(matches!(result, Err(AppError::NotFound(msg)) if msg.contains("GHOST")));
}

#[tokio::test]
async fn test_oversized_unit_fails_without_rows() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 2), ("ANVIL", fx.north, 1)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.plan_dispatches(quotation_id).await;

    assert!(matches!(
        result,
        Err(AppError::NoSuitableTruckType { weight_kg, .. }) if weight_kg == dec("900")
    ));
    assert!(fx.store.dispatches_for(quotation_id).is_empty());
    assert_eq!(fx.store.stock(fx.north, "BOX"), Some(1_000));
}

#[tokio::test]
async fn test_missing_delivery_address_fails() {
    let fx = Fixture::new(true);
    let quotation_id = Uuid::new_v4();
    fx.store.add_quotation(
        Quotation {
            id: quotation_id,
            client_rut: "11.111.111-1".to_string(),
            status: "aprobada".to_string(),
        },
        vec![QuotationItem {
            quotation_id,
            sku: "BOX".to_string(),
            branch_id: fx.north,
            quantity: 1,
        }],
    );
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.plan_dispatches(quotation_id).await;

    assert!(matches!(result, Err(AppError::NoDestination { client_rut }) if client_rut == "11.111.111-1"));
}

#[tokio::test]
async fn test_only_delivery_addresses_are_destinations() {
    let fx = Fixture::new(true);
    let billing_id = Uuid::new_v4();
    let rut = "11.111.111-1";
    fx.store.add_client_address(ClientAddress {
        id: billing_id,
        client_rut: rut.to_string(),
        address: PostalAddress::new("Huérfanos 1000", "Santiago Centro", "Santiago"),
        is_delivery: false,
    });
    let quotation_id = Uuid::new_v4();
    fx.store.add_quotation(
        Quotation {
            id: quotation_id,
            client_rut: rut.to_string(),
            status: "aprobada".to_string(),
        },
        vec![QuotationItem {
            quotation_id,
            sku: "BOX".to_string(),
            branch_id: fx.north,
            quantity: 1,
        }],
    );
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.plan_dispatches(quotation_id).await;
    assert!(matches!(result, Err(AppError::NoDestination { .. })));

    let delivery_id = Uuid::new_v4();
    fx.store.add_client_address(ClientAddress {
        id: delivery_id,
        client_rut: rut.to_string(),
        address: PostalAddress::new("Camino a Melipilla 200", "Padre Hurtado", "Santiago"),
        is_delivery: true,
    });

    let dispatches = planner.plan_dispatches(quotation_id).await.unwrap();
    assert_eq!(dispatches[0].destination_address_id, delivery_id);
}

#[tokio::test]
async fn test_quotation_over_unit_cap_fails_without_rows() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 30), ("CRATE", fx.south, 21)]);
    let planner = fx.planner_with(
        Arc::new(ScriptedLookup::ok()),
        PlanningConfig {
            max_units_per_quotation: 50,
            ..PlanningConfig::default()
        },
    );

    let result = planner.plan_dispatches(quotation_id).await;

    assert!(matches!(
        result,
        Err(AppError::TooManyUnits { requested: 51, limit: 50 })
    ));
    assert!(fx.store.dispatches_for(quotation_id).is_empty());
    assert_eq!(fx.store.stock(fx.north, "BOX"), Some(1_000));
}

#[tokio::test]
async fn test_out_of_range_volume_fails_without_rows() {
    let fx = Fixture::new(true);
    fx.store.add_product(product(
        "SILO",
        "10",
        "9999999999.99",
        "9999999999.99",
        "9999999999.99",
        "1",
    ));
    let quotation_id = fx.quotation(&[("SILO", fx.north, 1)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.plan_dispatches(quotation_id).await;

    assert!(matches!(result, Err(AppError::VolumeOverflow { sku }) if sku == "SILO"));
    assert!(fx.store.dispatches_for(quotation_id).is_empty());
}

#[tokio::test]
async fn test_type_without_active_truck_fails() {
    let fx = Fixture::new(false);
    let empty_type = Uuid::new_v4();
    fx.store.add_truck_type(TruckType {
        id: empty_type,
        name: "Rampla".to_string(),
        max_weight_kg: dec("28000"),
        max_volume_m3: dec("90"),
    });
    fx.store.add_truck(truck("RR-4000", empty_type, false));
    let quotation_id = fx.quotation(&[("ANVIL", fx.north, 1)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.plan_dispatches(quotation_id).await;

    assert!(matches!(
        result,
        Err(AppError::NoActiveTruck { truck_type_id, .. }) if truck_type_id == empty_type
    ));
    assert!(fx.store.dispatches_for(quotation_id).is_empty());
}

#[tokio::test]
async fn test_insufficient_stock_rolls_back_and_keeps_prior_plan() {
    let fx = Fixture::new(true);
    fx.store.set_stock(fx.north, "BOX", 12);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 12)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let first = planner.plan_dispatches(quotation_id).await.unwrap();
    assert_eq!(fx.store.stock(fx.north, "BOX"), Some(0));

    let result = planner.plan_dispatches(quotation_id).await;

    assert!(matches!(
        result,
        Err(AppError::InsufficientStock { ref sku, branch_id }) if sku == "BOX" && branch_id == fx.north
    ));

    let kept = fx.store.dispatches_for(quotation_id);
    let first_ids: Vec<Uuid> = first.iter().map(|d| d.id).collect();
    let kept_ids: Vec<Uuid> = kept.iter().map(|d| d.id).collect();
    assert_eq!(kept_ids, first_ids);
    assert_eq!(fx.store.manifest_for(first_ids[0])[0].quantity, 12);
    assert_eq!(fx.store.stock(fx.north, "BOX"), Some(0));
}

#[tokio::test]
async fn test_missing_stock_row_is_insufficient() {
    let fx = Fixture::new(true);
    let bare_branch = Uuid::new_v4();
    fx.store.add_branch(Branch {
        id: bare_branch,
        name: "Bodega Vacía".to_string(),
        address: PostalAddress::new("Camino Lonquén 10", "", ""),
    });
    let quotation_id = fx.quotation(&[("BOX", bare_branch, 1)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.plan_dispatches(quotation_id).await;

    assert!(matches!(result, Err(AppError::InsufficientStock { .. })));
}

// ============================================================================
// Replacement and Enrichment
// ============================================================================

#[tokio::test]
async fn test_replanning_replaces_previous_dispatches() {
    let fx = Fixture::new(false);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 12)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let first = planner.plan_dispatches(quotation_id).await.unwrap();
    let second = planner.plan_dispatches(quotation_id).await.unwrap();

    let stored = fx.store.dispatches_for(quotation_id);
    assert_eq!(stored.len(), second.len());
    assert!(stored.iter().all(|d| second.iter().any(|s| s.id == d.id)));
    assert!(first.iter().all(|d| fx.store.manifest_for(d.id).is_empty()));
}

#[tokio::test]
async fn test_distance_is_stored_after_commit() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 1)]);
    let lookup = Arc::new(ScriptedLookup::ok());
    let planner = fx.planner(lookup.clone());

    let dispatches = planner.plan_dispatches(quotation_id).await.unwrap();

    assert_eq!(dispatches[0].distance.as_deref(), Some("18,2 km"));
    let stored = &fx.store.dispatches_for(quotation_id)[0];
    assert_eq!(stored.duration.as_deref(), Some("27 min"));

    let query = lookup.last_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.0, "Av. Matta 500, Santiago Centro, Santiago");
    assert_eq!(query.1, "Los Aromos 123, Talagante");
}

#[tokio::test]
async fn test_distance_failure_keeps_plan() {
    let fx = Fixture::new(false);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 12)]);
    let lookup = Arc::new(ScriptedLookup::failing("OVER_QUERY_LIMIT"));
    let planner = fx.planner(lookup.clone());

    let dispatches = planner.plan_dispatches(quotation_id).await.unwrap();

    assert_eq!(dispatches.len(), 2);
    assert_eq!(lookup.calls(), 2);
    for dispatch in fx.store.dispatches_for(quotation_id) {
        assert!(dispatch.distance.is_none());
        assert!(!fx.store.manifest_for(dispatch.id).is_empty());
    }
}

#[tokio::test]
async fn test_refresh_distance_of_missing_dispatch() {
    let fx = Fixture::new(true);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.refresh_distance(Uuid::new_v4()).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_refresh_distance_surfaces_lookup_error() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 1)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::failing("ZERO_RESULTS")));
    let dispatches = planner.plan_dispatches(quotation_id).await.unwrap();

    let result = planner.refresh_distance(dispatches[0].id).await;

    assert!(matches!(result, Err(AppError::DistanceLookup(msg)) if msg == "ZERO_RESULTS"));
}

#[tokio::test]
async fn test_distance_between_rejects_blank_address() {
    let fx = Fixture::new(true);
    let lookup = Arc::new(ScriptedLookup::ok());
    let planner = fx.planner(lookup.clone());

    let result = planner.distance_between("  ", "Los Aromos 123").await;

    assert!(matches!(result, Err(AppError::Validation { field, .. }) if field == "origin"));
    assert_eq!(lookup.calls(), 0);
}

// ============================================================================
// Store Transactions
// ============================================================================

#[tokio::test]
async fn test_interleaved_transactions_keep_both_commits() {
    let fx = Fixture::new(true);
    let quotation_a = fx.quotation(&[("BOX", fx.north, 3)]);
    let quotation_b = fx.quotation(&[("BOX", fx.north, 4)]);

    let mut ta = fx.store.begin().await.unwrap();
    let mut tb = fx.store.begin().await.unwrap();
    let dispatch_a = fx.stage_dispatch(ta.as_mut(), quotation_a, 3).await;
    let dispatch_b = fx.stage_dispatch(tb.as_mut(), quotation_b, 4).await;
    ta.commit().await.unwrap();
    tb.commit().await.unwrap();

    let stored_a = fx.store.dispatches_for(quotation_a);
    let stored_b = fx.store.dispatches_for(quotation_b);
    assert_eq!(stored_a.len(), 1);
    assert_eq!(stored_b.len(), 1);
    assert_eq!(stored_a[0].id, dispatch_a);
    assert_eq!(fx.store.manifest_for(dispatch_a)[0].quantity, 3);
    assert_eq!(fx.store.manifest_for(dispatch_b)[0].quantity, 4);
    assert_eq!(fx.store.stock(fx.north, "BOX"), Some(1_000 - 3 - 4));
}

#[tokio::test]
async fn test_travel_written_during_open_transaction_survives_commit() {
    let fx = Fixture::new(true);
    let planned = fx.quotation(&[("BOX", fx.north, 1)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::failing("OVER_QUERY_LIMIT")));
    let dispatch_id = planner.plan_dispatches(planned).await.unwrap()[0].id;

    let other = fx.quotation(&[("BOX", fx.north, 2)]);
    let mut tx = fx.store.begin().await.unwrap();
    fx.stage_dispatch(tx.as_mut(), other, 2).await;
    fx.store
        .set_dispatch_travel(dispatch_id, "9,4 km", "15 min")
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let stored = fx.store.dispatch(dispatch_id).await.unwrap().unwrap();
    assert_eq!(stored.distance.as_deref(), Some("9,4 km"));
    assert_eq!(stored.duration.as_deref(), Some("15 min"));
    assert_eq!(fx.store.dispatches_for(other).len(), 1);
}

#[tokio::test]
async fn test_competing_transactions_cannot_oversell() {
    let fx = Fixture::new(true);
    fx.store.set_stock(fx.north, "BOX", 10);
    let quotation_a = fx.quotation(&[("BOX", fx.north, 8)]);
    let quotation_b = fx.quotation(&[("BOX", fx.north, 8)]);

    let mut ta = fx.store.begin().await.unwrap();
    let mut tb = fx.store.begin().await.unwrap();
    fx.stage_dispatch(ta.as_mut(), quotation_a, 8).await;
    fx.stage_dispatch(tb.as_mut(), quotation_b, 8).await;
    ta.commit().await.unwrap();
    let late = tb.commit().await;

    assert!(matches!(
        late,
        Err(AppError::InsufficientStock { ref sku, branch_id }) if sku == "BOX" && branch_id == fx.north
    ));
    assert_eq!(fx.store.dispatches_for(quotation_a).len(), 1);
    assert!(fx.store.dispatches_for(quotation_b).is_empty());
    assert_eq!(fx.store.stock(fx.north, "BOX"), Some(2));
}

#[tokio::test]
async fn test_dropped_transaction_leaves_no_trace() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 5)]);

    let mut tx = fx.store.begin().await.unwrap();
    fx.stage_dispatch(tx.as_mut(), quotation_id, 5).await;
    drop(tx);

    assert!(fx.store.dispatches_for(quotation_id).is_empty());
    assert_eq!(fx.store.stock(fx.north, "BOX"), Some(1_000));
}

// ============================================================================
// State Changes
// ============================================================================

#[tokio::test]
async fn test_approve_and_deliver() {
    let fx = Fixture::new(false);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 12)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));
    planner.plan_dispatches(quotation_id).await.unwrap();

    assert_eq!(planner.approve_dispatches(quotation_id).await.unwrap(), 2);
    assert!(fx
        .store
        .dispatches_for(quotation_id)
        .iter()
        .all(|d| d.status == DispatchStatus::Aprobado));

    planner
        .set_dispatch_state(quotation_id, "Entregado")
        .await
        .unwrap();
    assert!(fx
        .store
        .dispatches_for(quotation_id)
        .iter()
        .all(|d| d.status == DispatchStatus::Entregado));
}

#[tokio::test]
async fn test_unknown_state_is_rejected() {
    let fx = Fixture::new(true);
    let quotation_id = fx.quotation(&[("BOX", fx.north, 1)]);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));
    planner.plan_dispatches(quotation_id).await.unwrap();

    let result = planner.set_dispatch_state(quotation_id, "en_ruta").await;

    assert!(matches!(result, Err(AppError::InvalidState(state)) if state == "en_ruta"));
}

#[tokio::test]
async fn test_approve_without_dispatches_is_not_found() {
    let fx = Fixture::new(true);
    let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

    let result = planner.approve_dispatches(Uuid::new_v4()).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn items_strategy() -> impl Strategy<Value = Vec<(usize, bool, i32)>> {
    prop::collection::vec((0usize..2, any::<bool>(), 1i32..30), 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// Stored manifest quantities match the quotation for any committed plan
    #[test]
    fn prop_committed_plan_conserves_quantities(rows in items_strategy()) {
        let fx = Fixture::new(true);
        let items: Vec<(&str, Uuid, i32)> = rows
            .iter()
            .map(|(sku, north, quantity)| {
                let branch = if *north { fx.north } else { fx.south };
                (["BOX", "CRATE"][*sku], branch, *quantity)
            })
            .collect();
        let quotation_id = fx.quotation(&items);
        let planner = fx.planner(Arc::new(ScriptedLookup::ok()));

        let dispatches = tokio_test::block_on(planner.plan_dispatches(quotation_id)).unwrap();

        let lines: Vec<_> = dispatches
            .iter()
            .flat_map(|d| fx.store.manifest_for(d.id))
            .collect();
        let shipped = manifest_quantities(lines.iter().map(|l| (l.sku.as_str(), l.quantity)));

        let requested: Vec<QuotationItem> = items
            .iter()
            .map(|(sku, branch_id, quantity)| QuotationItem {
                quotation_id,
                sku: sku.to_string(),
                branch_id: *branch_id,
                quantity: *quantity,
            })
            .collect();
        prop_assert_eq!(shipped, requested_quantities(&requested));

        for dispatch in &dispatches {
            prop_assert!(fx.plate_of(dispatch.truck_id) != "AA-1000");
        }
    }
}
