//! Per-SKU aggregation of a load's units

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Unit;
use crate::models::QuotationItem;

/// Quantity of one SKU within a load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub sku: String,
    pub quantity: i32,
}

/// Count units by SKU, in order of first appearance
pub fn aggregate_by_sku(units: &[Unit]) -> Vec<ManifestEntry> {
    let mut entries: Vec<ManifestEntry> = Vec::new();

    for unit in units {
        match entries.iter_mut().find(|e| e.sku == unit.sku) {
            Some(entry) => entry.quantity += 1,
            None => entries.push(ManifestEntry {
                sku: unit.sku.clone(),
                quantity: 1,
            }),
        }
    }

    entries
}

/// Total requested quantity per SKU across quotation items
pub fn requested_quantities(items: &[QuotationItem]) -> BTreeMap<String, i64> {
    let mut totals = BTreeMap::new();
    for item in items {
        *totals.entry(item.sku.clone()).or_insert(0) += i64::from(item.quantity);
    }
    totals
}

/// Total quantity per SKU across manifest entries
pub fn manifest_quantities<'a>(
    entries: impl IntoIterator<Item = (&'a str, i32)>,
) -> BTreeMap<String, i64> {
    let mut totals = BTreeMap::new();
    for (sku, quantity) in entries {
        *totals.entry(sku.to_string()).or_insert(0) += i64::from(quantity);
    }
    totals
}
