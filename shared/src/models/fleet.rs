//! Truck fleet models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A class of truck with its load limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TruckType {
    pub id: Uuid,
    pub name: String,
    pub max_weight_kg: Decimal,
    pub max_volume_m3: Decimal,
}

impl TruckType {
    /// Whether a load with these totals fits within both limits
    pub fn fits(&self, weight_kg: Decimal, volume_m3: Decimal) -> bool {
        self.max_weight_kg >= weight_kg && self.max_volume_m3 >= volume_m3
    }
}

/// A physical truck
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Truck {
    pub id: Uuid,
    pub license_plate: String,
    pub truck_type_id: Uuid,
    pub active: bool,
}

/// Order truck types the way the packer expects them: ascending weight
/// capacity, then ascending volume, then id for a stable tie-break.
pub fn sort_truck_types(types: &mut [TruckType]) {
    types.sort_by(|a, b| {
        a.max_weight_kg
            .cmp(&b.max_weight_kg)
            .then(a.max_volume_m3.cmp(&b.max_volume_m3))
            .then(a.id.cmp(&b.id))
    });
}
