//! Catalog, branch and client address models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::planning::{PlanningError, VolumeScale};
use crate::types::PostalAddress;

/// A catalog product, keyed by SKU
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    /// Weight of one unit in kilograms
    pub weight_kg: Decimal,
    /// Linear dimensions in centimetres
    pub length_cm: Decimal,
    pub width_cm: Decimal,
    pub height_cm: Decimal,
    pub price: Decimal,
}

impl Product {
    /// Volume of one unit after applying the configured scale factor
    pub fn unit_volume(&self, scale: VolumeScale) -> Result<Decimal, PlanningError> {
        scale
            .volume(self.length_cm, self.width_cm, self.height_cm)
            .ok_or_else(|| PlanningError::VolumeOverflow {
                sku: self.sku.clone(),
            })
    }
}

/// A branch (store or warehouse) that holds stock and originates dispatches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
    pub address: PostalAddress,
}

/// A client's registered delivery address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientAddress {
    pub id: Uuid,
    /// Chilean tax id (RUT) of the owning client
    pub client_rut: String,
    pub address: PostalAddress,
    /// Only delivery addresses are used as dispatch destinations
    pub is_delivery: bool,
}
