//! Expansion of quotation items into indivisible physical units

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PlanningError;
use crate::models::{Product, QuotationItem};

/// Divisor that turns `length x width x height` into the volume unit used by
/// truck type capacities.
///
/// The default of 1,000,000 converts centimetre dimensions to cubic metres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct VolumeScale(Decimal);

impl VolumeScale {
    pub fn new(factor: Decimal) -> Result<Self, PlanningError> {
        if factor <= Decimal::ZERO {
            return Err(PlanningError::InvalidScaleFactor(factor));
        }
        Ok(Self(factor))
    }

    pub fn factor(&self) -> Decimal {
        self.0
    }

    /// `None` when the product of the dimensions leaves the `Decimal` range
    pub fn volume(&self, length: Decimal, width: Decimal, height: Decimal) -> Option<Decimal> {
        length
            .checked_mul(width)?
            .checked_mul(height)?
            .checked_div(self.0)
    }
}

impl Default for VolumeScale {
    fn default() -> Self {
        Self(Decimal::from(1_000_000))
    }
}

impl TryFrom<Decimal> for VolumeScale {
    type Error = PlanningError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VolumeScale> for Decimal {
    fn from(scale: VolumeScale) -> Self {
        scale.0
    }
}

/// Default ceiling on the units a single quotation may expand into
pub const DEFAULT_MAX_UNITS: usize = 100_000;

/// One physical instance of a product; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub sku: String,
    pub weight_kg: Decimal,
    pub volume_m3: Decimal,
    pub branch_id: Uuid,
}

/// Flatten quotation items into a unit sequence.
///
/// Item order is preserved, and each item contributes `quantity` identical
/// units in a row. Volume is computed once per distinct product. The total
/// is checked against `max_units` before anything is allocated.
pub fn expand_units(
    items: &[QuotationItem],
    products: &HashMap<String, Product>,
    scale: VolumeScale,
    max_units: usize,
) -> Result<Vec<Unit>, PlanningError> {
    if items.is_empty() {
        return Err(PlanningError::NoItems);
    }

    let requested = total_quantity(items);
    if requested > max_units as u64 {
        return Err(PlanningError::TooManyUnits {
            requested,
            limit: max_units,
        });
    }

    let mut volumes: HashMap<&str, Decimal> = HashMap::new();
    let mut units = Vec::with_capacity(requested as usize);

    for item in items {
        if item.quantity <= 0 {
            return Err(PlanningError::InvalidQuantity {
                sku: item.sku.clone(),
                quantity: item.quantity,
            });
        }

        let product = products
            .get(&item.sku)
            .ok_or_else(|| PlanningError::UnknownProduct {
                sku: item.sku.clone(),
            })?;

        let volume = match volumes.get(product.sku.as_str()) {
            Some(volume) => *volume,
            None => {
                let volume = product.unit_volume(scale)?;
                volumes.insert(product.sku.as_str(), volume);
                volume
            }
        };

        units.extend((0..item.quantity).map(|_| Unit {
            sku: product.sku.clone(),
            weight_kg: product.weight_kg,
            volume_m3: volume,
            branch_id: item.branch_id,
        }));
    }

    Ok(units)
}

fn total_quantity(items: &[QuotationItem]) -> u64 {
    items
        .iter()
        .map(|item| u64::try_from(item.quantity).unwrap_or(0))
        .sum()
}
