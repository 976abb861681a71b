//! Greedy load packer
//!
//! A single forward pass over the unit sequence with one-step lookahead: each
//! unit is added to the current load, and if no truck type can carry the new
//! totals the unit is taken back out and opens the next load instead. There is
//! no backtracking, so the output depends only on the input order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PlanningError, Unit};
use crate::models::TruckType;

/// An ordered group of units travelling in one truck
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Load {
    units: Vec<Unit>,
    weight_kg: Decimal,
    volume_m3: Decimal,
}

impl Load {
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn weight_kg(&self) -> Decimal {
        self.weight_kg
    }

    pub fn volume_m3(&self) -> Decimal {
        self.volume_m3
    }

    /// Branch of the first unit; this is where the dispatch departs from
    pub fn origin_branch(&self) -> Option<Uuid> {
        self.units.first().map(|u| u.branch_id)
    }

    fn push(&mut self, unit: Unit) {
        self.weight_kg += unit.weight_kg;
        self.volume_m3 += unit.volume_m3;
        self.units.push(unit);
    }

    fn pop(&mut self) -> Option<Unit> {
        let unit = self.units.pop()?;
        self.weight_kg -= unit.weight_kg;
        self.volume_m3 -= unit.volume_m3;
        Some(unit)
    }
}

/// Knobs for the packer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingOptions {
    /// Close the current load whenever the next unit ships from another
    /// branch, so that every load has a single origin.
    pub split_by_branch: bool,
}

impl Default for PackingOptions {
    fn default() -> Self {
        Self {
            split_by_branch: true,
        }
    }
}

/// Whether any truck type can carry the given totals
pub fn any_truck_type_fits(truck_types: &[TruckType], weight_kg: Decimal, volume_m3: Decimal) -> bool {
    truck_types.iter().any(|t| t.fits(weight_kg, volume_m3))
}

/// Group units into loads.
///
/// A unit that fits no truck type on its own still gets a load of its own;
/// it is rejected later by [`select_truck_type`]. Empty loads are never
/// produced.
pub fn pack_units(units: &[Unit], truck_types: &[TruckType], options: PackingOptions) -> Vec<Load> {
    let mut loads = Vec::new();
    let mut current = Load::default();

    for unit in units {
        if options.split_by_branch
            && current.origin_branch().is_some_and(|branch| branch != unit.branch_id)
        {
            loads.push(std::mem::take(&mut current));
        }

        current.push(unit.clone());

        if !any_truck_type_fits(truck_types, current.weight_kg, current.volume_m3) {
            if let Some(overflow) = current.pop() {
                if !current.is_empty() {
                    loads.push(std::mem::take(&mut current));
                }
                current.push(overflow);
            }
        }
    }

    if !current.is_empty() {
        loads.push(current);
    }

    loads
}

/// Smallest truck type able to carry the load.
///
/// `truck_types` must be ordered ascending by weight capacity (see
/// [`crate::models::sort_truck_types`]); the first type that fits wins.
pub fn select_truck_type<'a>(load: &Load, truck_types: &'a [TruckType]) -> Option<&'a TruckType> {
    truck_types
        .iter()
        .find(|t| t.fits(load.weight_kg, load.volume_m3))
}

/// Like [`select_truck_type`], failing with the load's totals when none fits
pub fn require_truck_type<'a>(
    load: &Load,
    truck_types: &'a [TruckType],
) -> Result<&'a TruckType, PlanningError> {
    select_truck_type(load, truck_types).ok_or(PlanningError::NoSuitableTruckType {
        weight_kg: load.weight_kg,
        volume_m3: load.volume_m3,
    })
}

/// Per-load figures for previews and logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub unit_count: usize,
    pub weight_kg: Decimal,
    pub volume_m3: Decimal,
    pub origin_branch_id: Option<Uuid>,
    /// `None` when no truck type can carry the load
    pub truck_type_id: Option<Uuid>,
}

pub fn summarize_loads(loads: &[Load], truck_types: &[TruckType]) -> Vec<LoadSummary> {
    loads
        .iter()
        .map(|load| LoadSummary {
            unit_count: load.len(),
            weight_kg: load.weight_kg,
            volume_m3: load.volume_m3,
            origin_branch_id: load.origin_branch(),
            truck_type_id: select_truck_type(load, truck_types).map(|t| t.id),
        })
        .collect()
}
