//! WebAssembly module for the Inventory Dispatch platform
//!
//! Runs the dispatch packer in the browser so the back office can preview
//! how a quotation will be split into truck loads before planning it.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::planning::*;
pub use shared::types::*;

/// One quotation line as sent by the browser
#[derive(Debug, Deserialize)]
struct PreviewLine {
    sku: String,
    weight_kg: Decimal,
    length_cm: Decimal,
    width_cm: Decimal,
    height_cm: Decimal,
    quantity: i32,
    #[serde(default)]
    branch_id: Option<Uuid>,
}

fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

fn scale_from(factor: f64) -> Result<VolumeScale, JsValue> {
    let factor = Decimal::try_from(factor).map_err(|e| js_error("Invalid scale factor", e))?;
    VolumeScale::new(factor).map_err(|e| js_error("Invalid scale factor", e))
}

/// Preview the loads a quotation would be packed into.
///
/// `lines_json` is a list of `{sku, weight_kg, length_cm, width_cm,
/// height_cm, quantity, branch_id?}` and `truck_types_json` a list of truck
/// types. Returns a JSON list of load summaries; `truck_type_id` is null for
/// a load no truck type can carry.
#[wasm_bindgen]
pub fn preview_loads(
    lines_json: &str,
    truck_types_json: &str,
    volume_scale_factor: f64,
) -> Result<String, JsValue> {
    let lines: Vec<PreviewLine> =
        serde_json::from_str(lines_json).map_err(|e| js_error("Invalid lines JSON", e))?;
    let mut truck_types: Vec<TruckType> = serde_json::from_str(truck_types_json)
        .map_err(|e| js_error("Invalid truck types JSON", e))?;
    let scale = scale_from(volume_scale_factor)?;

    sort_truck_types(&mut truck_types);

    let mut products = HashMap::new();
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        items.push(QuotationItem {
            quotation_id: Uuid::nil(),
            sku: line.sku.clone(),
            branch_id: line.branch_id.unwrap_or_else(Uuid::nil),
            quantity: line.quantity,
        });
        products.entry(line.sku.clone()).or_insert(Product {
            sku: line.sku.clone(),
            name: line.sku,
            description: None,
            weight_kg: line.weight_kg,
            length_cm: line.length_cm,
            width_cm: line.width_cm,
            height_cm: line.height_cm,
            price: Decimal::ZERO,
        });
    }

    let units = expand_units(&items, &products, scale, DEFAULT_MAX_UNITS)
        .map_err(|e| js_error("Cannot expand", e))?;
    let loads = pack_units(&units, &truck_types, PackingOptions::default());
    let summaries = summarize_loads(&loads, &truck_types);

    #[cfg(target_arch = "wasm32")]
    {
        if summaries.iter().any(|s| s.truck_type_id.is_none()) {
            web_sys::console::warn_1(&JsValue::from_str("Some loads fit no truck type"));
        }
    }

    serde_json::to_string(&summaries).map_err(|e| js_error("Cannot serialize", e))
}

/// Same as [`preview_loads`], parsed into a JavaScript value
#[wasm_bindgen]
pub fn preview_loads_object(
    lines_json: &str,
    truck_types_json: &str,
    volume_scale_factor: f64,
) -> Result<JsValue, JsValue> {
    let json = preview_loads(lines_json, truck_types_json, volume_scale_factor)?;
    js_sys::JSON::parse(&json)
}

/// Volume of one unit with the given dimensions
#[wasm_bindgen]
pub fn unit_volume(
    length_cm: f64,
    width_cm: f64,
    height_cm: f64,
    volume_scale_factor: f64,
) -> Result<f64, JsValue> {
    let scale = scale_from(volume_scale_factor)?;
    let dims = [length_cm, width_cm, height_cm]
        .into_iter()
        .map(Decimal::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| js_error("Invalid dimension", e))?;

    let volume = scale
        .volume(dims[0], dims[1], dims[2])
        .ok_or_else(|| JsValue::from_str("Volume is out of range"))?;
    Ok(volume.to_string().parse().unwrap_or(0.0))
}

/// Validate a Chilean RUT
#[wasm_bindgen]
pub fn is_valid_rut(rut: &str) -> bool {
    shared::validation::validate_rut(rut).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: &str = r#"[
        {"id": "00000000-0000-0000-0000-000000000002", "name": "3/4", "max_weight_kg": "500", "max_volume_m3": "5"},
        {"id": "00000000-0000-0000-0000-000000000001", "name": "Camioneta", "max_weight_kg": "100", "max_volume_m3": "1"}
    ]"#;

    #[test]
    fn test_preview_picks_smallest_type() {
        let lines = r#"[{"sku": "BOX", "weight_kg": "10", "length_cm": "100", "width_cm": "10", "height_cm": "100", "quantity": 10}]"#;

        let json = preview_loads(lines, TYPES, 1_000_000.0).unwrap();
        let summaries: Vec<LoadSummary> = serde_json::from_str(&json).unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].unit_count, 10);
        assert_eq!(summaries[0].truck_type_id, Some(Uuid::from_u128(1)));
    }

    #[test]
    fn test_preview_reports_oversized_load() {
        let lines = r#"[{"sku": "ANVIL", "weight_kg": "900", "length_cm": "40", "width_cm": "30", "height_cm": "30", "quantity": 1}]"#;

        let json = preview_loads(lines, TYPES, 1_000_000.0).unwrap();
        let summaries: Vec<LoadSummary> = serde_json::from_str(&json).unwrap();

        assert_eq!(summaries[0].truck_type_id, None);
    }

    #[test]
    fn test_unit_volume() {
        let volume = unit_volume(100.0, 100.0, 100.0, 1_000_000.0).unwrap();
        assert!((volume - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rut_check() {
        assert!(is_valid_rut("12.345.678-5"));
        assert!(!is_valid_rut("12.345.678-9"));
        assert!(!is_valid_rut("12345678é"));
    }
}
