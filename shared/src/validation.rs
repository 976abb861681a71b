//! Validation utilities for the Inventory Dispatch platform
//!
//! Includes Chile-specific checks (RUT tax ids) used by the back office.

use rust_decimal::Decimal;

use crate::models::TruckType;

// ============================================================================
// Dispatch Validations
// ============================================================================

/// Validate a monetary dispatch value (zero allowed, negative not)
pub fn validate_dispatch_value(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Dispatch value cannot be negative");
    }
    Ok(())
}

/// Validate a free-text address used as a distance query
pub fn validate_address_query(address: &str) -> Result<(), &'static str> {
    if address.trim().is_empty() {
        return Err("Address cannot be empty");
    }
    Ok(())
}

/// Validate that a truck type has usable capacities
pub fn validate_truck_type(truck_type: &TruckType) -> Result<(), &'static str> {
    if truck_type.max_weight_kg <= Decimal::ZERO {
        return Err("Truck type weight capacity must be positive");
    }
    if truck_type.max_volume_m3 <= Decimal::ZERO {
        return Err("Truck type volume capacity must be positive");
    }
    Ok(())
}

// ============================================================================
// Chile-Specific Validations
// ============================================================================

/// Validate a Chilean RUT with its mod-11 check digit
/// Accepts: 12.345.678-5, 12345678-5, 123456785
pub fn validate_rut(rut: &str) -> Result<(), &'static str> {
    let cleaned: String = rut
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .collect();

    let (body, check) = match cleaned.char_indices().last() {
        Some((0, _)) | None => return Err("RUT is too short"),
        Some((index, _)) => cleaned.split_at(index),
    };
    if body.len() > 8 || !body.chars().all(|c| c.is_ascii_digit()) {
        return Err("RUT body must be up to 8 digits");
    }

    let expected = rut_check_digit(body);
    if check.eq_ignore_ascii_case(&expected.to_string()) {
        Ok(())
    } else {
        Err("Invalid RUT check digit")
    }
}

/// Compute the RUT check digit for a numeric body
fn rut_check_digit(body: &str) -> char {
    let sum: u32 = body
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .zip([2, 3, 4, 5, 6, 7].into_iter().cycle())
        .map(|(digit, factor)| digit * factor)
        .sum();

    match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        d => char::from_digit(d, 10).unwrap_or('0'),
    }
}
