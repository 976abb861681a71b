//! Quotation models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchased product line of an approved quotation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotationItem {
    pub quotation_id: Uuid,
    pub sku: String,
    /// Branch the goods are shipped from
    pub branch_id: Uuid,
    pub quantity: i32,
}

/// Quotation header fields needed for planning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quotation {
    pub id: Uuid,
    pub client_rut: String,
    pub status: String,
}
