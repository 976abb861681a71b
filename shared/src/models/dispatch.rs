//! Dispatch and manifest models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a dispatch
///
/// Stored and serialized with the Spanish names the back office uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    #[default]
    Pendiente,
    Aprobado,
    Entregado,
}

impl DispatchStatus {
    pub const ALL: [DispatchStatus; 3] = [
        DispatchStatus::Pendiente,
        DispatchStatus::Aprobado,
        DispatchStatus::Entregado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Pendiente => "pendiente",
            DispatchStatus::Aprobado => "aprobado",
            DispatchStatus::Entregado => "entregado",
        }
    }
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a state name is not one of the known dispatch states
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dispatch state '{0}' (expected pendiente, aprobado or entregado)")]
pub struct UnknownDispatchStatus(pub String);

impl std::str::FromStr for DispatchStatus {
    type Err = UnknownDispatchStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        DispatchStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownDispatchStatus(s.to_string()))
    }
}

/// A persisted dispatch: one truck trip carrying one load
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dispatch {
    pub id: Uuid,
    pub quotation_id: Uuid,
    pub truck_id: Uuid,
    pub origin_branch_id: Uuid,
    pub destination_address_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub status: DispatchStatus,
    pub value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a dispatch about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewDispatch {
    pub quotation_id: Uuid,
    pub truck_id: Uuid,
    pub origin_branch_id: Uuid,
    pub destination_address_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub status: DispatchStatus,
    pub value: Decimal,
}

/// Per-SKU quantity carried by a dispatch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchManifestLine {
    pub dispatch_id: Uuid,
    pub sku: String,
    pub quantity: i32,
}
