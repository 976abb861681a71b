//! Error handling for the Inventory Dispatch platform
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::UnknownDispatchStatus;
use shared::planning::PlanningError;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Planning errors
    #[error("Quotation {quotation_id} has no items to dispatch")]
    NoItems { quotation_id: Uuid },

    #[error("Client {client_rut} has no registered delivery address")]
    NoDestination { client_rut: String },

    #[error("No truck type can carry a load of {weight_kg} kg / {volume_m3} m3")]
    NoSuitableTruckType {
        weight_kg: Decimal,
        volume_m3: Decimal,
    },

    #[error("No active truck available of type {truck_type_name} ({truck_type_id})")]
    NoActiveTruck {
        truck_type_id: Uuid,
        truck_type_name: String,
    },

    #[error("Insufficient stock of product {sku} at branch {branch_id}")]
    InsufficientStock { sku: String, branch_id: Uuid },

    #[error("Volume of product {sku} is out of range")]
    VolumeOverflow { sku: String },

    #[error("Quotation expands to {requested} units, the limit is {limit}")]
    TooManyUnits { requested: u64, limit: usize },

    #[error("Invalid dispatch state: {0}")]
    InvalidState(String),

    // External service errors
    #[error("Distance lookup failed: {0}")]
    DistanceLookup(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<PlanningError> for AppError {
    fn from(err: PlanningError) -> Self {
        match err {
            // The pure layer does not know the quotation id; callers check
            // for empty quotations before expanding.
            PlanningError::NoItems => AppError::NoItems {
                quotation_id: Uuid::nil(),
            },
            PlanningError::UnknownProduct { sku } => AppError::NotFound(format!("Product {}", sku)),
            PlanningError::InvalidQuantity { sku, quantity } => AppError::Validation {
                field: "quantity".to_string(),
                message: format!("Item {} has invalid quantity {}", sku, quantity),
                message_es: format!("El ítem {} tiene una cantidad inválida: {}", sku, quantity),
            },
            PlanningError::NoSuitableTruckType {
                weight_kg,
                volume_m3,
            } => AppError::NoSuitableTruckType {
                weight_kg,
                volume_m3,
            },
            PlanningError::VolumeOverflow { sku } => AppError::VolumeOverflow { sku },
            PlanningError::TooManyUnits { requested, limit } => {
                AppError::TooManyUnits { requested, limit }
            }
            PlanningError::InvalidScaleFactor(factor) => {
                AppError::Configuration(format!("invalid volume scale factor {}", factor))
            }
        }
    }
}

impl From<UnknownDispatchStatus> for AppError {
    fn from(err: UnknownDispatchStatus) -> Self {
        AppError::InvalidState(err.0)
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::ValidationError(_)
            | AppError::InvalidState(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NoItems { .. }
            | AppError::NoDestination { .. }
            | AppError::NoSuitableTruckType { .. }
            | AppError::NoActiveTruck { .. }
            | AppError::InsufficientStock { .. }
            | AppError::VolumeOverflow { .. }
            | AppError::TooManyUnits { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DistanceLookup(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::Validation {
                field,
                message,
                message_es,
            } => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: message.clone(),
                message_es: message_es.clone(),
                field: Some(field.clone()),
            },
            AppError::ValidationError(msg) => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: msg.clone(),
                message_es: format!("Datos inválidos: {}", msg),
                field: None,
            },
            AppError::Conflict {
                resource,
                message,
                message_es,
            } => ErrorDetail {
                code: "CONFLICT".to_string(),
                message_en: message.clone(),
                message_es: message_es.clone(),
                field: Some(resource.clone()),
            },
            AppError::NotFound(resource) => ErrorDetail {
                code: "NOT_FOUND".to_string(),
                message_en: format!("{} not found", resource),
                message_es: format!("No se encontró {}", resource),
                field: None,
            },
            AppError::NoItems { quotation_id } => ErrorDetail {
                code: "NO_ITEMS".to_string(),
                message_en: self.to_string(),
                message_es: format!("No hay productos en la cotización {}", quotation_id),
                field: None,
            },
            AppError::NoDestination { client_rut } => ErrorDetail {
                code: "NO_DESTINATION".to_string(),
                message_en: self.to_string(),
                message_es: format!(
                    "El cliente {} no tiene dirección de despacho registrada",
                    client_rut
                ),
                field: None,
            },
            AppError::NoSuitableTruckType {
                weight_kg,
                volume_m3,
            } => ErrorDetail {
                code: "NO_SUITABLE_TRUCK_TYPE".to_string(),
                message_en: self.to_string(),
                message_es: format!(
                    "No hay tipo de camión disponible para un grupo de {} kg / {} m3",
                    weight_kg, volume_m3
                ),
                field: None,
            },
            AppError::NoActiveTruck {
                truck_type_name, ..
            } => ErrorDetail {
                code: "NO_ACTIVE_TRUCK".to_string(),
                message_en: self.to_string(),
                message_es: format!("No hay camiones disponibles del tipo {}", truck_type_name),
                field: None,
            },
            AppError::InsufficientStock { sku, branch_id } => ErrorDetail {
                code: "INSUFFICIENT_STOCK".to_string(),
                message_en: self.to_string(),
                message_es: format!(
                    "No se encontró stock suficiente para el producto {} en la sucursal {}",
                    sku, branch_id
                ),
                field: Some("sku".to_string()),
            },
            AppError::VolumeOverflow { sku } => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: self.to_string(),
                message_es: format!("El volumen del producto {} está fuera de rango", sku),
                field: Some("sku".to_string()),
            },
            AppError::TooManyUnits { requested, limit } => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: self.to_string(),
                message_es: format!(
                    "La cotización genera {} unidades, el máximo es {}",
                    requested, limit
                ),
                field: Some("quantity".to_string()),
            },
            AppError::InvalidState(state) => ErrorDetail {
                code: "INVALID_STATE".to_string(),
                message_en: self.to_string(),
                message_es: format!(
                    "Estado inválido '{}': debe ser pendiente, aprobado o entregado",
                    state
                ),
                field: Some("state".to_string()),
            },
            AppError::DistanceLookup(msg) => ErrorDetail {
                code: "DISTANCE_LOOKUP_ERROR".to_string(),
                message_en: self.to_string(),
                message_es: format!("Error al calcular distancia: {}", msg),
                field: None,
            },
            AppError::Configuration(msg) => ErrorDetail {
                code: "CONFIGURATION_ERROR".to_string(),
                message_en: format!("Configuration error: {}", msg),
                message_es: format!("Error de configuración: {}", msg),
                field: None,
            },
            AppError::DatabaseError(_) => ErrorDetail {
                code: "DATABASE_ERROR".to_string(),
                message_en: "A database error occurred".to_string(),
                message_es: "Ocurrió un error en la base de datos".to_string(),
                field: None,
            },
            AppError::Internal(msg) => ErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message_en: msg.clone(),
                message_es: "Error interno del servidor".to_string(),
                field: None,
            },
            AppError::InternalError(_) => ErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message_en: "An internal server error occurred".to_string(),
                message_es: "Error interno del servidor".to_string(),
                field: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_detail = self.detail();

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
