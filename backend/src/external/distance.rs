//! Distance Matrix client for road distance and travel time
//!
//! Speaks the Google Distance Matrix JSON protocol: one origin, one
//! destination, metric units, driving mode.

use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::MapsConfig;
use crate::error::{AppError, AppResult};

/// Road distance and travel time between two addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelEstimate {
    /// Kilometres, exact to the metre
    pub distance_km: Decimal,
    /// Whole minutes, rounded down
    pub duration_min: i64,
    /// Localized text as returned by the service, e.g. "12,3 km"
    pub distance_text: String,
    /// Localized text as returned by the service, e.g. "21 min"
    pub duration_text: String,
}

/// Source of travel estimates between free-text addresses
#[axum::async_trait]
pub trait DistanceLookup: Send + Sync {
    async fn travel_estimate(&self, origin: &str, destination: &str) -> AppResult<TravelEstimate>;
}

/// HTTP client for the Distance Matrix API
#[derive(Clone)]
pub struct DistanceMatrixClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    language: String,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<TextValue>,
    duration: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
    value: i64,
}

impl DistanceMatrixClient {
    /// Build a client from the maps configuration
    pub fn new(config: &MapsConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.usable_api_key().map(str::to_string),
            base_url: config.base_url.clone(),
            language: config.language.clone(),
        })
    }

    /// Create a client against a custom endpoint (for testing)
    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            language: "es".to_string(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[axum::async_trait]
impl DistanceLookup for DistanceMatrixClient {
    async fn travel_estimate(&self, origin: &str, destination: &str) -> AppResult<TravelEstimate> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("maps.api_key is not set".to_string()))?;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("origins", origin),
                ("destinations", destination),
                ("mode", "driving"),
                ("units", "metric"),
                ("language", self.language.as_str()),
                ("key", api_key),
            ])
            .send()
            .await
            .map_err(|e| AppError::DistanceLookup(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::DistanceLookup(format!("{} - {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::DistanceLookup(format!("failed to read response: {}", e)))?;

        parse_distance_matrix(&body)
    }
}

/// Extract the first element of a Distance Matrix response
pub fn parse_distance_matrix(body: &str) -> AppResult<TravelEstimate> {
    let data: MatrixResponse = serde_json::from_str(body)
        .map_err(|e| AppError::DistanceLookup(format!("malformed response: {}", e)))?;

    if data.status != "OK" {
        let detail = data.error_message.unwrap_or_default();
        return Err(AppError::DistanceLookup(
            format!("{} {}", data.status, detail).trim_end().to_string(),
        ));
    }

    let element = data
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.elements.into_iter().next())
        .ok_or_else(|| AppError::DistanceLookup("no distance results".to_string()))?;

    if element.status != "OK" {
        return Err(AppError::DistanceLookup(format!(
            "route not available: {}",
            element.status
        )));
    }

    match (element.distance, element.duration) {
        (Some(distance), Some(duration)) => Ok(TravelEstimate {
            distance_km: Decimal::new(distance.value, 3),
            duration_min: duration.value / 60,
            distance_text: distance.text,
            duration_text: duration.text,
        }),
        _ => Err(AppError::DistanceLookup(
            "element without distance or duration".to_string(),
        )),
    }
}
