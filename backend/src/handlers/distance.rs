//! HTTP handlers for distance lookups

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use shared::models::Dispatch;
use uuid::Uuid;

use crate::error::AppResult;
use crate::external::TravelEstimate;
use crate::AppState;

/// Request for an ad-hoc distance lookup
#[derive(Debug, Deserialize)]
pub struct DistanceRequest {
    pub origin: String,
    pub destination: String,
}

/// Travel estimate between two free-text addresses
pub async fn calculate_distance(
    State(state): State<AppState>,
    Json(input): Json<DistanceRequest>,
) -> AppResult<Json<TravelEstimate>> {
    let estimate = state
        .planner
        .distance_between(&input.origin, &input.destination)
        .await?;
    Ok(Json(estimate))
}

/// Recompute and store the distance of one dispatch
pub async fn refresh_dispatch_distance(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
) -> AppResult<Json<Dispatch>> {
    let dispatch = state.planner.refresh_distance(dispatch_id).await?;
    Ok(Json(dispatch))
}
