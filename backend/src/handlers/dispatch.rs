//! HTTP handlers for dispatch planning and management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::models::Dispatch;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::dispatch::{DispatchService, DispatchWithTotals, UpdateDispatchInput};
use crate::AppState;

/// Body naming the quotation to act on
#[derive(Debug, Deserialize)]
pub struct QuotationRequest {
    pub quotation_id: Uuid,
}

/// Body for a state change
#[derive(Debug, Deserialize)]
pub struct StateRequest {
    pub state: String,
}

/// Result of a bulk state change
#[derive(Debug, Serialize)]
pub struct StateChangeResponse {
    pub quotation_id: Uuid,
    pub state: String,
    pub updated: u64,
}

/// Plan (or re-plan) the dispatches of a quotation
pub async fn plan_dispatches(
    State(state): State<AppState>,
    Json(input): Json<QuotationRequest>,
) -> AppResult<(StatusCode, Json<Vec<Dispatch>>)> {
    let _guard = state.in_flight.try_acquire(input.quotation_id)?;
    let dispatches = state.planner.plan_dispatches(input.quotation_id).await?;
    Ok((StatusCode::CREATED, Json(dispatches)))
}

/// Approve every dispatch of a quotation
pub async fn approve_dispatches(
    State(state): State<AppState>,
    Json(input): Json<QuotationRequest>,
) -> AppResult<Json<StateChangeResponse>> {
    let updated = state.planner.approve_dispatches(input.quotation_id).await?;
    Ok(Json(StateChangeResponse {
        quotation_id: input.quotation_id,
        state: "aprobado".to_string(),
        updated,
    }))
}

/// Set the state of every dispatch of a quotation
pub async fn set_dispatch_state(
    State(state): State<AppState>,
    Path(quotation_id): Path<Uuid>,
    Json(input): Json<StateRequest>,
) -> AppResult<Json<StateChangeResponse>> {
    let updated = state
        .planner
        .set_dispatch_state(quotation_id, &input.state)
        .await?;
    Ok(Json(StateChangeResponse {
        quotation_id,
        state: input.state.trim().to_lowercase(),
        updated,
    }))
}

/// List all dispatches with totals
pub async fn list_dispatches(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<DispatchWithTotals>>> {
    let service = DispatchService::new(state.db);
    let dispatches = service.list_dispatches().await?;
    Ok(Json(dispatches))
}

/// List the dispatches of a quotation with totals
pub async fn list_quotation_dispatches(
    State(state): State<AppState>,
    Path(quotation_id): Path<Uuid>,
) -> AppResult<Json<Vec<DispatchWithTotals>>> {
    let service = DispatchService::new(state.db);
    let dispatches = service.list_by_quotation(quotation_id).await?;
    Ok(Json(dispatches))
}

/// Get a dispatch with its manifest
pub async fn get_dispatch(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
) -> AppResult<Json<DispatchWithTotals>> {
    let service = DispatchService::new(state.db);
    let dispatch = service.get_dispatch(dispatch_id).await?;
    Ok(Json(dispatch))
}

/// Update allow-listed fields of a dispatch
pub async fn update_dispatch(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
    Json(input): Json<UpdateDispatchInput>,
) -> AppResult<Json<DispatchWithTotals>> {
    let service = DispatchService::new(state.db);
    let dispatch = service.update_dispatch(dispatch_id, input).await?;
    Ok(Json(dispatch))
}

/// Delete a dispatch
pub async fn delete_dispatch(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = DispatchService::new(state.db);
    service.delete_dispatch(dispatch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
