//! Route definitions for the Inventory Dispatch platform

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/distance", post(handlers::calculate_distance))
        .nest("/dispatches", dispatch_routes())
}

/// Dispatch planning and management routes
fn dispatch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_dispatches))
        .route("/plan", post(handlers::plan_dispatches))
        .route("/approve", post(handlers::approve_dispatches))
        .route(
            "/quotation/:quotation_id",
            get(handlers::list_quotation_dispatches),
        )
        .route(
            "/quotation/:quotation_id/state",
            put(handlers::set_dispatch_state),
        )
        .route(
            "/:dispatch_id",
            get(handlers::get_dispatch)
                .put(handlers::update_dispatch)
                .delete(handlers::delete_dispatch),
        )
        .route(
            "/:dispatch_id/distance",
            post(handlers::refresh_dispatch_distance),
        )
}
