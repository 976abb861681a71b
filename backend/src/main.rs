//! Inventory Dispatch Platform - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use dispatch_backend::{
    config::Config,
    create_app,
    external::DistanceMatrixClient,
    middleware::InFlightQuotations,
    services::PlanningService,
    store::PgPlanningStore,
    AppState,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dispatch_server=debug,dispatch_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Inventory Dispatch Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let distance = DistanceMatrixClient::new(&config.maps)?;
    if !distance.has_api_key() {
        tracing::warn!("maps.api_key is not set; dispatches will be planned without distances");
    }

    let planner = PlanningService::new(
        Arc::new(PgPlanningStore::new(db_pool.clone())),
        Arc::new(distance),
        config.planning.clone(),
    );

    // Create application state
    let state = AppState {
        db: db_pool,
        config: Arc::new(config.clone()),
        planner: Arc::new(planner),
        in_flight: InFlightQuotations::new(),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
