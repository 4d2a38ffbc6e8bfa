//! Quartermaster Server - Equipment Lending Ledger
//!
//! REST API server for equipment checkout, bulk import and overdue notices.

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quartermaster_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::{overdue::OverdueService, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!("Starting Quartermaster Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let repository = Repository::new(pool);
    let services = Services::new(repository, &config);

    if config.scheduler.enabled && config.email.enabled {
        spawn_overdue_scanner(
            services.overdue.clone(),
            Duration::from_secs(config.scheduler.overdue_scan_interval_secs.max(60)),
        );
    } else {
        tracing::info!("Overdue scanner not started (scheduler or email disabled)");
    }

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("quartermaster_server={},tower_http=debug", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Run the overdue scan on a fixed interval. The first tick fires immediately.
fn spawn_overdue_scanner(overdue: OverdueService, every: Duration) {
    tracing::info!(interval_secs = every.as_secs(), "Overdue scanner started");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = overdue.scan_and_notify().await {
                tracing::error!(error = %e, "Overdue scan failed");
            }
        }
    });
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Categories
        .route(
            "/categories",
            get(api::categories::list_categories).post(api::categories::create_category),
        )
        // Items
        .route(
            "/items",
            get(api::items::list_items).post(api::items::create_item),
        )
        .route("/items/scan/:token", get(api::items::get_item_by_scan_token))
        .route(
            "/items/:id",
            get(api::items::get_item)
                .put(api::items::update_item)
                .delete(api::items::deactivate_item),
        )
        .route("/items/:id/loans", get(api::items::list_item_loans))
        // Members
        .route(
            "/members",
            get(api::members::list_members).post(api::members::create_member),
        )
        .route(
            "/members/:id",
            get(api::members::get_member).delete(api::members::deactivate_member),
        )
        .route("/members/:id/loans", get(api::members::list_member_loans))
        // Loans
        .route("/loans", get(api::loans::list_loans).post(api::loans::checkout))
        .route("/loans/:id", get(api::loans::get_loan))
        .route("/loans/:id/return", post(api::loans::check_in))
        // Import
        .route("/import/items", post(api::import::import_items))
        .route("/import/items/csv", post(api::import::import_items_csv))
        .route("/import/members", post(api::import::import_members))
        .route("/import/members/csv", post(api::import::import_members_csv))
        // Reports
        .route("/reports/export", get(api::reports::export))
        .route("/reports/dashboard", get(api::reports::dashboard))
        // Notifications
        .route(
            "/notifications/overdue/scan",
            post(api::notifications::scan_overdue),
        )
        // Packing lists
        .route(
            "/packing-lists",
            get(api::packing_lists::list_packing_lists).post(api::packing_lists::create_packing_list),
        )
        .route(
            "/packing-lists/:id",
            get(api::packing_lists::get_packing_list)
                .put(api::packing_lists::update_packing_list)
                .delete(api::packing_lists::delete_packing_list),
        )
        .route("/packing-lists/:id/entries", post(api::packing_lists::add_entry))
        .route(
            "/packing-lists/:id/entries/:entry_id",
            put(api::packing_lists::update_entry).delete(api::packing_lists::remove_entry),
        )
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
}
