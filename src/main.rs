use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use strike::config::Config;
use strike::services::{AssetService, PriceCache, PriceFeed, SettlementScheduler, SqliteStore};
use strike::websocket::{self, RoomManager};
use strike::{api, AppState};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strike=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting Strike server on {}:{}", config.host, config.port);

    // Persistent store (trades + accounts)
    let store = Arc::new(SqliteStore::new(&config.database_path)?);

    // Shared services
    let asset_service = AssetService::new();
    let price_cache = PriceCache::new(config.price_stale_threshold_ms);
    let room_manager = RoomManager::new();

    // The settlement scheduler, wired against its collaborators
    let scheduler = SettlementScheduler::new(
        store.clone(),
        store.clone(),
        price_cache.clone(),
        room_manager.clone(),
        asset_service.clone(),
        config.settlement(),
    );

    // Demo price feed (disable with PRICE_FEED_ENABLED=false)
    let price_feed = config.price_feed_enabled.then(|| {
        let feed = PriceFeed::new(
            price_cache.clone(),
            asset_service.clone(),
            Duration::from_millis(config.price_feed_interval_ms),
        );
        feed.start();
        feed
    });

    // Recover trades that were pending when the process last stopped.
    // Overdue ones settle immediately. Must complete before serving.
    let recovered = scheduler.load_pending()?;
    info!("Settlement scheduler ready ({} trades pending)", recovered);

    // Create application state
    let state = AppState {
        config: config.clone(),
        store,
        scheduler: scheduler.clone(),
        price_cache,
        asset_service,
        room_manager,
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .route("/ws", get(websocket::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Strike server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cancel timers without settling; load_pending resumes them on the
    // next start.
    scheduler.cleanup();
    if let Some(feed) = price_feed {
        feed.stop();
    }
    info!("Strike server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
