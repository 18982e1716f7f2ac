use anyhow::Result;
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aprs_codec::PacketWindow;
use overlay_engine::{LayerStore, OverlayEngine, SourceClient, SourceEndpoints, TtlCache};

mod png_out;
mod routes;

/// Cached upstream propagation payloads, keyed by source and hours.
pub type PropagationCache = TtlCache<routes::PropagationDataResponse>;

#[derive(Clone)]
pub struct AppState {
    pub window: Arc<RwLock<PacketWindow>>,
    pub engine: Arc<OverlayEngine<LayerStore>>,
    pub store: Arc<RwLock<LayerStore>>,
    pub sources: Arc<SourceClient>,
    pub propagation_cache: Arc<RwLock<PropagationCache>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "map_gateway=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = std::env::var("MAP_GATEWAY_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "8199".to_string());

    // The engine consumes the VHF/APRS endpoints this service hosts.
    let endpoints = SourceEndpoints {
        propagation_url: format!("http://127.0.0.1:{port}/api/map/propagation-data"),
        locations_url: format!("http://127.0.0.1:{port}/api/map/aprs-locations"),
        ..SourceEndpoints::default()
    };

    let store = Arc::new(RwLock::new(LayerStore::world()));
    let engine = Arc::new(OverlayEngine::new(
        Arc::clone(&store),
        SourceClient::new(endpoints.clone()),
    ));
    let state = AppState {
        window: Arc::new(RwLock::new(PacketWindow::new())),
        engine: Arc::clone(&engine),
        store,
        sources: Arc::new(SourceClient::new(endpoints)),
        propagation_cache: Arc::new(RwLock::new(TtlCache::new(
            std::time::Duration::from_secs(300),
        ))),
    };

    tokio::spawn(engine.run());

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/map", routes::map_router(state))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("🗺️  Map gateway starting on {}", addr);
    tracing::info!("   Overlay endpoints under /api/map");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "map-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
