//! Cellbox Server binary.

use cellbox_engine::{CachedCatalog, Engine, MemoryStore};
use cellbox_server::{config::Config, create_router, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cellbox_server=debug,cellbox_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let limits = config.load_limits()?;

    tracing::info!("Starting Cellbox Server on {}:{}", config.host, config.port);

    // Catalog is read from disk on first use and again after each refresh
    let catalog_path = config.catalog_path.clone();
    let catalog = CachedCatalog::new(limits.clone(), move || {
        cellbox_server::config::read_catalog(&catalog_path)
    });
    let engine = Engine::new(Arc::new(MemoryStore::new()), Arc::new(catalog), limits);

    // Fail fast on a broken catalog
    let loaded = engine.catalog()?;
    tracing::info!(
        "Loaded catalog from {} with {} entity types",
        config.catalog_path.display(),
        loaded.entity_types.len()
    );

    let app = create_router(AppState::new(engine));

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
