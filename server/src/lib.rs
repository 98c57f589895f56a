//! Cellbox Server - REST adapter over the Cellbox entity data engine.
//!
//! Records are addressed as `/data/{entityType}/{id}`. Responses wrap their
//! payload as `{"d": {"results": ...}}`, carry the version tag in `ETag` and
//! accept a precondition in `If-Match`.

pub mod config;
pub mod error;
pub mod routes;

use axum::Router;
use cellbox_engine::Engine;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// Build the application router with its middleware stack.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
