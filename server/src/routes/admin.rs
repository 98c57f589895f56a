//! Administrative endpoints.

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::error::Result;
use crate::AppState;

/// Catalog refresh response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub entity_types: usize,
}

/// Create admin routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/catalog/refresh", post(refresh_catalog))
}

/// Drop the cached catalog and load it again.
async fn refresh_catalog(State(state): State<AppState>) -> Result<Json<RefreshResponse>> {
    state.engine.invalidate_catalog();
    let catalog = state.engine.catalog()?;
    tracing::info!("Catalog refreshed: {} entity types", catalog.entity_types.len());
    Ok(Json(RefreshResponse {
        entity_types: catalog.entity_types.len(),
    }))
}
