//! Link endpoints.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use cellbox_engine::{Error, RecordKey};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{envelope, json_body};
use crate::error::{AppError, Result};
use crate::AppState;

/// Create link routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/data/{entity}/{id}/$links/{nav}",
            get(list_links).post(create_link),
        )
        .route(
            "/data/{entity}/{id}/$links/{nav}/{target}",
            delete(delete_link),
        )
}

/// Body of a link creation request.
#[derive(Debug, Deserialize)]
struct LinkRequest {
    uri: String,
}

/// Split `Type('id')`, optionally preceded by a path, into its parts.
fn parse_link_uri(uri: &str) -> Option<(&str, &str)> {
    let last = uri.rsplit('/').next()?;
    let (entity_type, rest) = last.split_once("('")?;
    let id = rest.strip_suffix("')")?;
    if entity_type.is_empty() || id.is_empty() {
        return None;
    }
    Some((entity_type, id))
}

/// List the link URIs of a navigation property.
async fn list_links(
    State(state): State<AppState>,
    Path((entity, id, nav)): Path<(String, String, String)>,
) -> Result<Json<Value>> {
    let catalog = state.engine.catalog()?;
    let ids = state.engine.list_links(&entity, &id, &nav)?;
    let target_type = catalog
        .navigation(&entity, &nav)
        .map(|navigation| navigation.target_type().to_string())
        .unwrap_or_default();

    let uris: Vec<Value> = ids
        .into_iter()
        .map(|target| json!({ "uri": RecordKey::new(target_type.clone(), target).to_string() }))
        .collect();
    Ok(Json(envelope(Value::Array(uris))))
}

/// Link two records.
async fn create_link(
    State(state): State<AppState>,
    Path((entity, id, nav)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<StatusCode> {
    let request: LinkRequest = serde_json::from_value(json_body(&body)?)
        .map_err(|e| AppError::Engine(Error::InvalidPayload(format!("link body: {}", e))))?;
    let (target_type, target_id) = parse_link_uri(&request.uri).ok_or_else(|| {
        AppError::Engine(Error::InvalidPayload(format!(
            "malformed link uri: {}",
            request.uri
        )))
    })?;

    let catalog = state.engine.catalog()?;
    if let Some(navigation) = catalog.navigation(&entity, &nav) {
        if navigation.target_type() != target_type {
            return Err(AppError::Engine(Error::InvalidPayload(format!(
                "{} links {} records, not {}",
                nav,
                navigation.target_type(),
                target_type
            ))));
        }
    }

    state.engine.create_link(&entity, &id, &nav, target_id)?;
    tracing::info!("Linked {}('{}')/{} to {}", entity, id, nav, request.uri);
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a link.
async fn delete_link(
    State(state): State<AppState>,
    Path((entity, id, nav, target)): Path<(String, String, String, String)>,
) -> Result<StatusCode> {
    state.engine.delete_link(&entity, &id, &nav, &target)?;
    tracing::info!("Unlinked {}('{}')/{} from '{}'", entity, id, nav, target);
    Ok(StatusCode::NO_CONTENT)
}
