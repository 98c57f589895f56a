//! Record endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use cellbox_engine::{Entry, QueryOptions};
use serde_json::Value;

use super::{envelope, json_body, page_envelope, precondition};
use crate::error::Result;
use crate::AppState;

/// Create record routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/data/{entity}", get(list_records).post(create_record))
        .route(
            "/data/{entity}/{id}",
            get(get_record)
                .put(replace_record)
                .patch(merge_record)
                .delete(delete_record),
        )
        .route(
            "/data/{entity}/{id}/{nav}",
            get(list_related).post(create_via_navigation),
        )
}

fn created(entry: Entry) -> impl IntoResponse {
    let tag = entry.tag().to_string();
    (
        StatusCode::CREATED,
        [(header::ETAG, tag)],
        Json(envelope(Value::Object(entry.body))),
    )
}

/// Create a record.
async fn create_record(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let body = json_body(&body)?;
    let entry = state.engine.create_record(&entity, &body)?;
    tracing::info!("Created {}('{}')", entity, entry.record.id);
    Ok(created(entry))
}

/// List records with query options applied.
async fn list_records(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(options): Query<QueryOptions>,
) -> Result<Json<Value>> {
    let page = state.engine.list_records(&entity, &options)?;
    Ok(Json(page_envelope(page)))
}

/// Fetch one record.
async fn get_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Query(options): Query<QueryOptions>,
) -> Result<impl IntoResponse> {
    let entry = state.engine.get_record(&entity, &id, &options)?;
    let tag = entry.tag().to_string();
    Ok((
        [(header::ETAG, tag)],
        Json(envelope(Value::Object(entry.body))),
    ))
}

/// Replace a record.
async fn replace_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let precondition = precondition(&headers)?;
    let body = json_body(&body)?;
    let tag = state
        .engine
        .replace_record(&entity, &id, &body, &precondition)?;
    Ok((StatusCode::NO_CONTENT, [(header::ETAG, tag.to_string())]))
}

/// Merge a partial body into a record.
async fn merge_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let precondition = precondition(&headers)?;
    let body = json_body(&body)?;
    let tag = state
        .engine
        .merge_record(&entity, &id, &body, &precondition)?;
    Ok((StatusCode::NO_CONTENT, [(header::ETAG, tag.to_string())]))
}

/// Delete a record.
async fn delete_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let precondition = precondition(&headers)?;
    state.engine.delete_record(&entity, &id, &precondition)?;
    tracing::info!("Deleted {}('{}')", entity, id);
    Ok(StatusCode::NO_CONTENT)
}

/// List the records linked through a navigation property.
async fn list_related(
    State(state): State<AppState>,
    Path((entity, id, nav)): Path<(String, String, String)>,
    Query(options): Query<QueryOptions>,
) -> Result<Json<Value>> {
    let page = state.engine.list_related(&entity, &id, &nav, &options)?;
    Ok(Json(page_envelope(page)))
}

/// Create a record already linked to the source record.
async fn create_via_navigation(
    State(state): State<AppState>,
    Path((entity, id, nav)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let body = json_body(&body)?;
    let entry = state
        .engine
        .create_via_navigation(&entity, &id, &nav, &body)?;
    tracing::info!(
        "Created {}('{}') through {}('{}')/{}",
        entry.record.entity_type,
        entry.record.id,
        entity,
        id,
        nav
    );
    Ok(created(entry))
}
