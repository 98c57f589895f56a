//! HTTP route definitions.

mod admin;
mod health;
mod links;
mod records;

use crate::error::{AppError, Result};
use crate::AppState;
use axum::{
    body::Bytes,
    http::{header, HeaderMap},
};
use cellbox_engine::{Error, Page, Precondition};
use serde_json::{json, Value};

/// Create all application routes.
pub fn create_routes() -> axum::Router<AppState> {
    axum::Router::new()
        .merge(health::routes())
        .merge(records::routes())
        .merge(links::routes())
        .merge(admin::routes())
}

/// Wrap a payload in the `{"d": {"results": ...}}` envelope.
fn envelope(results: Value) -> Value {
    json!({ "d": { "results": results } })
}

fn page_envelope(page: Page) -> Value {
    let results: Vec<Value> = page
        .entries
        .into_iter()
        .map(|entry| Value::Object(entry.body))
        .collect();
    let mut d = json!({ "results": results });
    if let Some(count) = page.count {
        d["__count"] = json!(count);
    }
    json!({ "d": d })
}

/// Parse a request body as JSON.
fn json_body(bytes: &Bytes) -> Result<Value> {
    serde_json::from_slice(bytes)
        .map_err(|e| AppError::Engine(Error::InvalidPayload(format!("malformed JSON: {}", e))))
}

/// Precondition from the `If-Match` header.
fn precondition(headers: &HeaderMap) -> Result<Precondition> {
    match headers.get(header::IF_MATCH) {
        None => Ok(Precondition::Unconditional),
        Some(value) => {
            let raw = value.to_str().map_err(|_| {
                AppError::Engine(Error::MalformedPrecondition("non-ASCII If-Match".into()))
            })?;
            Ok(Precondition::from_header(Some(raw)))
        }
    }
}
