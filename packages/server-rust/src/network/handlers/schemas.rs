//! Schema binding endpoints.
//!
//! - `GET /schemas` lists schema names.
//! - `POST /schemas/{name}/validate` binds the request arguments strictly and
//!   returns the cleaned record.
//! - `POST /schemas/{name}/filter` binds the arguments as a partial record
//!   and returns the compiled predicate.

use axum::extract::{Path, State};
use axum::Json;
use gantry_core::{LocaleContext, Record, Value};
use serde_json::json;

use super::AppState;
use crate::network::binding::{ApiError, Args, Locale};
use crate::service::BindError;

fn record_json(record: Record) -> serde_json::Value {
    Value::Map(record).to_json()
}

fn reject(state: &AppState, err: &BindError, locale: &LocaleContext) -> ApiError {
    ApiError::from_bind(err, state.mapping.catalog(), locale.language.as_deref())
}

pub async fn list_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "schemas": state.mapping.schema_names() }))
}

pub async fn validate_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Locale(locale): Locale,
    Args(args): Args,
) -> Result<Json<serde_json::Value>, ApiError> {
    let locale = state.mapping.locale(locale.language, locale.timezone);
    state
        .mapping
        .bind(&name, &args, &locale)
        .map(|record| Json(record_json(record)))
        .map_err(|err| reject(&state, &err, &locale))
}

pub async fn filter_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Locale(locale): Locale,
    Args(args): Args,
) -> Result<Json<serde_json::Value>, ApiError> {
    let locale = state.mapping.locale(locale.language, locale.timezone);
    let compiled = state
        .mapping
        .filter(&name, &args, &locale)
        .map_err(|err| reject(&state, &err, &locale))?;

    let params: Vec<serde_json::Value> = compiled.params.iter().map(Value::to_json).collect();
    Ok(Json(json!({
        "predicate": compiled.predicate,
        "params": params,
        "order_by": compiled.order_by,
        "where": compiled.where_clause(),
    })))
}
