//! Resource handlers: list, export, show, create, update, delete.
//!
//! Every mutation runs inside a transaction covering the plain-field write
//! and all relationship writes; a failure after `begin` rolls back and is
//! logged with the request URL and the acting user before the error body is
//! returned.

use crate::error::ApiError;
use crate::export;
use crate::query::{build_query, parse_id, parse_request, RawParams};
use crate::resource::RegisteredResource;
use crate::response::{entities_response, entity_created, entity_deleted, entity_updated};
use crate::service::{EntityRepository, PgEntitySource, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use sqlx::PgConnection;

fn resolve(state: &AppState, path_segment: &str) -> Result<RegisteredResource, ApiError> {
    state
        .registry
        .by_path(path_segment)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(path_segment.to_string()))
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, ApiError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(ApiError::invalid("body must be a JSON object")),
    }
}

/// The identifier a show/update/delete fetches by: the configured getter
/// column verbatim, otherwise the parsed primary key.
fn request_id(reg: &RegisteredResource, id_str: &str) -> Result<Value, ApiError> {
    match &reg.def.get_by_field {
        Some(_) => Ok(Value::String(id_str.to_string())),
        None => parse_id(&reg.def.pk_type, id_str)
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", reg.def.name, id_str))),
    }
}

/// Validation errors from pre/post hooks pass through; anything else a hook
/// raises becomes a business-rule rejection rather than an internal error.
fn hook_failure(err: ApiError) -> ApiError {
    match err {
        ApiError::Validation { .. } => err,
        other => ApiError::BusinessRule(other.to_string()),
    }
}

fn log_mutation_failure(uri: &Uri, headers: &HeaderMap, err: &ApiError) {
    let user = headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous");
    tracing::error!(url = %uri, user = %user, error = %err, "mutation rolled back");
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, ApiError> {
    let reg = resolve(&state, &path_segment)?;
    let params = RawParams::parse(query.as_deref().unwrap_or(""));
    let req = parse_request(&reg.def, &params)?;
    let bounded = build_query(&reg.def, &req)?;

    let mut source = PgEntitySource::new(&state.pool, bounded);
    let hooks = reg.hooks.clone();
    let map = move |entity: Value| hooks.map_entity(entity);
    let envelope = entities_response(&req, &mut source, Some(&map)).await?;
    Ok(Json(envelope))
}

pub async fn export(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let reg = resolve(&state, &path_segment)?;
    let params = RawParams::parse(query.as_deref().unwrap_or(""));
    let req = parse_request(&reg.def, &params)?;
    let bounded = build_query(&reg.def, &req)?;

    let mut source = PgEntitySource::new(&state.pool, bounded);
    let spec = reg.hooks.export_spec(&reg.def);
    let def = reg.def.clone();
    let hooks = reg.hooks.clone();
    let map = move |entity: &Value| hooks.export_row(&def, entity);
    let document = export::export(&mut source, &spec, Some(&map), &reg.def.name).await?;
    Ok(document.into_response())
}

pub async fn show(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let reg = resolve(&state, &path_segment)?;
    let id = request_id(&reg, &id_str)?;
    let entity =
        EntityRepository::get(&state.pool, &reg.def, &id, reg.def.get_by_field.as_deref()).await?;
    reg.hooks.entity_access(&entity).await?;
    Ok(Json(reg.hooks.map_single_entity(entity)))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let reg = resolve(&state, &path_segment)?;
    let mut attributes = body_to_map(body)?;
    RequestValidator::validate(&attributes, &reg.def.validation)?;
    reg.hooks.pre_create(&mut attributes).await.map_err(hook_failure)?;

    let mut tx = state.pool.begin().await.map_err(ApiError::Db)?;
    let result = create_in_tx(&mut tx, &reg, &attributes).await;
    let entity = match result {
        Ok(entity) => {
            tx.commit().await.map_err(ApiError::Db)?;
            entity
        }
        Err(err) => {
            let _ = tx.rollback().await;
            log_mutation_failure(&uri, &headers, &err);
            return Err(err);
        }
    };
    Ok(entity_created(reg.hooks.map_single_entity(entity)))
}

async fn create_in_tx(
    tx: &mut PgConnection,
    reg: &RegisteredResource,
    attributes: &Map<String, Value>,
) -> Result<Value, ApiError> {
    let entity = EntityRepository::create(tx, &reg.def, attributes).await?;
    reg.hooks.post_create(&entity).await.map_err(hook_failure)?;
    Ok(entity)
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let reg = resolve(&state, &path_segment)?;
    let id = request_id(&reg, &id_str)?;
    let current =
        EntityRepository::get(&state.pool, &reg.def, &id, reg.def.get_by_field.as_deref()).await?;
    reg.hooks.entity_access(&current).await?;
    reg.hooks.entity_update_access(&current).await?;

    let mut attributes = body_to_map(body)?;
    RequestValidator::validate_partial(&attributes, &reg.def.validation)?;
    reg.hooks
        .pre_update(&mut attributes, &current)
        .await
        .map_err(hook_failure)?;

    let mut tx = state.pool.begin().await.map_err(ApiError::Db)?;
    let result = update_in_tx(&mut tx, &reg, &current, &attributes).await;
    let entity = match result {
        Ok(entity) => {
            tx.commit().await.map_err(ApiError::Db)?;
            entity
        }
        Err(err) => {
            let _ = tx.rollback().await;
            log_mutation_failure(&uri, &headers, &err);
            return Err(err);
        }
    };
    Ok(entity_updated(reg.hooks.map_single_entity(entity)))
}

async fn update_in_tx(
    tx: &mut PgConnection,
    reg: &RegisteredResource,
    current: &Value,
    attributes: &Map<String, Value>,
) -> Result<Value, ApiError> {
    let entity = EntityRepository::update(tx, &reg.def, current, attributes).await?;
    reg.hooks.post_update(&entity).await.map_err(hook_failure)?;
    Ok(entity)
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let reg = resolve(&state, &path_segment)?;
    let id = request_id(&reg, &id_str)?;
    let current =
        EntityRepository::get(&state.pool, &reg.def, &id, reg.def.get_by_field.as_deref()).await?;
    reg.hooks.entity_access(&current).await?;
    reg.hooks.entity_update_access(&current).await?;

    let pk = current
        .get(&reg.def.pk_column)
        .cloned()
        .unwrap_or(Value::Null);

    let mut tx = state.pool.begin().await.map_err(ApiError::Db)?;
    let result = EntityRepository::delete(&mut tx, &reg.def, &pk).await;
    let deleted = match result {
        Ok(deleted) => {
            tx.commit().await.map_err(ApiError::Db)?;
            deleted
        }
        Err(err) => {
            let _ = tx.rollback().await;
            log_mutation_failure(&uri, &headers, &err);
            return Err(err);
        }
    };
    Ok(entity_deleted(pk, reg.hooks.map_single_entity(deleted)))
}
