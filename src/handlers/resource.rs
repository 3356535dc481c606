//! Resource handlers: list, read, create, update, patch, delete and the generic relation handler.

use crate::error::AppError;
use crate::extractors::{PageQuery, Principal};
use crate::model::{PageRequest, Payload};
use crate::response::{accepted, created, ok, paginated};
use crate::service::{CrudService, RelationOutcome, RelationPath, RelationService};
use crate::state::ResourceState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{Method, Uri},
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// Body as a field map. An empty body is an empty payload.
fn parse_payload(body: &Bytes) -> Result<Payload, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::new());
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid json: {}", e)))?;
    match value {
        Value::Object(m) => Ok(m.into_iter().collect()),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// The record id is the last path parameter; earlier ones belong to custom group segments.
fn record_id(params: Vec<(String, String)>) -> Result<String, AppError> {
    params
        .into_iter()
        .last()
        .map(|(_, v)| v)
        .ok_or_else(|| AppError::BadRequest("missing record id".into()))
}

pub async fn list(
    State(state): State<ResourceState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = CrudService::list(&state, &PageRequest::from(query)).await?;
    Ok(paginated(page))
}

pub async fn read(
    State(state): State<ResourceState>,
    Path(params): Path<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let id = record_id(params)?;
    let record = CrudService::get(&state, &id).await?;
    Ok(ok(record))
}

pub async fn create(
    State(state): State<ResourceState>,
    principal: Principal,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload = parse_payload(&body)?;
    let record = CrudService::create(&state, &principal, &payload).await?;
    Ok(created(record))
}

pub async fn update(
    State(state): State<ResourceState>,
    Path(params): Path<Vec<(String, String)>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let id = record_id(params)?;
    let payload = parse_payload(&body)?;
    let record = CrudService::update(&state, &id, &payload).await?;
    Ok(ok(record))
}

pub async fn patch(
    State(state): State<ResourceState>,
    Path(params): Path<Vec<(String, String)>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let id = record_id(params)?;
    let payload = parse_payload(&body)?;
    let record = CrudService::patch(&state, &id, &payload).await?;
    Ok(ok(record))
}

pub async fn delete(
    State(state): State<ResourceState>,
    Path(params): Path<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let id = record_id(params)?;
    CrudService::delete(&state, &id).await?;
    Ok(accepted())
}

/// Generic relation handler shared by every relation route. Ids and relation name are
/// read back from the trailing segments of the request path; `takes_target` is fixed
/// per route at mount time.
pub async fn relation(
    state: ResourceState,
    method: Method,
    uri: Uri,
    query: PageQuery,
    body: Bytes,
    takes_target: bool,
) -> Result<Response, AppError> {
    let parsed = RelationPath::parse(&method, uri.path(), takes_target)?;
    let payload = parse_payload(&body)?;
    let page = PageRequest::from(query);

    let outcome = RelationService::dispatch(&state, &method, &parsed, &page, &payload).await?;
    Ok(match outcome {
        RelationOutcome::One(record) => ok(record).into_response(),
        RelationOutcome::Many(page) => paginated(page).into_response(),
        RelationOutcome::Created(record) => created(record).into_response(),
        RelationOutcome::Accepted => accepted().into_response(),
    })
}
