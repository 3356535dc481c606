//! Relation sub-path resolution and dispatch.

use crate::config::RelationAction;
use crate::error::AppError;
use crate::model::{Cardinality, Page, PageRequest, Payload, Record};
use crate::service::attach;
use crate::service::crud::{create_through, CrudService};
use crate::state::ResourceState;
use axum::http::Method;

/// Ids and relation name recovered from the trailing segments of a relation request path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationPath {
    pub base_id: String,
    pub relation: String,
    pub target_id: Option<String>,
}

impl RelationPath {
    /// Parse a raw request path. Segments are split first and percent-decoded one by one,
    /// so an encoded `/` stays inside its id. GET never carries a target; POST carries one
    /// only on routes that take a target (`takes_target`); every other verb needs one.
    pub fn parse(method: &Method, path: &str, takes_target: bool) -> Result<Self, AppError> {
        let with_target = match *method {
            Method::GET => false,
            Method::POST => takes_target,
            _ => true,
        };
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let needed = if with_target { 3 } else { 2 };
        if segments.len() < needed {
            return Err(AppError::MethodNotAllowed(format!(
                "{} {} needs at least {} path segments",
                method, path, needed
            )));
        }

        let target_id = if with_target {
            Some(decode(segments.pop().unwrap_or_default())?)
        } else {
            None
        };
        let relation = decode(segments.pop().unwrap_or_default())?;
        let base_id = decode(segments.pop().unwrap_or_default())?;
        Ok(RelationPath {
            base_id,
            relation,
            target_id,
        })
    }
}

fn decode(segment: &str) -> Result<String, AppError> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| AppError::BadRequest(format!("invalid path encoding: {}", e)))
}

/// Result of a relation request, mapped to a response by the handler.
#[derive(Debug)]
pub enum RelationOutcome {
    /// Current value of a single relation.
    One(Option<Record>),
    /// Page of a collection relation.
    Many(Page),
    Created(Record),
    Accepted,
}

pub struct RelationService;

impl RelationService {
    pub async fn dispatch(
        state: &ResourceState,
        method: &Method,
        path: &RelationPath,
        page: &PageRequest,
        payload: &Payload,
    ) -> Result<RelationOutcome, AppError> {
        let accessor = state
            .definition
            .relations
            .resolve(&path.relation)
            .ok_or_else(|| AppError::NotFound(format!("relation {} on {}", path.relation, state.name())))?;
        let base = CrudService::get(state, &path.base_id).await?;

        let action = RelationAction::classify(method, path.target_id.is_some())
            .ok_or_else(|| AppError::NotFound(format!("{} {} on {}", method, path.relation, state.name())))?;
        tracing::debug!(
            resource = %state.name(),
            base = %path.base_id,
            relation = %accessor,
            action = action.name(),
            "relation request"
        );

        match (action, path.target_id.as_deref()) {
            (RelationAction::Get, _) => Self::get(state, &base, accessor, page).await,
            (RelationAction::Create, _) => Self::create(state, &base, accessor, payload).await,
            (RelationAction::Attach, Some(target)) => {
                attach::attach(state, &base, accessor, target, payload).await?;
                Ok(RelationOutcome::Accepted)
            }
            (RelationAction::Detach, Some(target)) => {
                attach::detach(state, &base, accessor, target).await?;
                Ok(RelationOutcome::Accepted)
            }
            _ => Err(AppError::NotFound(format!("{} {}", method, path.relation))),
        }
    }

    async fn get(
        state: &ResourceState,
        base: &Record,
        accessor: &str,
        page: &PageRequest,
    ) -> Result<RelationOutcome, AppError> {
        let relation = state.model.relation(base, accessor)?;
        match relation.cardinality() {
            Cardinality::Single => Ok(RelationOutcome::One(relation.first().await?)),
            Cardinality::Collection => {
                let page = page.or_size(relation.related().default_per_page());
                Ok(RelationOutcome::Many(relation.paginate(&page).await?))
            }
        }
    }

    async fn create(
        state: &ResourceState,
        base: &Record,
        accessor: &str,
        payload: &Payload,
    ) -> Result<RelationOutcome, AppError> {
        let relation = state.model.relation(base, accessor)?;
        if relation.cardinality() == Cardinality::Single && relation.first().await?.is_some() {
            return Err(AppError::Conflict("relation already exists".to_string()));
        }
        let record = create_through(relation.as_ref(), payload).await?;
        Ok(RelationOutcome::Created(record))
    }
}
