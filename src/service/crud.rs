//! Generic CRUD execution against a resource's model.

use crate::error::AppError;
use crate::extractors::Principal;
use crate::model::{Creator, Page, PageRequest, Payload, Record};
use crate::state::ResourceState;

pub struct CrudService;

impl CrudService {
    /// One page of the resource's records, sized by the model when the request names no size.
    pub async fn list(state: &ResourceState, page: &PageRequest) -> Result<Page, AppError> {
        let page = page.or_size(state.model.default_per_page());
        tracing::debug!(resource = %state.name(), page = page.page, per_page = ?page.per_page, "list");
        Ok(state.model.paginate(&page).await?)
    }

    /// Record by id, or not found.
    pub async fn get(state: &ResourceState, id: &str) -> Result<Record, AppError> {
        state
            .model
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", state.name(), id)))
    }

    /// Create free-standing, or through the parent attacher when the resource needs a parent.
    pub async fn create(state: &ResourceState, principal: &Principal, payload: &Payload) -> Result<Record, AppError> {
        tracing::debug!(resource = %state.name(), %principal, "create");
        if !state.definition.needs_parent {
            return create_through(state.model.as_ref(), payload).await;
        }
        let resolver = state
            .parent
            .as_ref()
            .ok_or_else(|| AppError::NotFound(format!("parent of {}", state.name())))?;
        let attacher = resolver
            .parent_attacher(principal, payload)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("parent of {}", state.name())))?;
        tracing::debug!(
            resource = %state.name(),
            parent = ?attacher.parent().key(),
            relation = %attacher.relation(),
            "create under parent"
        );
        create_through(attacher.call(), payload).await
    }

    /// Apply payload, validate, persist. `patch` shares this contract.
    pub async fn update(state: &ResourceState, id: &str, payload: &Payload) -> Result<Record, AppError> {
        tracing::debug!(resource = %state.name(), id = %id, "update");
        let mut record = Self::get(state, id).await?;
        state.model.fill(&mut record, payload);
        state.model.validate(&record).map_err(AppError::Invalid)?;
        state.model.save(&mut record).await?;
        Ok(record)
    }

    pub async fn patch(state: &ResourceState, id: &str, payload: &Payload) -> Result<Record, AppError> {
        Self::update(state, id, payload).await
    }

    pub async fn delete(state: &ResourceState, id: &str) -> Result<(), AppError> {
        tracing::debug!(resource = %state.name(), id = %id, "delete");
        let record = Self::get(state, id).await?;
        state.model.delete(&record).await.map_err(|e| {
            tracing::warn!(resource = %state.name(), id = %id, error = %e, "delete failed");
            AppError::Internal(format!("Something went wrong deleting this {}.", state.name()))
        })
    }
}

/// Build from payload, validate, then persist. Nothing is saved when validation fails.
pub async fn create_through<C>(creator: &C, payload: &Payload) -> Result<Record, AppError>
where
    C: Creator + ?Sized,
{
    let mut record = creator.make(payload);
    creator.validate(&record).map_err(AppError::Invalid)?;
    creator.save(&mut record).await?;
    Ok(record)
}
