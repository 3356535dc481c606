//! Deferred parent attachment for resources whose records only exist under a parent.

use crate::error::{AppError, StoreError};
use crate::extractors::Principal;
use crate::model::{Model, Payload, Record, Relation};
use async_trait::async_trait;
use std::sync::Arc;

/// Creation capability bound to a resolved parent record and one of its relations.
/// Lives for a single create call.
pub struct RelationAttacher {
    parent: Record,
    relation: String,
    creator: Arc<dyn Relation>,
}

impl RelationAttacher {
    /// Bind `relation` of `parent` (a record of `model`).
    pub fn create(model: &dyn Model, parent: Record, relation: &str) -> Result<Self, StoreError> {
        let creator = model.relation(&parent, relation)?;
        Ok(RelationAttacher {
            parent,
            relation: relation.to_string(),
            creator,
        })
    }

    pub fn parent(&self) -> &Record {
        &self.parent
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Creation capability scoped to the parent/relation pair.
    pub fn call(&self) -> &dyn Relation {
        self.creator.as_ref()
    }
}

/// Resource hook locating the parent a new record must be created under.
/// `Ok(None)` means no parent could be found; the create fails with not found.
#[async_trait]
pub trait ParentResolver: Send + Sync {
    async fn parent_attacher(
        &self,
        principal: &Principal,
        payload: &Payload,
    ) -> Result<Option<RelationAttacher>, AppError>;
}
