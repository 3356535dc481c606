//! Linking and unlinking existing records through a relation.
//!
//! The already-attached check and the link are two separate collaborator calls. Two
//! concurrent attaches of the same pair can both pass the check unless the store
//! enforces uniqueness itself.

use crate::error::AppError;
use crate::model::{Cardinality, Payload, Record};
use crate::state::ResourceState;

/// Link record `target_id` of the related model to `base`. Fails with conflict when it
/// is already linked.
pub async fn attach(
    state: &ResourceState,
    base: &Record,
    accessor: &str,
    target_id: &str,
    payload: &Payload,
) -> Result<(), AppError> {
    let relation = state.model.relation(base, accessor)?;
    if relation.find(target_id).await?.is_some() {
        return Err(AppError::Conflict("already attached".to_string()));
    }
    let related = relation.related();
    let target = related
        .find(target_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", related.name(), target_id)))?;

    let linked = match relation.cardinality() {
        Cardinality::Single => relation.associate(&target, payload).await,
        Cardinality::Collection => relation.attach(&target, payload).await,
    };
    linked.map_err(|e| {
        tracing::warn!(resource = %state.name(), relation = %accessor, target = %target_id, error = %e, "attach failed");
        AppError::Internal(format!("Something went wrong attaching to this {}.", state.name()))
    })
}

/// Unlink record `target_id` from `base`. Fails with not found when it is not linked.
pub async fn detach(state: &ResourceState, base: &Record, accessor: &str, target_id: &str) -> Result<(), AppError> {
    let relation = state.model.relation(base, accessor)?;
    let target = relation
        .find(target_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {} on {}", accessor, target_id, state.name())))?;

    match relation.cardinality() {
        Cardinality::Single => {
            relation.disassociate().await;
            Ok(())
        }
        Cardinality::Collection => relation.detach(&target).await.map_err(|e| {
            tracing::warn!(resource = %state.name(), relation = %accessor, target = %target_id, error = %e, "detach failed");
            AppError::Internal(format!("Something went wrong detaching from this {}.", state.name()))
        }),
    }
}
