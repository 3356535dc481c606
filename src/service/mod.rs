//! Request-time services: CRUD dispatch, relation resolution, attach/detach and parent attachment.

pub mod attach;
mod crud;
mod parent;
mod relation;
mod validation;

pub use crud::{create_through, CrudService};
pub use parent::{ParentResolver, RelationAttacher};
pub use relation::{RelationOutcome, RelationPath, RelationService};
pub use validation::RequestValidator;
