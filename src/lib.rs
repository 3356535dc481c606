//! Architect REST: declarative resources compiled into route tables, served by generic
//! CRUD and relation handlers over a pluggable model layer.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;

pub use config::{
    load_resources_from_path, load_resources_from_str, resolve, ActionTree, ActionTreeNode, ResourceConfig,
    ResourceDefinition, ServerSettings,
};
pub use error::{AppError, ConfigError, StoreError, ValidationErrors};
pub use extractors::Principal;
pub use model::{Cardinality, MemoryStore, Model, Page, PageRequest, Payload, Record, Relation, RelationKind};
pub use response::{accepted, created, listing, ok, paginated};
pub use routes::{common_routes, compile, resource_routes, ApiBuilder, RouteTable};
pub use service::{CrudService, ParentResolver, RelationAttacher};
pub use state::{AppState, ResourceState};
