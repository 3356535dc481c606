//! Shared state: one `ResourceState` per mounted resource, read-only after startup.

use crate::config::ResourceDefinition;
use crate::model::Model;
use crate::routes::RouteTable;
use crate::service::ParentResolver;
use std::sync::Arc;

#[derive(Clone)]
pub struct ResourceState {
    pub definition: Arc<ResourceDefinition>,
    pub model: Arc<dyn Model>,
    /// Locates the parent relation for resources with `needs_parent`.
    pub parent: Option<Arc<dyn ParentResolver>>,
}

impl ResourceState {
    pub fn new(definition: ResourceDefinition, model: Arc<dyn Model>) -> Self {
        ResourceState {
            definition: Arc::new(definition),
            model,
            parent: None,
        }
    }

    pub fn with_parent(mut self, resolver: Arc<dyn ParentResolver>) -> Self {
        self.parent = Some(resolver);
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// State of the shared endpoints: every compiled route table.
#[derive(Clone, Default)]
pub struct AppState {
    pub routes: Arc<Vec<RouteTable>>,
}
