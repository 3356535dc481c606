//! Assemble every resource into one router.

use crate::config::{ensure_disjoint_paths, DEFAULT_BODY_LIMIT};
use crate::error::ConfigError;
use crate::routes::common::COMMON_PATHS;
use crate::routes::{common_routes, compile, mount};
use crate::state::{AppState, ResourceState};
use axum::Router;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

pub struct ApiBuilder {
    resources: Vec<ResourceState>,
    body_limit: usize,
}

impl Default for ApiBuilder {
    fn default() -> Self {
        ApiBuilder {
            resources: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ApiBuilder {
    pub fn new() -> Self {
        ApiBuilder::default()
    }

    pub fn resource(mut self, state: ResourceState) -> Self {
        self.resources.push(state);
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Compile every resource, check the tables do not collide, and mount them next to
    /// the common routes. All configuration errors surface here, before serving.
    pub fn build(self) -> Result<Router, ConfigError> {
        let tables = self
            .resources
            .iter()
            .map(|r| compile(&r.definition))
            .collect::<Result<Vec<_>, _>>()?;
        ensure_disjoint_paths(&tables)?;
        for table in &tables {
            if let Some(e) = table.entries.iter().find(|e| COMMON_PATHS.contains(&e.path.as_str())) {
                return Err(ConfigError::DuplicateRoute {
                    verb: e.verb.to_string(),
                    path: e.path.clone(),
                });
            }
        }

        let mut router = common_routes(AppState {
            routes: Arc::new(tables.clone()),
        });
        for (state, table) in self.resources.into_iter().zip(&tables) {
            if state.definition.needs_parent && state.parent.is_none() {
                tracing::warn!(resource = %state.name(), "needs a parent but has no resolver; create will fail");
            }
            tracing::info!(resource = %state.name(), routes = table.entries.len(), "mounted resource");
            router = router.merge(mount(table, state));
        }
        Ok(router.layer(RequestBodyLimitLayer::new(self.body_limit)))
    }
}
