//! Mount a compiled route table onto an axum router.

use crate::config::Action;
use crate::error::ConfigError;
use crate::extractors::PageQuery;
use crate::handlers;
use crate::routes::{compile, HandlerRef, RouteEntry, RouteTable};
use crate::state::ResourceState;
use axum::{
    body::Bytes,
    extract::{OriginalUri, Query, State},
    http::Method,
    routing::MethodRouter,
    Router,
};
use indexmap::IndexMap;

/// `{id}` placeholders become axum `:id` captures.
pub fn to_axum_path(template: &str) -> String {
    template
        .split('/')
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => format!(":{}", name),
            None => s.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Router serving every entry of `table`. Entries sharing a path share one method router.
pub fn mount(table: &RouteTable, state: ResourceState) -> Router {
    let mut grouped: IndexMap<String, Vec<&RouteEntry>> = IndexMap::new();
    for entry in &table.entries {
        grouped.entry(to_axum_path(&entry.path)).or_default().push(entry);
    }

    let mut router: Router<ResourceState> = Router::new();
    for (path, entries) in grouped {
        let mut method_router: MethodRouter<ResourceState> = MethodRouter::new();
        for entry in entries {
            method_router = on(method_router, entry);
        }
        router = router.route(&path, method_router);
    }
    router.with_state(state)
}

fn on(method_router: MethodRouter<ResourceState>, entry: &RouteEntry) -> MethodRouter<ResourceState> {
    let filter = entry.verb.filter();
    match &entry.handler {
        HandlerRef::Action { action } => match action {
            Action::List => method_router.on(filter, handlers::list),
            Action::Get => method_router.on(filter, handlers::read),
            Action::Create => method_router.on(filter, handlers::create),
            Action::Update => method_router.on(filter, handlers::update),
            Action::Delete => method_router.on(filter, handlers::delete),
            Action::Patch => method_router.on(filter, handlers::patch),
        },
        HandlerRef::Relation { action, .. } => {
            let takes_target = action.takes_target();
            method_router.on(
                filter,
                move |State(state): State<ResourceState>,
                      method: Method,
                      OriginalUri(uri): OriginalUri,
                      Query(query): Query<PageQuery>,
                      body: Bytes| async move {
                    handlers::relation(state, method, uri, query, body, takes_target).await
                },
            )
        }
    }
}

/// Compile the resource's action tree and mount the result. Trees whose routes the
/// router could not hold are rejected here rather than at mount.
pub fn resource_routes(state: ResourceState) -> Result<Router, ConfigError> {
    let table = compile(&state.definition)?;
    Ok(mount(&table, state))
}
