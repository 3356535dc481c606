//! Example consumer: serves widgets, tags and notes from an in-memory store.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Set `RESOURCES_PATH` to a JSON file or directory to replace the built-in declarations.

use architect_rest::config::ValidationRule;
use architect_rest::model::{RelationSpec, TableSpec};
use architect_rest::{
    load_resources_from_path, ApiBuilder, AppError, MemoryStore, Model, ParentResolver, Payload, Principal,
    RelationAttacher, ResourceDefinition, ResourceState, ServerSettings,
};
use async_trait::async_trait;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

fn tables() -> Vec<TableSpec> {
    vec![
        TableSpec::new("widget")
            .rule("name", ValidationRule::required())
            .relation("tagRelation", RelationSpec::belongs_to_many("tag", "tag_widget"))
            .relation("notes", RelationSpec::has_many("note", "widget_id"))
            .relation("manual", RelationSpec::has_one("manual", "widget_id")),
        TableSpec::new("tag").rule("label", ValidationRule::required()),
        TableSpec::new("note").rule("body", ValidationRule::required()),
        TableSpec::new("manual"),
    ]
}

fn builtin_resources() -> Result<Vec<ResourceDefinition>, architect_rest::ConfigError> {
    Ok(vec![
        ResourceDefinition::builder("widget")
            .relation("tags", "tagRelation")
            .relation_self("notes")
            .relation_self("manual")
            .build()?,
        ResourceDefinition::builder("tag").build()?,
        ResourceDefinition::builder("note").needs_parent(true).build()?,
        ResourceDefinition::builder("manual").blacklist("create").build()?,
    ])
}

/// Notes hang off the widget named by `widget_id`.
struct WidgetParent {
    widgets: Arc<dyn Model>,
}

#[async_trait]
impl ParentResolver for WidgetParent {
    async fn parent_attacher(
        &self,
        principal: &Principal,
        payload: &Payload,
    ) -> Result<Option<RelationAttacher>, AppError> {
        let Some(id) = payload.get("widget_id").and_then(|v| v.as_str()) else {
            return Ok(None);
        };
        let Some(widget) = self.widgets.find(id).await? else {
            return Ok(None);
        };
        tracing::debug!(%principal, widget = %id, "note parent resolved");
        Ok(Some(RelationAttacher::create(self.widgets.as_ref(), widget, "notes")?))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("architect_rest=info")),
        )
        .init();

    let settings = ServerSettings::from_env()?;
    let definitions = match &settings.resources_path {
        Some(path) => load_resources_from_path(path).await?,
        None => builtin_resources()?,
    };

    let store = MemoryStore::new(tables());
    let widgets = store.model("widget")?;
    let mut api = ApiBuilder::new().body_limit(settings.body_limit);
    for def in definitions {
        let model = store.model(&def.name.to_lowercase())?;
        let needs_parent = def.needs_parent;
        let mut state = ResourceState::new(def, model);
        if needs_parent {
            state = state.with_parent(Arc::new(WidgetParent {
                widgets: Arc::clone(&widgets),
            }));
        }
        api = api.resource(state);
    }
    let api = api.build()?;

    let app = if settings.api_prefix == "/" {
        api
    } else {
        Router::new().nest(&settings.api_prefix, api)
    };

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}{}", listener.local_addr()?, settings.api_prefix);
    axum::serve(listener, app).await?;
    Ok(())
}
