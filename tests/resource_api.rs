use architect_rest::config::ValidationRule;
use architect_rest::model::{Creator, RelationSpec, TableSpec};
use architect_rest::{
    ApiBuilder, AppError, MemoryStore, Model, Page, PageRequest, ParentResolver, Payload, Principal, Record,
    Relation, RelationAttacher, RelationKind, ResourceDefinition, ResourceState, StoreError, ValidationErrors,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn store() -> Arc<MemoryStore> {
    MemoryStore::new([
        TableSpec::new("widget")
            .rule("name", ValidationRule::required())
            .relation("tagRelation", RelationSpec::belongs_to_many("tag", "tag_widget"))
            .relation("notes", RelationSpec::has_many("note", "widget_id"))
            .relation("manual", RelationSpec::has_one("manual", "widget_id")),
        TableSpec::new("tag").rule("label", ValidationRule::required()),
        TableSpec::new("note").rule("body", ValidationRule::required()),
        TableSpec::new("manual"),
    ])
}

/// Notes are created under the widget named by `widget_id` in the payload.
struct NoteParent {
    widgets: Arc<dyn Model>,
}

#[async_trait]
impl ParentResolver for NoteParent {
    async fn parent_attacher(
        &self,
        _principal: &Principal,
        payload: &Payload,
    ) -> Result<Option<RelationAttacher>, AppError> {
        let Some(id) = payload.get("widget_id").and_then(Value::as_str) else {
            return Ok(None);
        };
        let Some(widget) = self.widgets.find(id).await? else {
            return Ok(None);
        };
        Ok(Some(RelationAttacher::create(self.widgets.as_ref(), widget, "notes")?))
    }
}

fn app(store: &Arc<MemoryStore>) -> Router {
    let widget = ResourceDefinition::builder("widget")
        .relation("tags", "tagRelation")
        .relation_self("notes")
        .relation_self("manual")
        .build()
        .unwrap();
    let tag = ResourceDefinition::builder("tag").blacklist("delete").build().unwrap();
    let note = ResourceDefinition::builder("note").needs_parent(true).build().unwrap();

    let widgets = store.model("widget").unwrap();
    ApiBuilder::new()
        .resource(ResourceState::new(widget, Arc::clone(&widgets)))
        .resource(ResourceState::new(tag, store.model("tag").unwrap()))
        .resource(
            ResourceState::new(note, store.model("note").unwrap()).with_parent(Arc::new(NoteParent { widgets })),
        )
        .build()
        .unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Store with one widget (id "1") and two tags (ids "1" and "2").
async fn seeded() -> (Arc<MemoryStore>, Router) {
    let store = store();
    let app = app(&store);
    let (status, _) = send(&app, Method::POST, "/widget", Some(json!({ "name": "bolt" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    store.insert("tag", json!({ "label": "red" })).unwrap();
    store.insert("tag", json!({ "label": "blue" })).unwrap();
    (store, app)
}

#[tokio::test]
async fn create_returns_created_record() {
    let store = store();
    let app = app(&store);
    let (status, body) = send(&app, Method::POST, "/widget", Some(json!({ "name": "bolt" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "bolt");
    assert_eq!(body["data"]["id"], "1");

    let (status, body) = send(&app, Method::GET, "/widget/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "bolt");
}

#[tokio::test]
async fn get_missing_record_is_not_found() {
    let store = store();
    let app = app(&store);
    for uri in ["/widget/1", "/widget/abc", "/tag/42"] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"]["code"], "not_found");
    }
}

#[tokio::test]
async fn invalid_create_persists_nothing() {
    let store = store();
    let app = app(&store);
    let (status, body) = send(&app, Method::POST, "/widget", Some(json!({ "colour": "red" }))).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["error"]["code"], "validation_error");
    assert!(body["error"]["details"]["name"].is_array());
    assert_eq!(store.count("widget").unwrap(), 0);
}

#[tokio::test]
async fn non_object_body_is_bad_request() {
    let store = store();
    let app = app(&store);
    let (status, _) = send(&app, Method::POST, "/widget", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_and_patch_validate() {
    let (_, app) = seeded().await;
    let (status, body) = send(&app, Method::PUT, "/widget/1", Some(json!({ "name": "nut" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "nut");

    let (status, _) = send(&app, Method::PATCH, "/widget/1", Some(json!({ "name": null }))).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);

    let (_, body) = send(&app, Method::GET, "/widget/1", None).await;
    assert_eq!(body["data"]["name"], "nut");

    let (status, _) = send(&app, Method::PUT, "/widget/9", Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_is_accepted_then_gone() {
    let (store, app) = seeded().await;
    let (status, body) = send(&app, Method::DELETE, "/widget/1", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);
    assert_eq!(store.count("widget").unwrap(), 0);

    let (status, _) = send(&app, Method::DELETE, "/widget/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blacklisted_action_is_not_routed() {
    let (_, app) = seeded().await;
    let (status, _) = send(&app, Method::DELETE, "/tag/1", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = send(&app, Method::GET, "/tag/1", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn list_is_paginated() {
    let (_, app) = seeded().await;
    send(&app, Method::POST, "/widget", Some(json!({ "name": "nut" }))).await;
    send(&app, Method::POST, "/widget", Some(json!({ "name": "gear" }))).await;

    let (status, body) = send(&app, Method::GET, "/widget?per_page=2&page=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["name"], "gear");
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["meta"]["last_page"], 2);
}

#[tokio::test]
async fn attached_tags_are_listed() {
    let (_, app) = seeded().await;
    let (status, _) = send(&app, Method::POST, "/widget/1/tags/1", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = send(&app, Method::POST, "/widget/1/tags/2", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(&app, Method::GET, "/widget/1/tags", None).await;
    assert_eq!(status, StatusCode::OK);
    let labels: Vec<_> = body["data"].as_array().unwrap().iter().map(|t| t["label"].clone()).collect();
    assert_eq!(labels, vec![json!("red"), json!("blue")]);
    assert_eq!(body["meta"]["total"], 2);

    let (_, body) = send(&app, Method::GET, "/widget/1/tags?per_page=1", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"]["last_page"], 2);
}

#[tokio::test]
async fn attach_twice_conflicts() {
    let (_, app) = seeded().await;
    let (status, _) = send(&app, Method::POST, "/widget/1/tags/1", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(&app, Method::POST, "/widget/1/tags/1", None).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["error"]["details"]["conflict"][0], "already attached");
}

#[tokio::test]
async fn attach_unknown_target_or_base_is_not_found() {
    let (_, app) = seeded().await;
    let (status, _) = send(&app, Method::POST, "/widget/1/tags/77", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::POST, "/widget/9/tags/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn detach_requires_existing_link() {
    let (_, app) = seeded().await;
    let (status, _) = send(&app, Method::DELETE, "/widget/1/tags/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, Method::POST, "/widget/1/tags/2", None).await;
    let (status, _) = send(&app, Method::DELETE, "/widget/1/tags/2", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, body) = send(&app, Method::GET, "/widget/1/tags", None).await;
    assert_eq!(body["meta"]["total"], 0);
}

#[tokio::test]
async fn attach_payload_lands_on_pivot() {
    let (_, app) = seeded().await;
    send(&app, Method::POST, "/widget/1/tags/1", Some(json!({ "weight": 3 }))).await;
    let (_, body) = send(&app, Method::GET, "/widget/1/tags", None).await;
    assert_eq!(body["data"][0]["pivot"]["weight"], 3);
}

#[tokio::test]
async fn single_relation_create_conflicts_when_present() {
    let (_, app) = seeded().await;
    let (status, body) = send(&app, Method::GET, "/widget/1/manual", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], Value::Null);

    let (status, body) = send(&app, Method::POST, "/widget/1/manual", Some(json!({ "title": "setup" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["widget_id"], "1");

    let (status, body) = send(&app, Method::POST, "/widget/1/manual", Some(json!({ "title": "again" }))).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["error"]["details"]["conflict"][0], "relation already exists");

    let (_, body) = send(&app, Method::GET, "/widget/1/manual", None).await;
    assert_eq!(body["data"]["title"], "setup");
}

#[tokio::test]
async fn single_relation_detach_clears_link() {
    let (store, app) = seeded().await;
    store.insert("manual", json!({ "title": "loose" })).unwrap();
    let (status, _) = send(&app, Method::POST, "/widget/1/manual/1", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, body) = send(&app, Method::GET, "/widget/1/manual", None).await;
    assert_eq!(body["data"]["title"], "loose");

    let (status, _) = send(&app, Method::DELETE, "/widget/1/manual/1", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (_, body) = send(&app, Method::GET, "/widget/1/manual", None).await;
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn relation_create_validates() {
    let (store, app) = seeded().await;
    let (status, _) = send(&app, Method::POST, "/widget/1/notes", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(store.count("note").unwrap(), 0);

    let (status, body) = send(&app, Method::POST, "/widget/1/notes", Some(json!({ "body": "oiled" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["widget_id"], "1");
}

#[tokio::test]
async fn needs_parent_creates_under_resolved_parent() {
    let (_, app) = seeded().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/note",
        Some(json!({ "body": "hello", "widget_id": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["widget_id"], "1");

    let (_, body) = send(&app, Method::GET, "/widget/1/notes", None).await;
    assert_eq!(body["meta"]["total"], 1);

    let (status, _) = send(&app, Method::POST, "/note", Some(json!({ "body": "orphan" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::POST, "/note", Some(json!({ "body": "x", "widget_id": "9" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn common_routes_are_served() {
    let store = store();
    let app = app(&store);
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Method::GET, "/routes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 3);
    assert_eq!(body["data"][0]["resource"], "widget");
}

#[test]
fn colliding_resources_fail_to_build() {
    let store = store();
    let a = ResourceDefinition::builder("widget").build().unwrap();
    let b = ResourceDefinition::builder("gadget").group_root("widget").build().unwrap();
    let err = ApiBuilder::new()
        .resource(ResourceState::new(a, store.model("widget").unwrap()))
        .resource(ResourceState::new(b, store.model("tag").unwrap()))
        .build()
        .err()
        .unwrap();
    assert!(err.to_string().contains("duplicate route"));
}

/// Widgets "1" and "2" exist and tag "2" is linked, but every write fails in the store.
struct BrokenStore;

fn broken() -> StoreError {
    StoreError::Unavailable("disk full".into())
}

#[async_trait]
impl Creator for BrokenStore {
    fn make(&self, payload: &Payload) -> Record {
        let mut record = Record::new();
        record.fill(payload);
        record
    }

    fn validate(&self, _record: &Record) -> Result<(), ValidationErrors> {
        Ok(())
    }

    async fn save(&self, _record: &mut Record) -> Result<(), StoreError> {
        Err(broken())
    }
}

#[async_trait]
impl Model for BrokenStore {
    fn name(&self) -> &str {
        "widget"
    }

    async fn find(&self, id: &str) -> Result<Option<Record>, StoreError> {
        Ok(["1", "2"].contains(&id).then(|| Record::with_id(id)))
    }

    async fn paginate(&self, page: &PageRequest) -> Result<Page, StoreError> {
        Ok(page.slice(Vec::new(), self.default_per_page()))
    }

    async fn delete(&self, _record: &Record) -> Result<(), StoreError> {
        Err(broken())
    }

    fn relation(&self, _record: &Record, _accessor: &str) -> Result<Arc<dyn Relation>, StoreError> {
        Ok(Arc::new(BrokenStore))
    }
}

#[async_trait]
impl Relation for BrokenStore {
    fn kind(&self) -> RelationKind {
        RelationKind::BelongsToMany
    }

    fn related(&self) -> Arc<dyn Model> {
        Arc::new(BrokenStore)
    }

    async fn first(&self) -> Result<Option<Record>, StoreError> {
        Ok(None)
    }

    async fn paginate(&self, page: &PageRequest) -> Result<Page, StoreError> {
        Ok(page.slice(Vec::new(), 15))
    }

    async fn find(&self, id: &str) -> Result<Option<Record>, StoreError> {
        Ok((id == "2").then(|| Record::with_id(id)))
    }

    async fn associate(&self, _target: &Record, _payload: &Payload) -> Result<(), StoreError> {
        Err(broken())
    }

    async fn attach(&self, _target: &Record, _payload: &Payload) -> Result<(), StoreError> {
        Err(broken())
    }

    async fn detach(&self, _target: &Record) -> Result<(), StoreError> {
        Err(broken())
    }

    async fn disassociate(&self) {}
}

fn broken_app() -> Router {
    let widget = ResourceDefinition::builder("widget").relation_self("tags").build().unwrap();
    ApiBuilder::new()
        .resource(ResourceState::new(widget, Arc::new(BrokenStore)))
        .build()
        .unwrap()
}

async fn assert_internal(app: &Router, method: Method, uri: &str, verb: &str) {
    let (status, body) = send(app, method, uri, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
    assert_eq!(body["error"]["code"], "internal_error");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains(verb), "{}", message);
    assert!(message.contains("this widget"), "{}", message);
}

#[tokio::test]
async fn store_failures_are_internal_errors_naming_the_resource() {
    let app = broken_app();
    assert_internal(&app, Method::DELETE, "/widget/1", "deleting").await;
    assert_internal(&app, Method::POST, "/widget/1/tags/1", "attaching").await;
    assert_internal(&app, Method::DELETE, "/widget/1/tags/2", "detaching").await;
}

#[tokio::test]
async fn store_failures_do_not_mask_lookups() {
    let app = broken_app();
    let (status, _) = send(&app, Method::DELETE, "/widget/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, "/widget/1/tags/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::POST, "/widget/1/tags/2", None).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn needs_parent_without_resolver_is_not_found() {
    let store = store();
    let note = ResourceDefinition::builder("note").needs_parent(true).build().unwrap();
    let app = ApiBuilder::new()
        .resource(ResourceState::new(note, store.model("note").unwrap()))
        .build()
        .unwrap();
    let (status, body) = send(&app, Method::POST, "/note", Some(json!({ "body": "hi", "widget_id": "1" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(store.count("note").unwrap(), 0);
}

#[tokio::test]
async fn list_uses_model_page_size() {
    let store = MemoryStore::new([TableSpec::new("tag").per_page(2)]);
    for label in ["a", "b", "c"] {
        store.insert("tag", json!({ "label": label })).unwrap();
    }
    let tag = ResourceDefinition::builder("tag").build().unwrap();
    let app = ApiBuilder::new()
        .resource(ResourceState::new(tag, store.model("tag").unwrap()))
        .build()
        .unwrap();
    let (_, body) = send(&app, Method::GET, "/tag", None).await;
    assert_eq!(body["meta"]["per_page"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["meta"]["last_page"], 2);
}
