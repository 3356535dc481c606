//! In-memory store implementing the model contract. Used by tests and the example consumer.
//!
//! Rows live in insertion-ordered tables behind one `RwLock`. Relations are resolved
//! from foreign-key columns (`belongs_to`, `has_one`, `has_many`), `{name}_id` /
//! `{name}_type` column pairs (`morph_one`, `morph_many`) or pivot rows (`belongs_to_many`).

use crate::config::ValidationRule;
use crate::error::{StoreError, ValidationErrors};
use crate::model::{Creator, Model, Page, PageRequest, Payload, Record, Relation, RelationKind, DEFAULT_PER_PAGE};
use crate::service::RequestValidator;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// How a table assigns ids to new rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdStrategy {
    #[default]
    Increment,
    Uuid,
}

/// Relation declared on a table, keyed by accessor name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationSpec {
    /// This table holds `foreign_key` pointing at `related`.
    BelongsTo { related: String, foreign_key: String },
    /// `related` holds `foreign_key` pointing at this table; at most one row.
    HasOne { related: String, foreign_key: String },
    HasMany { related: String, foreign_key: String },
    /// Rows linked through `pivot`; pivot rows may carry attributes.
    BelongsToMany { related: String, pivot: String },
    /// `related` holds `{morph}_id` and `{morph}_type`; at most one row.
    MorphOne { related: String, morph: String },
    MorphMany { related: String, morph: String },
}

impl RelationSpec {
    pub fn belongs_to(related: &str, foreign_key: &str) -> Self {
        RelationSpec::BelongsTo {
            related: related.into(),
            foreign_key: foreign_key.into(),
        }
    }

    pub fn has_one(related: &str, foreign_key: &str) -> Self {
        RelationSpec::HasOne {
            related: related.into(),
            foreign_key: foreign_key.into(),
        }
    }

    pub fn has_many(related: &str, foreign_key: &str) -> Self {
        RelationSpec::HasMany {
            related: related.into(),
            foreign_key: foreign_key.into(),
        }
    }

    pub fn belongs_to_many(related: &str, pivot: &str) -> Self {
        RelationSpec::BelongsToMany {
            related: related.into(),
            pivot: pivot.into(),
        }
    }

    pub fn morph_one(related: &str, morph: &str) -> Self {
        RelationSpec::MorphOne {
            related: related.into(),
            morph: morph.into(),
        }
    }

    pub fn morph_many(related: &str, morph: &str) -> Self {
        RelationSpec::MorphMany {
            related: related.into(),
            morph: morph.into(),
        }
    }

    pub fn kind(&self) -> RelationKind {
        match self {
            RelationSpec::BelongsTo { .. } => RelationKind::BelongsTo,
            RelationSpec::HasOne { .. } => RelationKind::HasOne,
            RelationSpec::HasMany { .. } => RelationKind::HasMany,
            RelationSpec::BelongsToMany { .. } => RelationKind::BelongsToMany,
            RelationSpec::MorphOne { .. } => RelationKind::MorphOne,
            RelationSpec::MorphMany { .. } => RelationKind::MorphMany,
        }
    }

    pub fn related(&self) -> &str {
        match self {
            RelationSpec::BelongsTo { related, .. }
            | RelationSpec::HasOne { related, .. }
            | RelationSpec::HasMany { related, .. }
            | RelationSpec::BelongsToMany { related, .. }
            | RelationSpec::MorphOne { related, .. }
            | RelationSpec::MorphMany { related, .. } => related,
        }
    }
}

/// Table declaration: id strategy, page size, validation rules and relations.
#[derive(Clone, Debug)]
pub struct TableSpec {
    pub name: String,
    pub id_strategy: IdStrategy,
    pub per_page: u32,
    pub rules: HashMap<String, ValidationRule>,
    pub relations: HashMap<String, RelationSpec>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        TableSpec {
            name: name.into(),
            id_strategy: IdStrategy::Increment,
            per_page: DEFAULT_PER_PAGE,
            rules: HashMap::new(),
            relations: HashMap::new(),
        }
    }

    pub fn uuid_ids(mut self) -> Self {
        self.id_strategy = IdStrategy::Uuid;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn rule(mut self, field: impl Into<String>, rule: ValidationRule) -> Self {
        self.rules.insert(field.into(), rule);
        self
    }

    pub fn relation(mut self, accessor: impl Into<String>, spec: RelationSpec) -> Self {
        self.relations.insert(accessor.into(), spec);
        self
    }
}

#[derive(Clone, Debug)]
struct PivotRow {
    left: (String, String),
    right: (String, String),
    attributes: Map<String, Value>,
}

impl PivotRow {
    fn other_end(&self, table: &str, id: &str) -> Option<&(String, String)> {
        if self.left.0 == table && self.left.1 == id {
            Some(&self.right)
        } else if self.right.0 == table && self.right.1 == id {
            Some(&self.left)
        } else {
            None
        }
    }

    fn links(&self, a: (&str, &str), b: (&str, &str)) -> bool {
        let left = (self.left.0.as_str(), self.left.1.as_str());
        let right = (self.right.0.as_str(), self.right.1.as_str());
        (left == a && right == b) || (left == b && right == a)
    }
}

#[derive(Default)]
struct Data {
    tables: HashMap<String, IndexMap<String, Record>>,
    counters: HashMap<String, u64>,
    pivots: HashMap<String, Vec<PivotRow>>,
}

impl Data {
    fn rows<'a>(&'a self, table: &str) -> impl Iterator<Item = &'a Record> + 'a {
        self.tables.get(table).into_iter().flat_map(|t| t.values())
    }

    fn row(&self, table: &str, id: &str) -> Option<&Record> {
        self.tables.get(table).and_then(|t| t.get(id))
    }

    fn row_mut(&mut self, table: &str, id: &str) -> Option<&mut Record> {
        self.tables.get_mut(table).and_then(|t| t.get_mut(id))
    }

    fn next_id(&mut self, spec: &TableSpec) -> String {
        match spec.id_strategy {
            IdStrategy::Increment => {
                let counter = self.counters.entry(spec.name.clone()).or_insert(0);
                *counter += 1;
                counter.to_string()
            }
            IdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
        }
    }

    fn save(&mut self, spec: &TableSpec, record: &mut Record) {
        let id = match record.id.clone() {
            Some(id) => id,
            None => {
                let id = self.next_id(spec);
                record.id = Some(id.clone());
                id
            }
        };
        let now = now();
        if !record.attributes.contains_key("created_at") {
            record.set("created_at", now.clone());
        }
        record.set("updated_at", now);
        self.tables
            .entry(spec.name.clone())
            .or_default()
            .insert(id, record.clone());
    }

    fn remove(&mut self, table: &str, id: &str) -> Option<Record> {
        let removed = self.tables.get_mut(table).and_then(|t| t.shift_remove(id));
        if removed.is_some() {
            for rows in self.pivots.values_mut() {
                rows.retain(|p| p.other_end(table, id).is_none());
            }
        }
        removed
    }
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

fn touch(record: &mut Record) {
    record.set("updated_at", now());
}

/// String form of an id column value.
fn id_of(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn refers_to(value: Option<&Value>, id: &str) -> bool {
    id_of(value).is_some_and(|v| v == id)
}

/// Shared in-memory database.
pub struct MemoryStore {
    specs: HashMap<String, Arc<TableSpec>>,
    data: RwLock<Data>,
}

impl MemoryStore {
    pub fn new(tables: impl IntoIterator<Item = TableSpec>) -> Arc<Self> {
        let specs = tables
            .into_iter()
            .map(|t| (t.name.clone(), Arc::new(t)))
            .collect();
        Arc::new(MemoryStore {
            specs,
            data: RwLock::new(Data::default()),
        })
    }

    /// Model handle for `table`.
    pub fn model(self: &Arc<Self>, table: &str) -> Result<Arc<dyn Model>, StoreError> {
        let spec = self.spec(table)?;
        Ok(Arc::new(MemoryModel {
            store: Arc::clone(self),
            spec,
        }))
    }

    /// Insert a row directly, bypassing validation.
    pub fn insert(&self, table: &str, attributes: Value) -> Result<Record, StoreError> {
        let spec = self.spec(table)?;
        let mut record = Record {
            id: None,
            attributes: match attributes {
                Value::Object(m) => m,
                _ => Map::new(),
            },
        };
        self.write()?.save(&spec, &mut record);
        Ok(record)
    }

    /// Number of rows in `table`.
    pub fn count(&self, table: &str) -> Result<usize, StoreError> {
        Ok(self.read()?.rows(table).count())
    }

    fn spec(&self, table: &str) -> Result<Arc<TableSpec>, StoreError> {
        self.specs
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::MissingTable(table.to_string()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Data>, StoreError> {
        self.data
            .read()
            .map_err(|_| StoreError::Unavailable("state lock".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Data>, StoreError> {
        self.data
            .write()
            .map_err(|_| StoreError::Unavailable("state lock".into()))
    }
}

struct MemoryModel {
    store: Arc<MemoryStore>,
    spec: Arc<TableSpec>,
}

#[async_trait]
impl Creator for MemoryModel {
    fn make(&self, payload: &Payload) -> Record {
        let mut record = Record::new();
        record.fill(payload);
        record
    }

    fn validate(&self, record: &Record) -> Result<(), ValidationErrors> {
        RequestValidator::validate(&record.attributes, &self.spec.rules)
    }

    async fn save(&self, record: &mut Record) -> Result<(), StoreError> {
        self.store.write()?.save(&self.spec, record);
        Ok(())
    }
}

#[async_trait]
impl Model for MemoryModel {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn default_per_page(&self) -> u32 {
        self.spec.per_page
    }

    async fn find(&self, id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.store.read()?.row(&self.spec.name, id).cloned())
    }

    async fn paginate(&self, page: &PageRequest) -> Result<Page, StoreError> {
        let rows: Vec<Record> = self.store.read()?.rows(&self.spec.name).cloned().collect();
        Ok(page.slice(rows, self.spec.per_page))
    }

    async fn delete(&self, record: &Record) -> Result<(), StoreError> {
        let id = record
            .key()
            .ok_or_else(|| StoreError::Rejected("cannot delete an unsaved record".into()))?;
        self.store
            .write()?
            .remove(&self.spec.name, id)
            .map(|_| ())
            .ok_or_else(|| StoreError::Rejected(format!("{} {} no longer exists", self.spec.name, id)))
    }

    fn relation(&self, record: &Record, accessor: &str) -> Result<Arc<dyn Relation>, StoreError> {
        let spec = self
            .spec
            .relations
            .get(accessor)
            .cloned()
            .ok_or_else(|| StoreError::MissingRelation {
                model: self.spec.name.clone(),
                relation: accessor.to_string(),
            })?;
        let parent_id = record
            .key()
            .ok_or_else(|| StoreError::Rejected("relation on an unsaved record".into()))?;
        let related = self.store.spec(spec.related())?;
        Ok(Arc::new(MemoryRelation {
            store: Arc::clone(&self.store),
            parent_table: self.spec.name.clone(),
            parent_id: parent_id.to_string(),
            spec,
            related,
        }))
    }
}

struct MemoryRelation {
    store: Arc<MemoryStore>,
    parent_table: String,
    parent_id: String,
    spec: RelationSpec,
    related: Arc<TableSpec>,
}

impl MemoryRelation {
    fn linked(&self, data: &Data) -> Vec<Record> {
        let table = self.related.name.as_str();
        match &self.spec {
            RelationSpec::BelongsTo { foreign_key, .. } => data
                .row(&self.parent_table, &self.parent_id)
                .and_then(|p| id_of(p.get(foreign_key)))
                .and_then(|fk| data.row(table, &fk))
                .cloned()
                .into_iter()
                .collect(),
            RelationSpec::HasOne { foreign_key, .. } | RelationSpec::HasMany { foreign_key, .. } => data
                .rows(table)
                .filter(|r| refers_to(r.get(foreign_key), &self.parent_id))
                .cloned()
                .collect(),
            RelationSpec::MorphOne { morph, .. } | RelationSpec::MorphMany { morph, .. } => {
                let id_col = format!("{}_id", morph);
                let type_col = format!("{}_type", morph);
                data.rows(table)
                    .filter(|r| {
                        refers_to(r.get(&id_col), &self.parent_id)
                            && r.get(&type_col).and_then(Value::as_str) == Some(self.parent_table.as_str())
                    })
                    .cloned()
                    .collect()
            }
            RelationSpec::BelongsToMany { pivot, .. } => data
                .pivots
                .get(pivot)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|p| {
                            let (t, id) = p.other_end(&self.parent_table, &self.parent_id)?;
                            if t != table {
                                return None;
                            }
                            let mut r = data.row(t, id)?.clone();
                            if !p.attributes.is_empty() {
                                r.set("pivot", Value::Object(p.attributes.clone()));
                            }
                            Some(r)
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Point the foreign-key columns of `record` at the parent.
    fn link_fields(&self, record: &mut Record) {
        match &self.spec {
            RelationSpec::HasOne { foreign_key, .. } | RelationSpec::HasMany { foreign_key, .. } => {
                record.set(foreign_key.clone(), Value::String(self.parent_id.clone()));
            }
            RelationSpec::MorphOne { morph, .. } | RelationSpec::MorphMany { morph, .. } => {
                record.set(format!("{}_id", morph), Value::String(self.parent_id.clone()));
                record.set(format!("{}_type", morph), Value::String(self.parent_table.clone()));
            }
            RelationSpec::BelongsTo { .. } | RelationSpec::BelongsToMany { .. } => {}
        }
    }

    fn unlink_fields(&self, record: &mut Record) {
        match &self.spec {
            RelationSpec::HasOne { foreign_key, .. } | RelationSpec::HasMany { foreign_key, .. } => {
                record.set(foreign_key.clone(), Value::Null);
            }
            RelationSpec::MorphOne { morph, .. } | RelationSpec::MorphMany { morph, .. } => {
                record.set(format!("{}_id", morph), Value::Null);
                record.set(format!("{}_type", morph), Value::Null);
            }
            RelationSpec::BelongsTo { .. } | RelationSpec::BelongsToMany { .. } => {}
        }
        touch(record);
    }

    fn set_parent_key(&self, data: &mut Data, foreign_key: &str, value: Value) -> Result<(), StoreError> {
        let parent = data
            .row_mut(&self.parent_table, &self.parent_id)
            .ok_or_else(|| StoreError::Rejected(format!("{} {} no longer exists", self.parent_table, self.parent_id)))?;
        parent.set(foreign_key.to_string(), value);
        touch(parent);
        Ok(())
    }

    fn unlink_all(&self, data: &mut Data) {
        let ids: Vec<String> = self.linked(data).into_iter().filter_map(|r| r.id).collect();
        let table = self.related.name.clone();
        for id in ids {
            if let Some(row) = data.row_mut(&table, &id) {
                self.unlink_fields(row);
            }
        }
    }

    fn target_id(target: &Record) -> Result<&str, StoreError> {
        target
            .key()
            .ok_or_else(|| StoreError::Rejected("cannot link an unsaved record".into()))
    }

    fn wrong_cardinality(&self, op: &str) -> StoreError {
        StoreError::Rejected(format!("{} is not supported on {:?}", op, self.spec.kind()))
    }
}

#[async_trait]
impl Creator for MemoryRelation {
    fn make(&self, payload: &Payload) -> Record {
        let mut record = Record::new();
        record.fill(payload);
        self.link_fields(&mut record);
        record
    }

    fn validate(&self, record: &Record) -> Result<(), ValidationErrors> {
        RequestValidator::validate(&record.attributes, &self.related.rules)
    }

    async fn save(&self, record: &mut Record) -> Result<(), StoreError> {
        let mut data = self.store.write()?;
        data.save(&self.related, record);
        let id = Self::target_id(record)?.to_string();
        match &self.spec {
            RelationSpec::BelongsTo { foreign_key, .. } => {
                self.set_parent_key(&mut data, foreign_key, Value::String(id))?;
            }
            RelationSpec::BelongsToMany { pivot, .. } => {
                let rows = data.pivots.entry(pivot.clone()).or_default();
                let a = (self.parent_table.as_str(), self.parent_id.as_str());
                let b = (self.related.name.as_str(), id.as_str());
                if !rows.iter().any(|p| p.links(a, b)) {
                    rows.push(PivotRow {
                        left: (self.parent_table.clone(), self.parent_id.clone()),
                        right: (self.related.name.clone(), id),
                        attributes: Map::new(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl Relation for MemoryRelation {
    fn kind(&self) -> RelationKind {
        self.spec.kind()
    }

    fn related(&self) -> Arc<dyn Model> {
        Arc::new(MemoryModel {
            store: Arc::clone(&self.store),
            spec: Arc::clone(&self.related),
        })
    }

    async fn first(&self) -> Result<Option<Record>, StoreError> {
        Ok(self.linked(&*self.store.read()?).into_iter().next())
    }

    async fn paginate(&self, page: &PageRequest) -> Result<Page, StoreError> {
        let rows = self.linked(&*self.store.read()?);
        Ok(page.slice(rows, self.related.per_page))
    }

    async fn find(&self, id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self
            .linked(&*self.store.read()?)
            .into_iter()
            .find(|r| r.key() == Some(id)))
    }

    async fn associate(&self, target: &Record, payload: &Payload) -> Result<(), StoreError> {
        let id = Self::target_id(target)?;
        let mut data = self.store.write()?;
        match &self.spec {
            RelationSpec::BelongsTo { foreign_key, .. } => {
                self.set_parent_key(&mut data, foreign_key, Value::String(id.to_string()))
            }
            RelationSpec::HasOne { .. } | RelationSpec::MorphOne { .. } => {
                self.unlink_all(&mut data);
                let row = data
                    .row_mut(&self.related.name, id)
                    .ok_or_else(|| StoreError::Rejected(format!("{} {} no longer exists", self.related.name, id)))?;
                row.fill(payload);
                self.link_fields(row);
                touch(row);
                Ok(())
            }
            _ => Err(self.wrong_cardinality("associate")),
        }
    }

    async fn attach(&self, target: &Record, payload: &Payload) -> Result<(), StoreError> {
        let id = Self::target_id(target)?;
        let mut data = self.store.write()?;
        match &self.spec {
            RelationSpec::HasMany { .. } | RelationSpec::MorphMany { .. } => {
                let row = data
                    .row_mut(&self.related.name, id)
                    .ok_or_else(|| StoreError::Rejected(format!("{} {} no longer exists", self.related.name, id)))?;
                self.link_fields(row);
                touch(row);
                Ok(())
            }
            RelationSpec::BelongsToMany { pivot, .. } => {
                let rows = data.pivots.entry(pivot.clone()).or_default();
                let a = (self.parent_table.as_str(), self.parent_id.as_str());
                let b = (self.related.name.as_str(), id);
                if rows.iter().any(|p| p.links(a, b)) {
                    return Err(StoreError::Rejected(format!("{} {} already linked", self.related.name, id)));
                }
                rows.push(PivotRow {
                    left: (self.parent_table.clone(), self.parent_id.clone()),
                    right: (self.related.name.clone(), id.to_string()),
                    attributes: payload.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                });
                Ok(())
            }
            _ => Err(self.wrong_cardinality("attach")),
        }
    }

    async fn detach(&self, target: &Record) -> Result<(), StoreError> {
        let id = Self::target_id(target)?;
        let mut data = self.store.write()?;
        match &self.spec {
            RelationSpec::HasMany { .. } | RelationSpec::MorphMany { .. } => {
                let linked = self.linked(&data).iter().any(|r| r.key() == Some(id));
                if !linked {
                    return Err(StoreError::Rejected(format!("{} {} is not linked", self.related.name, id)));
                }
                if let Some(row) = data.row_mut(&self.related.name, id) {
                    self.unlink_fields(row);
                }
                Ok(())
            }
            RelationSpec::BelongsToMany { pivot, .. } => {
                let rows = data.pivots.entry(pivot.clone()).or_default();
                let before = rows.len();
                let a = (self.parent_table.as_str(), self.parent_id.as_str());
                let b = (self.related.name.as_str(), id);
                rows.retain(|p| !p.links(a, b));
                if rows.len() == before {
                    return Err(StoreError::Rejected(format!("{} {} is not linked", self.related.name, id)));
                }
                Ok(())
            }
            _ => Err(self.wrong_cardinality("detach")),
        }
    }

    async fn disassociate(&self) {
        let mut data = match self.store.write() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, relation = ?self.spec, "disassociate skipped");
                return;
            }
        };
        match &self.spec {
            RelationSpec::BelongsTo { foreign_key, .. } => {
                if let Err(e) = self.set_parent_key(&mut data, foreign_key, Value::Null) {
                    tracing::warn!(error = %e, "disassociate on missing parent");
                }
            }
            RelationSpec::HasOne { .. } | RelationSpec::MorphOne { .. } => self.unlink_all(&mut data),
            _ => tracing::warn!(relation = ?self.spec, "disassociate on a collection relation ignored"),
        }
    }
}
