//! Persistence collaborator contract: records, pages, models and typed relations.
//!
//! The framework never touches storage directly. It asks a [`Model`] to find, build,
//! validate, save and delete records, and asks it for a [`Relation`] by accessor name.
//! A relation reports its [`Cardinality`] through its [`RelationKind`], so single and
//! collection relations are told apart without inspecting concrete types.

pub mod memory;

use crate::error::{StoreError, ValidationErrors};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub use memory::{IdStrategy, MemoryStore, RelationSpec, TableSpec};

/// Request body fields.
pub type Payload = HashMap<String, Value>;

/// Page size used when neither the caller nor the model picks one.
pub const DEFAULT_PER_PAGE: u32 = 15;
/// Upper bound for `per_page`.
pub const MAX_PER_PAGE: u32 = 1000;

/// A persisted or not-yet-persisted record. `id` is `None` until saved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Record {
            id: Some(id.into()),
            attributes: Map::new(),
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.attributes.insert(field.into(), value);
    }

    /// Copy payload fields onto the record. `id` is never taken from a payload.
    pub fn fill(&mut self, payload: &Payload) {
        for (k, v) in payload {
            if k == "id" {
                continue;
            }
            self.attributes.insert(k.clone(), v.clone());
        }
    }
}

/// Requested page, 1-based. `per_page` falls back to the model default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: Option<u32>,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            per_page: None,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            per_page,
        }
    }

    /// Effective page size: caller's choice or `default`, clamped to `1..=MAX_PER_PAGE`.
    pub fn size(&self, default: u32) -> u32 {
        self.per_page.unwrap_or(default).clamp(1, MAX_PER_PAGE)
    }

    /// Same page with the size fixed: the caller's choice, else `default`.
    pub fn or_size(self, default: u32) -> Self {
        PageRequest {
            page: self.page,
            per_page: Some(self.size(default)),
        }
    }

    /// Slice an already-ordered result set into one page.
    pub fn slice(&self, records: Vec<Record>, default: u32) -> Page {
        let per_page = self.size(default);
        let total = records.len() as u64;
        let skip = (self.page.saturating_sub(1) as usize).saturating_mul(per_page as usize);
        let data = records.into_iter().skip(skip).take(per_page as usize).collect();
        Page {
            data,
            total,
            per_page,
            current_page: self.page,
        }
    }
}

/// One page of records plus paging metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub data: Vec<Record>,
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
}

impl Page {
    pub fn last_page(&self) -> u32 {
        if self.total == 0 {
            return 1;
        }
        let per_page = u64::from(self.per_page.max(1));
        u32::try_from(self.total.div_ceil(per_page)).unwrap_or(u32::MAX)
    }
}

/// Whether a relation holds at most one record or many.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    Collection,
}

/// Concrete relation kinds a model can expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToMany,
    MorphOne,
    MorphMany,
}

impl RelationKind {
    pub fn cardinality(self) -> Cardinality {
        match self {
            RelationKind::BelongsTo | RelationKind::HasOne | RelationKind::MorphOne => Cardinality::Single,
            RelationKind::HasMany | RelationKind::BelongsToMany | RelationKind::MorphMany => {
                Cardinality::Collection
            }
        }
    }
}

/// Build, validate and persist new records. Implemented by models (free-standing
/// records) and by relations (records created under a parent).
#[async_trait]
pub trait Creator: Send + Sync {
    /// New unsaved record from payload fields.
    fn make(&self, payload: &Payload) -> Record;

    fn validate(&self, record: &Record) -> Result<(), ValidationErrors>;

    /// Persist `record`, assigning its id when new.
    async fn save(&self, record: &mut Record) -> Result<(), StoreError>;
}

/// A record type the framework can serve.
#[async_trait]
pub trait Model: Creator {
    fn name(&self) -> &str;

    /// Page size used when a request names none.
    fn default_per_page(&self) -> u32 {
        DEFAULT_PER_PAGE
    }

    async fn find(&self, id: &str) -> Result<Option<Record>, StoreError>;

    async fn paginate(&self, page: &PageRequest) -> Result<Page, StoreError>;

    /// Apply payload fields to an existing record without persisting.
    fn fill(&self, record: &mut Record, payload: &Payload) {
        record.fill(payload);
    }

    async fn delete(&self, record: &Record) -> Result<(), StoreError>;

    /// Relation accessor `accessor` bound to `record`.
    fn relation(&self, record: &Record, accessor: &str) -> Result<Arc<dyn Relation>, StoreError>;
}

/// A relation bound to one parent record. Creating through it yields a record
/// already linked to the parent.
#[async_trait]
pub trait Relation: Creator {
    fn kind(&self) -> RelationKind;

    fn cardinality(&self) -> Cardinality {
        self.kind().cardinality()
    }

    /// Model of the related records; attach targets are resolved against it.
    fn related(&self) -> Arc<dyn Model>;

    /// Current value of a single relation, or the first of a collection.
    async fn first(&self) -> Result<Option<Record>, StoreError>;

    async fn paginate(&self, page: &PageRequest) -> Result<Page, StoreError>;

    /// Associated record with id `id`, if linked to the parent.
    async fn find(&self, id: &str) -> Result<Option<Record>, StoreError>;

    /// Link an existing record to a single relation.
    async fn associate(&self, target: &Record, payload: &Payload) -> Result<(), StoreError>;

    /// Link an existing record to a collection relation.
    async fn attach(&self, target: &Record, payload: &Payload) -> Result<(), StoreError>;

    /// Unlink one record from a collection relation.
    async fn detach(&self, target: &Record) -> Result<(), StoreError>;

    /// Clear a single relation.
    async fn disassociate(&self);
}
