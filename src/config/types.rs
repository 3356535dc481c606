//! Raw config types matching the JSON resource declarations.

use crate::config::ActionTree;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

impl ValidationRule {
    pub fn required() -> Self {
        ValidationRule {
            required: Some(true),
            ..Default::default()
        }
    }
}

/// Relations as declared: `{"tags": "tagRelation"}` or `["tags"]` (self-mapped).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationsConfig {
    Mapped(IndexMap<String, String>),
    Listed(Vec<String>),
}

impl Default for RelationsConfig {
    fn default() -> Self {
        RelationsConfig::Listed(Vec::new())
    }
}

impl RelationsConfig {
    /// (exposed, internal) pairs in declaration order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        match self {
            RelationsConfig::Mapped(m) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            RelationsConfig::Listed(v) => v.iter().map(|n| (n.clone(), n.clone())).collect(),
        }
    }
}

/// One resource declaration. `actions` absent means the default tree.
#[derive(Clone, Debug, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    #[serde(default)]
    pub group_root: Option<String>,
    #[serde(default)]
    pub needs_parent: bool,
    #[serde(default)]
    pub relations: RelationsConfig,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub actions: Option<ActionTree>,
}
