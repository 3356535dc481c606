//! Declarative action tree: which actions a resource exposes and under which path segments.
//!
//! JSON form mirrors the grouping arrays resources are usually written with: string entries
//! are action leaves, object entries map a path segment (or `%RELATION%`) to a nested array.
//!
//! ```json
//! ["list", "create", {"{id}": ["get", "update", {"%RELATION%": ["get", {"{relationId}": ["attach"]}]}]}]
//! ```

use crate::error::ConfigError;
use axum::http::Method;
use axum::routing::MethodFilter;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Branch key that expands once per declared relation.
pub const RELATION_WILDCARD: &str = "%RELATION%";

/// HTTP verbs the composer emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    pub fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Patch => MethodFilter::PATCH,
            Verb::Delete => MethodFilter::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six standard resource actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    List,
    Get,
    Create,
    Update,
    Delete,
    Patch,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::List,
        Action::Get,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Patch,
    ];

    pub fn parse(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Get => "get",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Patch => "patch",
        }
    }

    /// Verb and path suffix appended to the current prefix.
    pub fn route(self) -> (Verb, &'static str) {
        match self {
            Action::List | Action::Get => (Verb::Get, ""),
            Action::Create => (Verb::Post, ""),
            Action::Update => (Verb::Put, ""),
            Action::Delete => (Verb::Delete, ""),
            Action::Patch => (Verb::Patch, ""),
        }
    }
}

/// Operations on a relation sub-path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationAction {
    Get,
    Create,
    Attach,
    Detach,
}

impl RelationAction {
    pub const ALL: [RelationAction; 4] = [
        RelationAction::Get,
        RelationAction::Create,
        RelationAction::Attach,
        RelationAction::Detach,
    ];

    pub fn parse(name: &str) -> Option<RelationAction> {
        RelationAction::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            RelationAction::Get => "get",
            RelationAction::Create => "create",
            RelationAction::Attach => "attach",
            RelationAction::Detach => "detach",
        }
    }

    pub fn verb(self) -> Verb {
        match self {
            RelationAction::Get => Verb::Get,
            RelationAction::Create | RelationAction::Attach => Verb::Post,
            RelationAction::Detach => Verb::Delete,
        }
    }

    /// Attach and detach address one related record by id.
    pub fn takes_target(self) -> bool {
        matches!(self, RelationAction::Attach | RelationAction::Detach)
    }

    /// Operation requested by `method` on a relation path, with or without a target id.
    pub fn classify(method: &Method, has_target: bool) -> Option<RelationAction> {
        match (method.as_str(), has_target) {
            ("GET", false) => Some(RelationAction::Get),
            ("POST", false) => Some(RelationAction::Create),
            ("POST", true) => Some(RelationAction::Attach),
            ("DELETE", true) => Some(RelationAction::Detach),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionTreeNode {
    /// Action name; checked against the closed action sets when compiled.
    Leaf(String),
    /// Path segment (literal or `{placeholder}`) with nested nodes.
    Branch(String, Vec<ActionTreeNode>),
    /// Expanded once per declared relation.
    RelationExpansion(Vec<ActionTreeNode>),
}

impl ActionTreeNode {
    pub fn leaf(name: &str) -> Self {
        ActionTreeNode::Leaf(name.to_string())
    }

    pub fn branch(segment: &str, children: Vec<ActionTreeNode>) -> Self {
        ActionTreeNode::Branch(segment.to_string(), children)
    }
}

/// Root of an action tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionTree(pub Vec<ActionTreeNode>);

impl Default for ActionTree {
    /// `list`, `create`, then `{id}` with `get`, `update`, `delete`, `patch` and a relation
    /// expansion offering `get`, `create` and `{relationId}` with `attach`, `detach`.
    fn default() -> Self {
        use ActionTreeNode as N;
        ActionTree(vec![
            N::leaf("list"),
            N::leaf("create"),
            N::branch(
                "{id}",
                vec![
                    N::leaf("get"),
                    N::leaf("update"),
                    N::leaf("delete"),
                    N::leaf("patch"),
                    N::RelationExpansion(vec![
                        N::leaf("get"),
                        N::leaf("create"),
                        N::branch("{relationId}", vec![N::leaf("attach"), N::leaf("detach")]),
                    ]),
                ],
            ),
        ])
    }
}

impl ActionTree {
    pub fn nodes(&self) -> &[ActionTreeNode] {
        &self.0
    }

    /// Parse the JSON array form.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ConfigError> {
        parse_nodes(value).map(ActionTree)
    }
}

fn parse_nodes(value: &serde_json::Value) -> Result<Vec<ActionTreeNode>, ConfigError> {
    let items = value
        .as_array()
        .ok_or_else(|| ConfigError::InvalidTree(format!("expected an array, got {}", value)))?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            serde_json::Value::String(name) => out.push(ActionTreeNode::Leaf(name.clone())),
            serde_json::Value::Object(obj) => {
                for (key, children) in obj {
                    let children = parse_nodes(children)?;
                    if key == RELATION_WILDCARD {
                        out.push(ActionTreeNode::RelationExpansion(children));
                    } else {
                        out.push(ActionTreeNode::Branch(key.clone(), children));
                    }
                }
            }
            other => {
                return Err(ConfigError::InvalidTree(format!(
                    "entries must be action names or {{segment: [...]}} objects, got {}",
                    other
                )))
            }
        }
    }
    Ok(out)
}

impl<'de> Deserialize<'de> for ActionTree {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        ActionTree::from_value(&v).map_err(serde::de::Error::custom)
    }
}
