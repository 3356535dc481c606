//! Resolved resource definition: declaration validated and frozen for runtime use.

use crate::config::{validate_definition, ActionTree};
use crate::error::ConfigError;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Exposed relation name -> internal accessor name, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelationTable {
    entries: IndexMap<String, String>,
}

impl RelationTable {
    pub fn new() -> Self {
        RelationTable::default()
    }

    /// Returns the previous accessor if `exposed` was already declared.
    pub fn insert(&mut self, exposed: impl Into<String>, internal: impl Into<String>) -> Option<String> {
        self.entries.insert(exposed.into(), internal.into())
    }

    /// Accessor for an exposed name. A declared internal name also resolves to itself.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let Some(internal) = self.entries.get(name) {
            return Some(internal);
        }
        self.entries
            .values()
            .find(|internal| internal.as_str() == name)
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn exposed_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ResourceDefinition {
    /// Used for the URL prefix and in error messages.
    pub name: String,
    /// Explicit prefix, replacing `name` in URLs.
    pub group_root: Option<String>,
    /// Records are created under a parent relation resolved per request.
    pub needs_parent: bool,
    pub relations: RelationTable,
    /// Disabled actions: `"delete"` or `"<relation>.<action>"`.
    pub blacklist: HashSet<String>,
    pub action_tree: ActionTree,
}

impl ResourceDefinition {
    pub fn builder(name: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder {
            definition: ResourceDefinition {
                name: name.into(),
                group_root: None,
                needs_parent: false,
                relations: RelationTable::new(),
                blacklist: HashSet::new(),
                action_tree: ActionTree::default(),
            },
            duplicate: None,
        }
    }

    /// URL prefix: `/` + lowercased group root or name.
    pub fn prefix(&self) -> String {
        let root = self.group_root.as_deref().unwrap_or(&self.name);
        format!("/{}", root.trim_matches('/').to_lowercase())
    }

    pub fn is_blacklisted(&self, action: &str) -> bool {
        self.blacklist.contains(action)
    }
}

pub struct ResourceBuilder {
    definition: ResourceDefinition,
    duplicate: Option<String>,
}

impl ResourceBuilder {
    pub fn group_root(mut self, root: impl Into<String>) -> Self {
        self.definition.group_root = Some(root.into());
        self
    }

    pub fn needs_parent(mut self, needs_parent: bool) -> Self {
        self.definition.needs_parent = needs_parent;
        self
    }

    /// Expose accessor `internal` as `exposed`.
    pub fn relation(mut self, exposed: impl Into<String>, internal: impl Into<String>) -> Self {
        let exposed = exposed.into();
        if self.definition.relations.insert(exposed.clone(), internal).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(exposed);
        }
        self
    }

    /// Expose accessor `name` under its own name.
    pub fn relation_self(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.relation(name.clone(), name)
    }

    pub fn blacklist(mut self, action: impl Into<String>) -> Self {
        self.definition.blacklist.insert(action.into());
        self
    }

    pub fn actions(mut self, tree: ActionTree) -> Self {
        self.definition.action_tree = tree;
        self
    }

    pub fn build(self) -> Result<ResourceDefinition, ConfigError> {
        if let Some(relation) = self.duplicate {
            return Err(ConfigError::DuplicateRelation {
                resource: self.definition.name,
                relation,
            });
        }
        validate_definition(&self.definition)?;
        Ok(self.definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exposed_then_internal_names() {
        let mut table = RelationTable::new();
        table.insert("tags", "tagRelation");
        table.insert("owner", "owner");
        assert_eq!(table.resolve("tags"), Some("tagRelation"));
        assert_eq!(table.resolve("tagRelation"), Some("tagRelation"));
        assert_eq!(table.resolve("owner"), Some("owner"));
        assert_eq!(table.resolve("colors"), None);
    }

    #[test]
    fn prefix_prefers_group_root_and_lowercases() {
        let def = ResourceDefinition::builder("Widget").build().unwrap();
        assert_eq!(def.prefix(), "/widget");
        let def = ResourceDefinition::builder("Widget").group_root("/Gadgets/").build().unwrap();
        assert_eq!(def.prefix(), "/gadgets");
    }

    #[test]
    fn duplicate_relation_is_rejected() {
        let err = ResourceDefinition::builder("widget")
            .relation("tags", "a")
            .relation("tags", "b")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateRelation {
                resource: "widget".into(),
                relation: "tags".into()
            }
        );
    }
}
