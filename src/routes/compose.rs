//! Grouping composer: compiles a resource's action tree into its route table.
//!
//! Leaves become one route each, unless blacklisted. Literal and placeholder branches
//! extend the current prefix. A `%RELATION%` branch is expanded once per declared relation,
//! in declaration order, under `<prefix>/<exposed name>`; inside it `get` and `create` sit
//! directly on the relation path while `attach` and `detach` sit under exactly one target
//! segment. Every relation route is served by the one generic relation handler.

use crate::config::{Action, ActionTreeNode, RelationAction, ResourceDefinition, Verb};
use crate::config::{ensure_disjoint_paths, ensure_unique_routes};
use crate::error::ConfigError;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// What serves a route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerRef {
    Action { action: Action },
    /// The generic relation handler; `relation` and `action` are informational.
    Relation { relation: String, action: RelationAction },
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Action { action } => f.write_str(action.name()),
            HandlerRef::Relation { relation, action } => write!(f, "relation({}.{})", relation, action.name()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub verb: Verb,
    /// Template with `{placeholder}` segments, e.g. `/widget/{id}/tags`.
    pub path: String,
    pub handler: HandlerRef,
}

/// Compiled routes of one resource, in tree declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteTable {
    pub resource: String,
    pub entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn find(&self, verb: Verb, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.verb == verb && e.path == path)
    }
}

impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in &self.entries {
            writeln!(f, "{:<7}{:<45}{}", e.verb.as_str(), e.path, e.handler)?;
        }
        Ok(())
    }
}

/// Compile `def` into its route table. Deterministic for identical input.
pub fn compile(def: &ResourceDefinition) -> Result<RouteTable, ConfigError> {
    let mut composer = Composer {
        def,
        entries: Vec::new(),
    };
    composer.group(def.action_tree.nodes(), &def.prefix(), 0)?;
    let table = RouteTable {
        resource: def.name.clone(),
        entries: composer.entries,
    };
    ensure_unique_routes([&table])?;
    ensure_disjoint_paths(std::slice::from_ref(&table))?;
    for e in &table.entries {
        check_placeholders(&e.path)?;
        tracing::debug!(resource = %def.name, verb = %e.verb, path = %e.path, handler = %e.handler, "route");
    }
    Ok(table)
}

struct Composer<'a> {
    def: &'a ResourceDefinition,
    entries: Vec<RouteEntry>,
}

impl Composer<'_> {
    fn group(&mut self, nodes: &[ActionTreeNode], prefix: &str, depth: usize) -> Result<(), ConfigError> {
        for node in nodes {
            match node {
                ActionTreeNode::Leaf(name) => {
                    let action = Action::parse(name).ok_or_else(|| ConfigError::UnknownAction {
                        resource: self.def.name.clone(),
                        action: name.clone(),
                    })?;
                    if self.def.is_blacklisted(action.name()) {
                        continue;
                    }
                    let (verb, suffix) = action.route();
                    self.entries.push(RouteEntry {
                        verb,
                        path: join(prefix, suffix),
                        handler: HandlerRef::Action { action },
                    });
                }
                ActionTreeNode::Branch(segment, children) => {
                    self.group(children, &join(prefix, segment), depth + 1)?;
                }
                ActionTreeNode::RelationExpansion(children) => {
                    if depth == 0 {
                        return Err(ConfigError::MisplacedRelationExpansion(self.def.name.clone()));
                    }
                    let def = self.def;
                    for relation in def.relations.exposed_names() {
                        self.relation(relation, children, &join(prefix, relation), false)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn relation(
        &mut self,
        relation: &str,
        nodes: &[ActionTreeNode],
        path: &str,
        under_target: bool,
    ) -> Result<(), ConfigError> {
        for node in nodes {
            match node {
                ActionTreeNode::Leaf(name) => {
                    let action = RelationAction::parse(name).ok_or_else(|| ConfigError::UnknownRelationAction {
                        resource: self.def.name.clone(),
                        action: name.clone(),
                    })?;
                    if action.takes_target() != under_target {
                        return Err(ConfigError::MisplacedRelationAction {
                            resource: self.def.name.clone(),
                            action: name.clone(),
                        });
                    }
                    if self.def.is_blacklisted(&format!("{}.{}", relation, action.name())) {
                        continue;
                    }
                    self.entries.push(RouteEntry {
                        verb: action.verb(),
                        path: path.to_string(),
                        handler: HandlerRef::Relation {
                            relation: relation.to_string(),
                            action,
                        },
                    });
                }
                ActionTreeNode::Branch(segment, children) => {
                    if under_target {
                        return Err(ConfigError::InvalidTree(format!(
                            "relation target segment '{}' in resource '{}' is nested too deep",
                            segment, self.def.name
                        )));
                    }
                    self.relation(relation, children, &join(path, segment), true)?;
                }
                ActionTreeNode::RelationExpansion(_) => {
                    return Err(ConfigError::MisplacedRelationExpansion(self.def.name.clone()));
                }
            }
        }
        Ok(())
    }
}

fn join(prefix: &str, segment: &str) -> String {
    let segment = segment.trim_matches('/');
    if segment.is_empty() {
        return prefix.to_string();
    }
    format!("{}/{}", prefix.trim_end_matches('/'), segment)
}

/// Placeholder names must be unique within one path.
fn check_placeholders(path: &str) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for segment in path.split('/') {
        if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if name.is_empty() || !seen.insert(name) {
                return Err(ConfigError::InvalidTree(format!("bad placeholder in {}", path)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionTree, ActionTreeNode as N};

    fn widget() -> crate::config::ResourceBuilder {
        ResourceDefinition::builder("widget").relation("tags", "tagRelation")
    }

    fn routes(table: &RouteTable) -> Vec<(Verb, &str)> {
        table.entries.iter().map(|e| (e.verb, e.path.as_str())).collect()
    }

    #[test]
    fn default_tree_emits_six_plus_four_per_relation() {
        let def = widget().relation("owner", "owner").build().unwrap();
        let table = compile(&def).unwrap();
        assert_eq!(table.entries.len(), 6 + 4 * 2);
        assert_eq!(
            routes(&table),
            vec![
                (Verb::Get, "/widget"),
                (Verb::Post, "/widget"),
                (Verb::Get, "/widget/{id}"),
                (Verb::Put, "/widget/{id}"),
                (Verb::Delete, "/widget/{id}"),
                (Verb::Patch, "/widget/{id}"),
                (Verb::Get, "/widget/{id}/tags"),
                (Verb::Post, "/widget/{id}/tags"),
                (Verb::Post, "/widget/{id}/tags/{relationId}"),
                (Verb::Delete, "/widget/{id}/tags/{relationId}"),
                (Verb::Get, "/widget/{id}/owner"),
                (Verb::Post, "/widget/{id}/owner"),
                (Verb::Post, "/widget/{id}/owner/{relationId}"),
                (Verb::Delete, "/widget/{id}/owner/{relationId}"),
            ]
        );
    }

    #[test]
    fn no_relations_means_six_routes() {
        let def = ResourceDefinition::builder("tag").build().unwrap();
        assert_eq!(compile(&def).unwrap().entries.len(), 6);
    }

    #[test]
    fn compile_is_deterministic() {
        let def = widget().build().unwrap();
        assert_eq!(compile(&def).unwrap(), compile(&def).unwrap());
    }

    #[test]
    fn relation_routes_use_the_generic_handler() {
        let table = compile(&widget().build().unwrap()).unwrap();
        let e = table.find(Verb::Post, "/widget/{id}/tags/{relationId}").unwrap();
        assert_eq!(
            e.handler,
            HandlerRef::Relation {
                relation: "tags".into(),
                action: RelationAction::Attach
            }
        );
        let e = table.find(Verb::Get, "/widget/{id}").unwrap();
        assert_eq!(e.handler, HandlerRef::Action { action: Action::Get });
    }

    #[test]
    fn blacklisting_delete_removes_only_that_route() {
        let full = compile(&widget().build().unwrap()).unwrap();
        let trimmed = compile(&widget().blacklist("delete").build().unwrap()).unwrap();
        assert_eq!(trimmed.entries.len(), full.entries.len() - 1);
        assert!(trimmed.find(Verb::Delete, "/widget/{id}").is_none());
        assert!(trimmed.find(Verb::Delete, "/widget/{id}/tags/{relationId}").is_some());
    }

    #[test]
    fn blacklisting_relation_attach_removes_only_that_route() {
        let def = widget().relation("owner", "owner").blacklist("tags.attach").build().unwrap();
        let table = compile(&def).unwrap();
        assert_eq!(table.entries.len(), 6 + 4 * 2 - 1);
        assert!(table.find(Verb::Post, "/widget/{id}/tags/{relationId}").is_none());
        assert!(table.find(Verb::Get, "/widget/{id}/tags").is_some());
        assert!(table.find(Verb::Post, "/widget/{id}/tags").is_some());
        assert!(table.find(Verb::Delete, "/widget/{id}/tags/{relationId}").is_some());
        assert!(table.find(Verb::Post, "/widget/{id}/owner/{relationId}").is_some());
    }

    #[test]
    fn unknown_leaf_fails_fast() {
        let def = widget()
            .actions(ActionTree(vec![N::leaf("list"), N::leaf("explode")]))
            .build()
            .unwrap();
        assert_eq!(
            compile(&def).unwrap_err(),
            ConfigError::UnknownAction {
                resource: "widget".into(),
                action: "explode".into()
            }
        );

        let def = widget()
            .actions(ActionTree(vec![N::branch("{id}", vec![N::RelationExpansion(vec![N::leaf("list")])])]))
            .build()
            .unwrap();
        assert!(matches!(compile(&def), Err(ConfigError::UnknownRelationAction { .. })));
    }

    #[test]
    fn relation_expansion_needs_identity_segment() {
        let def = widget()
            .actions(ActionTree(vec![N::RelationExpansion(vec![N::leaf("get")])]))
            .build()
            .unwrap();
        assert_eq!(
            compile(&def).unwrap_err(),
            ConfigError::MisplacedRelationExpansion("widget".into())
        );
    }

    #[test]
    fn attach_requires_target_segment() {
        let def = widget()
            .actions(ActionTree(vec![N::branch("{id}", vec![N::RelationExpansion(vec![N::leaf("attach")])])]))
            .build()
            .unwrap();
        assert!(matches!(compile(&def), Err(ConfigError::MisplacedRelationAction { .. })));
    }

    #[test]
    fn duplicate_leaf_is_rejected() {
        let def = widget()
            .actions(ActionTree(vec![N::leaf("list"), N::leaf("get")]))
            .build()
            .unwrap();
        assert_eq!(
            compile(&def).unwrap_err(),
            ConfigError::DuplicateRoute {
                verb: "GET".into(),
                path: "/widget".into()
            }
        );
    }

    #[test]
    fn custom_tree_and_group_root() {
        let def = ResourceDefinition::builder("Widget")
            .group_root("gadgets")
            .relation_self("parts")
            .actions(ActionTree(vec![N::branch(
                "{slug}",
                vec![
                    N::leaf("get"),
                    N::RelationExpansion(vec![N::leaf("get"), N::branch("{partId}", vec![N::leaf("detach")])]),
                ],
            )]))
            .build()
            .unwrap();
        let table = compile(&def).unwrap();
        assert_eq!(
            routes(&table),
            vec![
                (Verb::Get, "/gadgets/{slug}"),
                (Verb::Get, "/gadgets/{slug}/parts"),
                (Verb::Delete, "/gadgets/{slug}/parts/{partId}"),
            ]
        );
    }

    #[test]
    fn repeated_placeholder_is_rejected() {
        let def = widget()
            .actions(ActionTree(vec![N::branch("{id}", vec![N::branch("{id}", vec![N::leaf("get")])])]))
            .build()
            .unwrap();
        assert!(matches!(compile(&def), Err(ConfigError::InvalidTree(_))));
    }

    #[test]
    fn display_lists_one_route_per_line() {
        let table = compile(&ResourceDefinition::builder("tag").build().unwrap()).unwrap();
        let text = table.to_string();
        assert_eq!(text.lines().count(), 6);
        assert!(text.lines().next().unwrap().starts_with("GET"));
    }

    #[test]
    fn sibling_placeholder_branches_are_rejected() {
        let def = widget()
            .actions(ActionTree(vec![
                N::branch("{id}", vec![N::leaf("get")]),
                N::branch("{slug}", vec![N::leaf("delete")]),
            ]))
            .build()
            .unwrap();
        assert_eq!(
            compile(&def).unwrap_err(),
            ConfigError::DuplicateRoute {
                verb: "DELETE".into(),
                path: "/widget/{slug}".into()
            }
        );
    }
}
