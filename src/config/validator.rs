//! Config validation: resource identity, relation names and route uniqueness.

use crate::config::ResourceDefinition;
use crate::error::ConfigError;
use crate::routes::RouteTable;
use std::collections::{HashMap, HashSet};

pub fn validate_definition(def: &ResourceDefinition) -> Result<(), ConfigError> {
    if def.name.trim().is_empty() {
        return Err(ConfigError::EmptyName);
    }
    for (exposed, internal) in def.relations.iter() {
        if exposed.trim().is_empty() || internal.trim().is_empty() || exposed.contains('/') {
            return Err(ConfigError::EmptyRelation(def.name.clone()));
        }
    }
    Ok(())
}

/// No two entries may share `(verb, path)`, within a table or across tables.
pub fn ensure_unique_routes<'a>(tables: impl IntoIterator<Item = &'a RouteTable>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for table in tables {
        for entry in &table.entries {
            if !seen.insert((entry.verb, entry.path.as_str())) {
                return Err(ConfigError::DuplicateRoute {
                    verb: entry.verb.to_string(),
                    path: entry.path.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Different resources must not share a path, and one path shape must keep one set of
/// placeholder names. Paths are compared with placeholders blanked, as the router sees them.
pub fn ensure_disjoint_paths(tables: &[RouteTable]) -> Result<(), ConfigError> {
    let mut owner: HashMap<String, (&str, &str)> = HashMap::new();
    for table in tables {
        for entry in &table.entries {
            let claim = (table.resource.as_str(), entry.path.as_str());
            let prev = owner.entry(path_shape(&entry.path)).or_insert(claim);
            if *prev != claim {
                return Err(ConfigError::DuplicateRoute {
                    verb: entry.verb.to_string(),
                    path: entry.path.clone(),
                });
            }
        }
    }
    Ok(())
}

fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|s| if s.starts_with('{') && s.ends_with('}') { "{}" } else { s })
        .collect::<Vec<_>>()
        .join("/")
}
