//! Load resource declarations from JSON files and resolve them into definitions.

use crate::config::{ResourceConfig, ResourceDefinition};
use crate::error::ConfigError;
use std::path::Path;

/// Build a resource definition from its declaration.
pub fn resolve(config: &ResourceConfig) -> Result<ResourceDefinition, ConfigError> {
    let mut builder = ResourceDefinition::builder(config.name.clone()).needs_parent(config.needs_parent);
    if let Some(root) = &config.group_root {
        builder = builder.group_root(root.clone());
    }
    for (exposed, internal) in config.relations.pairs() {
        builder = builder.relation(exposed, internal);
    }
    for action in &config.blacklist {
        builder = builder.blacklist(action.trim());
    }
    if let Some(tree) = &config.actions {
        builder = builder.actions(tree.clone());
    }
    builder.build()
}

/// Parse a JSON array of resource declarations (a single object is accepted too).
pub fn load_resources_from_str(json: &str) -> Result<Vec<ResourceDefinition>, ConfigError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ConfigError::Load(format!("invalid json: {}", e)))?;
    let configs: Vec<ResourceConfig> = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value::<ResourceConfig>(value).map(|c| vec![c])
    }
    .map_err(|e| ConfigError::Load(e.to_string()))?;
    configs.iter().map(resolve).collect()
}

/// Load from one JSON file, or from every `*.json` file in a directory (sorted by name).
pub async fn load_resources_from_path(path: impl AsRef<Path>) -> Result<Vec<ResourceDefinition>, ConfigError> {
    let path = path.as_ref();
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    if !meta.is_dir() {
        return load_file(path).await;
    }

    let mut files = Vec::new();
    let mut dir = tokio::fs::read_dir(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?
    {
        let p = entry.path();
        if p.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(p);
        }
    }
    files.sort();

    let mut out = Vec::new();
    for file in files {
        out.extend(load_file(&file).await?);
    }
    tracing::debug!(path = %path.display(), resources = out.len(), "loaded resource declarations");
    Ok(out)
}

async fn load_file(path: &Path) -> Result<Vec<ResourceDefinition>, ConfigError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_resources_from_str(&json).map_err(|e| match e {
        ConfigError::Load(msg) => ConfigError::Load(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionTreeNode;

    const WIDGETS: &str = r#"[
        {
            "name": "Widget",
            "relations": { "tags": "tagRelation", "owner": "owner" },
            "blacklist": ["delete", "tags.attach"]
        }
    ]"#;

    #[test]
    fn resolves_declaration_with_defaults() {
        let defs = load_resources_from_str(WIDGETS).unwrap();
        assert_eq!(defs.len(), 1);
        let def = &defs[0];
        assert_eq!(def.prefix(), "/widget");
        assert_eq!(def.relations.resolve("tags"), Some("tagRelation"));
        assert!(def.is_blacklisted("tags.attach"));
        assert!(!def.needs_parent);
        assert_eq!(def.action_tree, crate::config::ActionTree::default());
    }

    #[test]
    fn accepts_listed_relations_and_custom_tree() {
        let defs = load_resources_from_str(
            r#"{ "name": "note", "needs_parent": true, "relations": ["author"], "actions": ["list", {"{id}": ["get"]}] }"#,
        )
        .unwrap();
        let def = &defs[0];
        assert!(def.needs_parent);
        assert_eq!(def.relations.resolve("author"), Some("author"));
        assert_eq!(def.action_tree.nodes()[0], ActionTreeNode::leaf("list"));
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        assert!(matches!(load_resources_from_str("[{"), Err(ConfigError::Load(_))));
        assert!(matches!(
            load_resources_from_str(r#"[{"name": "x", "actions": {"bad": 1}}]"#),
            Err(ConfigError::Load(_))
        ));
    }

    #[tokio::test]
    async fn loads_every_json_file_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), r#"[{"name": "tag"}]"#).unwrap();
        std::fs::write(dir.path().join("a.json"), WIDGETS).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let defs = load_resources_from_path(dir.path()).await.unwrap();
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Widget", "tag"]);

        let single = load_resources_from_path(dir.path().join("b.json")).await.unwrap();
        assert_eq!(single.len(), 1);
        assert!(load_resources_from_path(dir.path().join("missing.json")).await.is_err());
    }
}
