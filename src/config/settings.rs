//! Server settings from the environment.

use crate::error::ConfigError;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub api_prefix: String,
    pub body_limit: usize,
    /// JSON file or directory with resource declarations.
    pub resources_path: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
            resources_path: None,
        }
    }
}

impl ServerSettings {
    /// Reads `BIND_ADDR`, `API_PREFIX`, `BODY_LIMIT_BYTES` and `RESOURCES_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServerSettings::default();
        let body_limit = match lookup("BODY_LIMIT_BYTES") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Load(format!("BODY_LIMIT_BYTES must be an integer, got '{}'", v)))?,
            None => defaults.body_limit,
        };
        let api_prefix = lookup("API_PREFIX")
            .map(|p| format!("/{}", p.trim().trim_matches('/')))
            .unwrap_or(defaults.api_prefix);
        Ok(ServerSettings {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            api_prefix,
            body_limit,
            resources_path: lookup("RESOURCES_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
        })
    }
}
