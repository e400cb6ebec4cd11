//! Named-environment configuration.
//!
//! The config file is optional JSON mapping environment names ("dev",
//! "prod", ...) to the identifiers a session needs. Every value can also be
//! given on the command line; flags win over the file. Nothing here is
//! validated beyond presence, and nothing is ever written back.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("no environment named `{0}` in the config file")]
    UnknownEnv(String),

    #[error("missing value for `{0}`: pass the flag or add it to the config file")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Environment used when `--env` is not given.
    pub default_env: Option<String>,
    #[serde(default)]
    pub environments: HashMap<String, EnvConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvConfig {
    pub profile: Option<String>,
    pub cluster: Option<String>,
    pub region: Option<String>,
    pub database: Option<DbConfig>,
    pub tunnel: Option<TunnelConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DbConfig {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TunnelConfig {
    pub service: Option<String>,
    pub namespace: Option<String>,
    pub local_port: Option<u16>,
    pub remote_port: Option<u16>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Pick the requested environment, falling back to `default_env`. With
    /// no config file and no `--env` this yields an empty environment, so
    /// every identifier must come from flags.
    pub fn environment(&self, requested: Option<&str>) -> Result<EnvConfig, ConfigError> {
        let name = match requested.or(self.default_env.as_deref()) {
            Some(name) => name,
            None => return Ok(EnvConfig::default()),
        };
        self.environments
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownEnv(name.to_string()))
    }
}

/// Flag-over-config resolution for a single identifier.
pub fn pick(
    field: &'static str,
    flag: Option<String>,
    config: Option<String>,
) -> Result<String, ConfigError> {
    flag.or(config).ok_or(ConfigError::Missing(field))
}

/// Same, for ports.
pub fn pick_port(
    field: &'static str,
    flag: Option<u16>,
    config: Option<u16>,
) -> Result<u16, ConfigError> {
    flag.or(config).ok_or(ConfigError::Missing(field))
}
