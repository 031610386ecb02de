//! Configuration loading from strings and files.
//!
//! Global `data` can be overridden from the environment: nested keys are
//! separated by `__`, so `SITESTREAM_DATA__SITE__NAME=Blog` sets
//! `data.site.name`. Environment keys are lowercased.

use std::collections::BTreeSet;
use std::path::Path;

use config::Environment;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ConfigError, SiteConfig};

/// Prefix of environment variables read by [`SiteConfig::load_from_file`].
pub const ENV_PREFIX: &str = "SITESTREAM";

/// The part of the configuration that may come from the environment.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    #[serde(default)]
    data: Map<String, Value>,
}

impl SiteConfig {
    /// Parse a YAML config.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: SiteConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML config file, then apply `SITESTREAM_*` environment
    /// overrides to its `data`.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    pub(crate) fn load_with_env(path: &Path, env: Environment) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut site = Self::from_yaml_str(&content)?;

        let overrides: EnvOverrides = config::Config::builder()
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;
        for (key, value) in overrides.data {
            tracing::debug!(key = %key, "data overridden from environment");
            merge_value(site.data.entry(key).or_insert(Value::Null), value);
        }

        Ok(site)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for flow in &self.flows {
            if flow.name.trim().is_empty() {
                return Err(ConfigError::Validation("flow name must not be empty".to_string()));
            }
            if !names.insert(flow.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "flow '{}' is defined more than once",
                    flow.name
                )));
            }
        }
        Ok(())
    }
}

/// Merge `incoming` into `target`, recursing into objects.
fn merge_value(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                merge_value(target.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, incoming) => *target = incoming,
    }
}
