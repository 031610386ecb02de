//! Configuration loading and types.
//!
//! - Type definitions for config structures (`types`)
//! - Loading configs from strings and files (`load`)

mod load;
mod types;

pub use load::ENV_PREFIX;
pub use types::{FlowConfig, SiteConfig};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to apply environment overrides: {0}")]
    Environment(#[from] config::ConfigError),

    #[error("{0}")]
    Validation(String),
}
