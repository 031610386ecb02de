//! Pipeline error types.

use std::path::PathBuf;

use crate::build::markdown::MarkdownError;

/// Errors that can occur while building or draining flows.
///
/// Every variant is fatal for the flow that raised it. Recoverable problems
/// (malformed front matter, entries without a destination) are logged and
/// never surface here.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("stage '{stage}' misconfigured: {message}")]
    Config { stage: String, message: String },

    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("unknown flow '{0}'")]
    UnknownFlow(String),

    #[error("duplicate flow name '{0}'")]
    DuplicateFlow(String),

    #[error("flow '{flow}' depends on unknown flow '{dependency}'")]
    UnknownDependency { flow: String, dependency: String },

    #[error("dependency cycle between flows: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("unresolved placeholder '$({key})' in path template '{template}'")]
    Placeholder { key: String, template: String },

    #[error("template error in {name}: {source}")]
    Template {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("markdown rendering error: {0}")]
    Markdown(#[from] MarkdownError),

    #[error("stage '{stage}' callback failed: {source}")]
    Pass {
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk source directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create a configuration error for a stage.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Wrap a template engine error with the name of what was rendered.
    pub fn template(name: impl Into<String>, source: tera::Error) -> Self {
        Self::Template {
            name: name.into(),
            source,
        }
    }
}
