//! Configuration type definitions.
//!
//! These types are pure data - no I/O or complex logic.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::build::pipeline::StageSpec;

// =============================================================================
// Site
// =============================================================================

/// A site: its flows plus global data visible to every template.
///
/// ```yaml
/// data:
///   site: { name: Example }
/// flows:
///   - name: posts
///     src: [content/posts]
///     dest: public/blog
///     stages:
///       - yafm
///       - markdown
///       - destination: { dest: "$(basename)$(outExt)" }
///   - name: index
///     src: [content/index.html]
///     dest: public
///     depends: [posts]
///     stages:
///       - paginator: { pivot: posts, pageSize: 10 }
///       - template
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    #[serde(default)]
    pub flows: Vec<FlowConfig>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

// =============================================================================
// Flows
// =============================================================================

/// One flow definition.
///
/// Paths are used as given, relative to the working directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FlowConfig {
    pub name: String,
    /// Output directory
    #[serde(default)]
    pub dest: Option<PathBuf>,
    #[serde(default = "default_out_ext")]
    pub out_ext: String,
    /// Names of flows whose complete output this flow needs
    #[serde(default)]
    pub depends: Vec<String>,
    /// Source files or directories
    #[serde(default)]
    pub src: Vec<PathBuf>,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

fn default_out_ext() -> String {
    ".html".to_string()
}
