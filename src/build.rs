pub mod entry;
pub mod filters;
mod markdown;
pub mod orchestrator;
mod paths;
pub mod pipeline;
mod render;
pub mod sink;
pub mod source;

pub use markdown::{MarkdownError, MarkdownOutput, TocEntry, default_extensions, render_markdown};
pub use orchestrator::{BuildSummary, Orchestrator};
pub use render::Renderer;
