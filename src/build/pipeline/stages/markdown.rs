//! Markdown rendering stage.

use pulldown_cmark::Options;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::build::entry::EntryRef;
use crate::build::markdown::{default_extensions, markdown_options, render_markdown};
use crate::build::pipeline::{BoxStream, EntryStream, PipelineError, Stage, StageContext};

/// Options for [`MarkdownStage`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownOptions {
    /// pulldown-cmark extensions to enable, by name
    pub extensions: Vec<String>,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

/// Stage that renders `content` from markdown to HTML.
///
/// After this stage, `content` holds HTML and the `toc` field lists the
/// entry's headings as `{text, id, level}` objects.
#[derive(Debug, Clone, Default)]
pub struct MarkdownStage {
    options: MarkdownOptions,
}

impl MarkdownStage {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }
}

impl Stage for MarkdownStage {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn build(&self, upstream: BoxStream, _ctx: &StageContext) -> Result<BoxStream, PipelineError> {
        let options = markdown_options(&self.options.extensions)?;
        Ok(Box::new(MarkdownStream { upstream, options }))
    }
}

struct MarkdownStream {
    upstream: BoxStream,
    options: Options,
}

impl EntryStream for MarkdownStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        let Some(entry) = self.upstream.pull()? else {
            return Ok(None);
        };

        {
            let mut entry = entry.borrow_mut();
            let output = render_markdown(&entry.content, self.options);
            let toc = output
                .toc
                .iter()
                .map(|heading| json!({"text": heading.text, "id": heading.id, "level": heading.level}))
                .collect();

            entry.content = output.html;
            entry.set("toc", Value::Array(toc));
        }
        Ok(Some(entry))
    }
}
