//! Summary stage: extracts the first paragraph of markdown content.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::build::entry::EntryRef;
use crate::build::pipeline::{BoxStream, EntryStream, PipelineError, Stage, StageContext};

// Setext (`Title\n===`) and ATX (`# Title`) headings
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(^(.+)\n(-|=){3,}$)|(^#+.+$)").expect("valid heading regex")
});

// Inline and reference-style links and images
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!?\[([^\]]+)\]((\([^)]+\))|(\[\d+\]))").expect("valid link regex")
});

static LINK_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[\d+\]:.+$").expect("valid link reference regex"));

static PARAGRAPH_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid paragraph regex"));

/// Return the first non-blank paragraph of `markdown`, trimmed.
///
/// Headings and link reference definitions are removed and links or
/// images are reduced to their text before paragraphs are split.
pub fn summarize(markdown: &str) -> String {
    let text = HEADING_RE.replace_all(markdown, "");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = LINK_REF_RE.replace_all(&text, "");

    PARAGRAPH_BREAK_RE
        .split(&text)
        .map(str::trim)
        .find(|paragraph| !paragraph.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Options for [`SummaryStage`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SummaryOptions {
    /// Append a "read more" link to the entry's permalink
    pub read_more: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self { read_more: true }
    }
}

/// Stage that sets `summary` from `content`.
///
/// Run it before the markdown stage; it expects markdown source.
#[derive(Debug, Clone, Default)]
pub struct SummaryStage {
    options: SummaryOptions,
}

impl SummaryStage {
    pub fn new(options: SummaryOptions) -> Self {
        Self { options }
    }
}

impl Stage for SummaryStage {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn build(&self, upstream: BoxStream, _ctx: &StageContext) -> Result<BoxStream, PipelineError> {
        Ok(Box::new(SummaryStream {
            upstream,
            read_more: self.options.read_more,
        }))
    }
}

struct SummaryStream {
    upstream: BoxStream,
    read_more: bool,
}

impl EntryStream for SummaryStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        let Some(entry) = self.upstream.pull()? else {
            return Ok(None);
        };

        {
            let mut entry = entry.borrow_mut();
            let mut summary = summarize(&entry.content);
            if self.read_more
                && !summary.is_empty()
                && let Some(permalink) = &entry.permalink
            {
                summary.push_str(&format!("<a href='{}'> ... read more</a>", permalink));
            }
            entry.summary = Some(summary);
        }
        Ok(Some(entry))
    }
}
