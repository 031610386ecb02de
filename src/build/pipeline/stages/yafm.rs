//! Front-matter splitting stage.
//!
//! Splits raw content on fenced YAML blocks:
//!
//! ```markdown
//! ---
//! title: My Page
//! ---
//!
//! # Content starts here
//! ```
//!
//! In single mode only a block at the very start of the content counts.
//! In multi mode every fenced block starts a new entry, so one source file
//! can expand into many entries.

use std::collections::VecDeque;
use std::rc::Rc;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::build::entry::{Entry, EntryRef};
use crate::build::paths::numbered_dest;
use crate::build::pipeline::{
    BoxStream, EntryStream, FlowInfo, PipelineError, Stage, StageContext,
};

#[derive(thiserror::Error, Debug)]
pub enum FrontMatterError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("front matter must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

/// Parse a front matter block into a field map.
///
/// An empty block yields an empty map.
pub fn parse_front_matter(block: &str) -> Result<Map<String, Value>, FrontMatterError> {
    use serde_yaml::Value as Yaml;

    match serde_yaml::from_str::<Yaml>(block)? {
        Yaml::Null => Ok(Map::new()),
        mapping @ Yaml::Mapping(_) => Ok(serde_yaml::from_value(mapping)?),
        Yaml::Bool(_) => Err(FrontMatterError::NotAMapping("a boolean")),
        Yaml::Number(_) => Err(FrontMatterError::NotAMapping("a number")),
        Yaml::String(_) => Err(FrontMatterError::NotAMapping("a string")),
        Yaml::Sequence(_) => Err(FrontMatterError::NotAMapping("a sequence")),
        Yaml::Tagged(_) => Err(FrontMatterError::NotAMapping("a tagged value")),
    }
}

/// Options for [`YafmStage`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct YafmOptions {
    /// Fence character; a fence is this character repeated three or more times
    pub sep: char,
    /// Recognize any number of fenced blocks, each starting a new entry
    pub multi: bool,
}

impl Default for YafmOptions {
    fn default() -> Self {
        Self {
            sep: '-',
            multi: false,
        }
    }
}

/// Stage that splits front matter off entry content.
///
/// Front matter keys override entry fields of the same name. Malformed
/// front matter is logged and ignored.
///
/// In multi mode each produced entry gets `split` (its ordinal within the
/// source entry) and, if the flow has a destination, a numbered `destPath`
/// of `<basename><split><outExt>`.
#[derive(Debug, Clone, Default)]
pub struct YafmStage {
    options: YafmOptions,
}

impl YafmStage {
    pub fn new(options: YafmOptions) -> Self {
        Self { options }
    }

    fn pattern(&self) -> Result<Regex, PipelineError> {
        let sep = regex::escape(&self.options.sep.to_string());
        let anchor = if self.options.multi { "" } else { "^" };
        let pattern = format!(r"{anchor}({sep}{{3,}})([\w\W]+?){sep}{{3,}}");
        Regex::new(&pattern).map_err(|e| PipelineError::stage("yafm", e.to_string()))
    }
}

impl Stage for YafmStage {
    fn name(&self) -> &'static str {
        "yafm"
    }

    fn build(&self, upstream: BoxStream, ctx: &StageContext) -> Result<BoxStream, PipelineError> {
        Ok(Box::new(YafmStream {
            upstream,
            pattern: self.pattern()?,
            multi: self.options.multi,
            flow: ctx.flow.clone(),
            pending: VecDeque::new(),
        }))
    }
}

enum Fragment<'a> {
    FrontMatter(&'a str),
    Body(&'a str),
}

struct YafmStream {
    upstream: BoxStream,
    pattern: Regex,
    multi: bool,
    flow: Rc<FlowInfo>,
    /// Entries split from the last upstream entry, not yet handed out
    pending: VecDeque<EntryRef>,
}

impl YafmStream {
    /// Cut content into front matter blocks and trimmed, non-empty bodies.
    fn fragments<'a>(&self, content: &'a str) -> Vec<Fragment<'a>> {
        fn push_body<'a>(out: &mut Vec<Fragment<'a>>, text: &'a str) {
            let text = text.trim();
            if !text.is_empty() {
                out.push(Fragment::Body(text));
            }
        }

        let mut out = Vec::new();
        let mut last = 0;
        for caps in self.pattern.captures_iter(content) {
            let (Some(whole), Some(block)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            push_body(&mut out, &content[last..whole.start()]);
            out.push(Fragment::FrontMatter(block.as_str().trim()));
            last = whole.end();
        }
        push_body(&mut out, &content[last..]);

        if out.is_empty() {
            out.push(Fragment::Body(""));
        }
        out
    }

    fn split(&mut self, source: &Entry) {
        let fragments = self.fragments(&source.content);
        let mut fragments = fragments.into_iter().peekable();
        let mut index = 0;

        while let Some(fragment) = fragments.next() {
            let mut entry = source.clone();
            let body = match fragment {
                Fragment::FrontMatter(block) => {
                    match parse_front_matter(block) {
                        Ok(fields) => entry.merge(fields),
                        Err(e) => tracing::warn!(
                            entry = %source.describe(),
                            fragment = block,
                            error = %e,
                            "could not parse front matter, keeping original fields"
                        ),
                    }
                    match fragments.next_if(|f| matches!(f, Fragment::Body(_))) {
                        Some(Fragment::Body(body)) => body,
                        _ => "",
                    }
                }
                Fragment::Body(body) => body,
            };
            entry.content = body.to_string();

            if self.multi {
                entry.split = Some(index);
                if let Some(dest) =
                    numbered_dest(&self.flow, entry.basename.as_deref(), &index.to_string())
                {
                    entry.dest_path = Some(dest);
                }
            }

            self.pending.push_back(entry.into_ref());
            index += 1;
        }
    }
}

impl EntryStream for YafmStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Ok(Some(entry));
            }
            let Some(entry) = self.upstream.pull()? else {
                return Ok(None);
            };
            let source = entry.borrow().clone();
            self.split(&source);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;
    use crate::build::pipeline::stages::test_support::{CountingStream, run_stage};

    fn ctx() -> StageContext {
        StageContext::for_flow(FlowInfo::new("posts"))
    }

    #[test]
    fn test_parse_front_matter_basic() {
        let fields = parse_front_matter("title: My Page\ndescription: A test page").unwrap();
        assert_eq!(fields.get("title"), Some(&json!("My Page")));
        assert_eq!(fields.get("description"), Some(&json!("A test page")));
    }

    #[test]
    fn test_parse_front_matter_empty_and_invalid() {
        assert!(parse_front_matter("").unwrap().is_empty());
        assert!(matches!(
            parse_front_matter("- a\n- b"),
            Err(FrontMatterError::NotAMapping("a sequence"))
        ));
        assert!(matches!(
            parse_front_matter("title: [unclosed"),
            Err(FrontMatterError::Yaml(_))
        ));
    }

    #[test]
    fn test_single_mode_splits_leading_block() {
        let content = "---\ntitle: Hello\ntags:\n  - rust\n  - docs\n---\n\n# Body\n\nText\n";
        let out = run_stage(&YafmStage::default(), &ctx(), vec![Entry::new(content).with_basename("hello")]);

        assert_eq!(out.len(), 1);
        let entry = out[0].borrow();
        assert_eq!(entry.get("title"), Some(json!("Hello")));
        assert_eq!(entry.get("tags"), Some(json!(["rust", "docs"])));
        assert_eq!(entry.content, "# Body\n\nText");
        assert_eq!(entry.basename.as_deref(), Some("hello"));
        assert_eq!(entry.split, None);
    }

    #[test]
    fn test_front_matter_overrides_entry_fields() {
        let content = "---\nbasename: renamed\ntitle: New\n---\nbody";
        let source = Entry::new(content)
            .with_basename("original")
            .with_field("title", json!("Old"));
        let out = run_stage(&YafmStage::default(), &ctx(), vec![source]);

        let entry = out[0].borrow();
        assert_eq!(entry.basename.as_deref(), Some("renamed"));
        assert_eq!(entry.get("title"), Some(json!("New")));
    }

    #[test]
    fn test_single_mode_without_front_matter() {
        let out = run_stage(&YafmStage::default(), &ctx(), vec![Entry::new("  plain text\n")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].borrow().content, "plain text");
    }

    #[test]
    fn test_single_mode_ignores_blocks_after_start() {
        let content = "intro\n---\ntitle: Late\n---\nrest";
        let out = run_stage(&YafmStage::default(), &ctx(), vec![Entry::new(content)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].borrow().get("title"), None);
        assert_eq!(out[0].borrow().content, content);
    }

    #[test]
    fn test_front_matter_without_body() {
        let out = run_stage(&YafmStage::default(), &ctx(), vec![Entry::new("---\ntitle: Only\n---\n")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].borrow().content, "");
        assert_eq!(out[0].borrow().get("title"), Some(json!("Only")));
    }

    #[test]
    fn test_empty_content_yields_one_empty_entry() {
        let out = run_stage(&YafmStage::default(), &ctx(), vec![Entry::new(""), Entry::new("next")]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].borrow().content, "");
        assert_eq!(out[1].borrow().content, "next");
    }

    #[test]
    fn test_malformed_front_matter_keeps_entry() {
        let content = "---\ntitle: [unclosed\n---\nbody";
        let source = Entry::new(content).with_field("title", json!("Original"));
        let out = run_stage(&YafmStage::default(), &ctx(), vec![source]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].borrow().get("title"), Some(json!("Original")));
        assert_eq!(out[0].borrow().content, "body");
    }

    #[test]
    fn test_multi_mode_expands_blocks() {
        let content = "---\ntitle: A\n---\nbody a\n---\ntitle: B\n---\nbody b\n---\ntitle: C\n---\nbody c";
        let ctx = StageContext::for_flow(FlowInfo::new("news").with_dest("public").with_out_ext(".html"));
        let stage = YafmStage::new(YafmOptions { multi: true, ..Default::default() });
        let out = run_stage(&stage, &ctx, vec![Entry::new(content).with_basename("news")]);

        assert_eq!(out.len(), 3);
        for (i, entry) in out.iter().enumerate() {
            let entry = entry.borrow();
            assert_eq!(entry.split, Some(i));
            assert_eq!(entry.dest_path, Some(PathBuf::from(format!("public/news{i}.html"))));
        }
        assert_eq!(out[1].borrow().get("title"), Some(json!("B")));
        assert_eq!(out[2].borrow().content, "body c");
    }

    #[test]
    fn test_multi_mode_without_dest_leaves_dest_path() {
        let content = "---\ntitle: A\n---\na\n---\ntitle: B\n---\nb";
        let stage = YafmStage::new(YafmOptions { multi: true, ..Default::default() });
        let out = run_stage(&stage, &ctx(), vec![Entry::new(content).with_basename("x")]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.borrow().dest_path.is_none()));
    }

    #[test]
    fn test_custom_separator() {
        let stage = YafmStage::new(YafmOptions { sep: '+', multi: false });
        let out = run_stage(&stage, &ctx(), vec![Entry::new("+++\ntitle: Plus\n+++\nbody")]);
        assert_eq!(out[0].borrow().get("title"), Some(json!("Plus")));
        assert_eq!(out[0].borrow().content, "body");
    }

    #[test]
    fn test_overflow_is_drained_before_pulling_upstream() {
        let content = "---\na: 1\n---\none\n---\na: 2\n---\ntwo";
        let (upstream, pulls) = CountingStream::new(vec![Entry::new(content), Entry::new("---\na: 3\n---\nthree")]);
        let stage = YafmStage::new(YafmOptions { multi: true, ..Default::default() });
        let mut stream = stage.build(Box::new(upstream), &ctx()).unwrap();

        assert_eq!(stream.pull().unwrap().unwrap().borrow().content, "one");
        assert_eq!(pulls.get(), 1);
        assert_eq!(stream.pull().unwrap().unwrap().borrow().content, "two");
        assert_eq!(pulls.get(), 1);
        assert_eq!(stream.pull().unwrap().unwrap().borrow().content, "three");
        assert_eq!(pulls.get(), 2);
        assert!(stream.pull().unwrap().is_none());
        assert!(stream.pull().unwrap().is_none());
    }
}
