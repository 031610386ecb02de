//! Permalink stage: derives `permalink` from `destPath`.

use std::fmt;
use std::rc::Rc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::build::entry::{Entry, EntryRef};
use crate::build::paths::{default_permalink, link_segments};
use crate::build::pipeline::placeholder::interpolate;
use crate::build::pipeline::{BoxStream, EntryStream, FlowInfo, PipelineError, Stage, StageContext};

/// Builds a link from the entry, the link prefix, the remaining path
/// segments and the flow's output extension.
pub type LinkFn = Rc<dyn Fn(&Entry, &str, &[String], &str) -> String>;

/// A custom permalink policy.
#[derive(Clone)]
pub enum LinkSpec {
    /// A `$(name)` template; `$(prefix)`, `$(pathElems)`, `$(outExt)` and
    /// `$(dest)` are available besides the entry's own fields
    Template(String),
    Func(LinkFn),
}

impl fmt::Debug for LinkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkSpec::Template(template) => f.debug_tuple("Template").field(template).finish(),
            LinkSpec::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for LinkSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)
            .map(LinkSpec::Template)
            .map_err(|e| D::Error::custom(format!("link must be a string or a function: {e}")))
    }
}

/// Options for [`PermalinkStage`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PermalinkOptions {
    pub link_prefix: String,
    /// Leading path segments to drop (usually the output root)
    pub link_path_strip: usize,
    pub link: Option<LinkSpec>,
}

impl Default for PermalinkOptions {
    fn default() -> Self {
        Self {
            link_prefix: "/".to_string(),
            link_path_strip: 1,
            link: None,
        }
    }
}

/// Stage that sets `permalink` from the entry's `destPath`.
///
/// Index files link to their directory. An entry without a `destPath`
/// links as if its path were empty.
#[derive(Debug, Clone, Default)]
pub struct PermalinkStage {
    options: PermalinkOptions,
}

impl PermalinkStage {
    pub fn new(options: PermalinkOptions) -> Self {
        Self { options }
    }
}

impl Stage for PermalinkStage {
    fn name(&self) -> &'static str {
        "permalink"
    }

    fn build(&self, upstream: BoxStream, ctx: &StageContext) -> Result<BoxStream, PipelineError> {
        Ok(Box::new(PermalinkStream {
            upstream,
            options: self.options.clone(),
            flow: ctx.flow.clone(),
        }))
    }
}

struct PermalinkStream {
    upstream: BoxStream,
    options: PermalinkOptions,
    flow: Rc<FlowInfo>,
}

impl PermalinkStream {
    fn link(&self, entry: &Entry) -> Result<String, PipelineError> {
        let segments = link_segments(entry.dest_path.as_deref(), self.options.link_path_strip);
        let prefix = self.options.link_prefix.as_str();

        match &self.options.link {
            None => Ok(default_permalink(prefix, &segments)),
            Some(LinkSpec::Func(func)) => Ok(func(entry, prefix, &segments, &self.flow.out_ext)),
            Some(LinkSpec::Template(template)) => interpolate(template, |key| {
                entry.lookup(key).or_else(|| match key {
                    "prefix" => Some(Value::from(prefix)),
                    "pathElems" => Some(Value::from(segments.join("/"))),
                    "outExt" => Some(Value::from(self.flow.out_ext.as_str())),
                    "dest" => self
                        .flow
                        .dest
                        .as_ref()
                        .map(|d| Value::from(d.to_string_lossy().into_owned())),
                    _ => None,
                })
            }),
        }
    }
}

impl EntryStream for PermalinkStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        let Some(entry) = self.upstream.pull()? else {
            return Ok(None);
        };

        let permalink = self.link(&entry.borrow())?;
        entry.borrow_mut().permalink = Some(permalink);
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;
    use crate::build::pipeline::stages::test_support::run_stage;

    fn ctx() -> StageContext {
        StageContext::for_flow(FlowInfo::new("posts").with_dest("public"))
    }

    fn at(dest: &str) -> Entry {
        let mut entry = Entry::new("");
        entry.dest_path = Some(PathBuf::from(dest));
        entry
    }

    fn permalinks(stage: &PermalinkStage, entries: Vec<Entry>) -> Vec<String> {
        run_stage(stage, &ctx(), entries)
            .iter()
            .map(|e| e.borrow().permalink.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_default_policy_collapses_index() {
        let links = permalinks(
            &PermalinkStage::default(),
            vec![
                at("public/blog/post.html"),
                at("public/blog/index.html"),
                at("public/index.html"),
            ],
        );
        assert_eq!(links, vec!["/blog/post.html", "/blog", "/"]);
    }

    #[test]
    fn test_missing_destination_links_to_prefix() {
        let links = permalinks(&PermalinkStage::default(), vec![Entry::new("")]);
        assert_eq!(links, vec!["/"]);
    }

    #[test]
    fn test_prefix_and_strip() {
        let stage = PermalinkStage::new(PermalinkOptions {
            link_prefix: "https://example.com/".to_string(),
            link_path_strip: 2,
            link: None,
        });
        let links = permalinks(&stage, vec![at("public/site/docs/intro.html")]);
        assert_eq!(links, vec!["https://example.com/docs/intro.html"]);
    }

    #[test]
    fn test_template_link() {
        let stage = PermalinkStage::new(PermalinkOptions {
            link: Some(LinkSpec::Template("$(prefix)$(lang)/$(pathElems)".to_string())),
            ..Default::default()
        });
        let entry = at("public/blog/post.html").with_field("lang", json!("en"));
        assert_eq!(permalinks(&stage, vec![entry]), vec!["/en/blog/post.html"]);
    }

    #[test]
    fn test_function_link() {
        let stage = PermalinkStage::new(PermalinkOptions {
            link: Some(LinkSpec::Func(Rc::new(
                |_: &Entry, prefix: &str, segments: &[String], out_ext: &str| {
                    let joined = segments.join("/");
                    format!("{}{}", prefix, joined.trim_end_matches(out_ext))
                },
            ))),
            ..Default::default()
        });
        assert_eq!(permalinks(&stage, vec![at("public/blog/post.html")]), vec!["/blog/post"]);
    }

    #[test]
    fn test_options_from_yaml() {
        let options: PermalinkOptions =
            serde_yaml::from_str("linkPrefix: /docs/\nlink: $(prefix)$(pathElems)").unwrap();
        assert_eq!(options.link_prefix, "/docs/");
        assert_eq!(options.link_path_strip, 1);
        assert!(matches!(options.link, Some(LinkSpec::Template(_))));
    }
}
