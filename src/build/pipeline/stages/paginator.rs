//! Pagination stage.
//!
//! Groups the entries of a dependency flow (the pivot) into pages and emits
//! one copy of the upstream template entry per page.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::build::entry::{Entry, EntryRef, Pagination};
use crate::build::paths::numbered_dest;
use crate::build::pipeline::{
    BoxStream, EntryStream, FlowInfo, Materialized, PipelineError, Stage, StageContext,
};
use crate::util::value_to_string;

/// Maps a pivot entry and its index to a group key.
pub type PageByFn = Rc<dyn Fn(&Entry, usize) -> Value>;

/// How pivot entries are assigned to pages.
#[derive(Clone, Default)]
pub enum PageBy {
    /// Fixed-size pages numbered from 1
    #[default]
    Index,
    /// One page per distinct value of an entry field
    Field(String),
    /// One page per distinct key returned by a function
    Func(PageByFn),
}

impl PageBy {
    fn key(&self, entry: &Entry, index: usize, page_size: usize) -> Value {
        match self {
            PageBy::Index => Value::from(index / page_size + 1),
            PageBy::Field(field) => entry.lookup(field).unwrap_or(Value::Null),
            PageBy::Func(func) => func(entry, index),
        }
    }
}

impl fmt::Debug for PageBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageBy::Index => f.write_str("Index"),
            PageBy::Field(field) => f.debug_tuple("Field").field(field).finish(),
            PageBy::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for PageBy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)
            .map(PageBy::Field)
            .map_err(|e| D::Error::custom(format!("pageBy must be a field name or a function: {e}")))
    }
}

/// Options for [`PaginatorStage`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PaginatorOptions {
    /// Name of the dependency flow to page over (required)
    pub pivot: Option<String>,
    pub page_size: usize,
    pub page_by: PageBy,
}

impl Default for PaginatorOptions {
    fn default() -> Self {
        Self {
            pivot: None,
            page_size: 5,
            page_by: PageBy::Index,
        }
    }
}

/// Stage that paginates a dependency flow.
///
/// On first pull it takes one template entry from upstream and groups the
/// pivot entries by key, preserving first-seen group order. It then emits
/// one clone of the template per group with `page`, `pageItems`,
/// `pageCount` and `pageSize` set, plus `destPath = <basename><page><outExt>`
/// when the flow has a destination. An empty pivot yields no pages.
#[derive(Debug, Clone, Default)]
pub struct PaginatorStage {
    options: PaginatorOptions,
}

impl PaginatorStage {
    pub fn new(options: PaginatorOptions) -> Self {
        Self { options }
    }
}

impl Stage for PaginatorStage {
    fn name(&self) -> &'static str {
        "paginator"
    }

    fn build(&self, upstream: BoxStream, ctx: &StageContext) -> Result<BoxStream, PipelineError> {
        let pivot_name = self.options.pivot.as_deref().ok_or_else(|| {
            PipelineError::stage(
                "paginator",
                "pivot field required; name a flow from the depends list to paginate over",
            )
        })?;
        let pivot = ctx.deps.get(pivot_name).cloned().ok_or_else(|| {
            PipelineError::stage(
                "paginator",
                format!(
                    "pivot '{}' is not a dependency of flow '{}'",
                    pivot_name, ctx.flow.name
                ),
            )
        })?;
        if self.options.page_size == 0 {
            return Err(PipelineError::stage("paginator", "pageSize must be at least 1"));
        }

        Ok(Box::new(PaginatorStream {
            upstream,
            pivot,
            page_size: self.options.page_size,
            page_by: self.options.page_by.clone(),
            flow: ctx.flow.clone(),
            template: None,
            pages: None,
            page_count: 0,
        }))
    }
}

struct PaginatorStream {
    upstream: BoxStream,
    pivot: Materialized,
    page_size: usize,
    page_by: PageBy,
    flow: Rc<FlowInfo>,
    template: Option<Entry>,
    /// Groups not yet emitted; `None` until the first pull
    pages: Option<VecDeque<(Value, Rc<Vec<EntryRef>>)>>,
    page_count: usize,
}

impl PaginatorStream {
    fn group(&self) -> VecDeque<(Value, Rc<Vec<EntryRef>>)> {
        let mut groups: Vec<(Value, Vec<EntryRef>)> = Vec::new();
        for (index, entry) in self.pivot.iter().enumerate() {
            let key = self.page_by.key(&entry.borrow(), index, self.page_size);
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, items)) => items.push(entry.clone()),
                None => groups.push((key, vec![entry.clone()])),
            }
        }
        groups
            .into_iter()
            .map(|(key, items)| (key, Rc::new(items)))
            .collect()
    }
}

impl EntryStream for PaginatorStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        if self.pages.is_none() {
            let Some(template) = self.upstream.pull()? else {
                self.pages = Some(VecDeque::new());
                return Ok(None);
            };
            self.template = Some(template.borrow().clone());
            let pages = self.group();
            self.page_count = pages.len();
            tracing::debug!(
                flow = %self.flow.name,
                pivot_entries = self.pivot.len(),
                pages = self.page_count,
                "paginating"
            );
            self.pages = Some(pages);
        }

        let Some((page, items)) = self.pages.as_mut().and_then(VecDeque::pop_front) else {
            return Ok(None);
        };
        let Some(template) = &self.template else {
            return Ok(None);
        };

        let mut entry = template.clone();
        let label = value_to_string(&page).unwrap_or_else(|| page.to_string());
        if let Some(dest) = numbered_dest(&self.flow, entry.basename.as_deref(), &label) {
            entry.dest_path = Some(dest);
        }
        entry.pagination = Some(Pagination {
            page,
            items,
            count: self.page_count,
            size: self.page_size,
        });
        Ok(Some(entry.into_ref()))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;
    use crate::build::pipeline::stages::test_support::{CountingStream, run_stage, try_run_stage};
    use crate::build::pipeline::{GlobalData, ResolvedDependencies};

    fn pivot(n: usize) -> Vec<EntryRef> {
        (0..n)
            .map(|i| Entry::new(format!("post {i}")).with_field("n", json!(i)).into_ref())
            .collect()
    }

    fn ctx_with(flow: FlowInfo, name: &str, entries: Vec<EntryRef>) -> StageContext {
        let mut deps = ResolvedDependencies::new();
        deps.insert(name, Rc::new(entries));
        StageContext::new(flow, deps, Rc::new(GlobalData::new()))
    }

    fn paginator(pivot: &str) -> PaginatorStage {
        PaginatorStage::new(PaginatorOptions {
            pivot: Some(pivot.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_default_grouping_covers_pivot() {
        let posts = pivot(12);
        let flow = FlowInfo::new("blog").with_dest("public").with_out_ext(".html");
        let ctx = ctx_with(flow, "posts", posts.clone());
        let out = run_stage(&paginator("posts"), &ctx, vec![Entry::new("list").with_basename("blog")]);

        assert_eq!(out.len(), 3);
        let sizes: Vec<_> = out.iter().map(|p| p.borrow().page_items().unwrap().len()).collect();
        assert_eq!(sizes, vec![5, 5, 2]);

        let concatenated: Vec<EntryRef> = out
            .iter()
            .flat_map(|p| p.borrow().page_items().unwrap().to_vec())
            .collect();
        assert_eq!(concatenated.len(), posts.len());
        assert!(concatenated.iter().zip(&posts).all(|(a, b)| Rc::ptr_eq(a, b)));

        for (i, page) in out.iter().enumerate() {
            let page = page.borrow();
            assert_eq!(page.get("page"), Some(json!(i + 1)));
            assert_eq!(page.get("pageCount"), Some(json!(3)));
            assert_eq!(page.get("pageSize"), Some(json!(5)));
            assert_eq!(page.content, "list");
            assert_eq!(page.dest_path, Some(PathBuf::from(format!("public/blog{}.html", i + 1))));
        }
    }

    #[test]
    fn test_empty_pivot_emits_no_pages() {
        let ctx = ctx_with(FlowInfo::new("blog"), "posts", Vec::new());
        let (upstream, pulls) = CountingStream::new(vec![Entry::new("list"), Entry::new("extra")]);
        let mut stream = paginator("posts").build(Box::new(upstream), &ctx).unwrap();

        assert!(stream.pull().unwrap().is_none());
        assert!(stream.pull().unwrap().is_none());
        assert_eq!(pulls.get(), 1);
    }

    #[test]
    fn test_no_template_emits_no_pages() {
        let ctx = ctx_with(FlowInfo::new("blog"), "posts", pivot(3));
        assert!(run_stage(&paginator("posts"), &ctx, Vec::new()).is_empty());
    }

    #[test]
    fn test_only_one_template_is_drawn() {
        let ctx = ctx_with(FlowInfo::new("blog"), "posts", pivot(3));
        let (upstream, pulls) = CountingStream::new(vec![Entry::new("a"), Entry::new("b")]);
        let mut stream = paginator("posts").build(Box::new(upstream), &ctx).unwrap();

        assert_eq!(stream.pull().unwrap().unwrap().borrow().content, "a");
        assert!(stream.pull().unwrap().is_none());
        assert_eq!(pulls.get(), 1);
    }

    #[test]
    fn test_group_by_field_keeps_first_seen_order() {
        let entries: Vec<EntryRef> = ["rust", "go", "rust", "zig", "go"]
            .iter()
            .map(|tag| Entry::new(*tag).with_field("tag", json!({"name": tag})).into_ref())
            .collect();
        let ctx = ctx_with(FlowInfo::new("tags"), "posts", entries);
        let stage = PaginatorStage::new(PaginatorOptions {
            pivot: Some("posts".to_string()),
            page_by: PageBy::Field("tag".to_string()),
            ..Default::default()
        });
        let out = run_stage(&stage, &ctx, vec![Entry::new("tag page")]);

        let keys: Vec<_> = out.iter().map(|p| p.borrow().get("page").unwrap()).collect();
        assert_eq!(keys, vec![json!({"name": "rust"}), json!({"name": "go"}), json!({"name": "zig"})]);
        let counts: Vec<_> = out.iter().map(|p| p.borrow().page_items().unwrap().len()).collect();
        assert_eq!(counts, vec![2, 2, 1]);
        assert!(out.iter().all(|p| p.borrow().get("pageCount") == Some(json!(3))));
    }

    #[test]
    fn test_group_by_function() {
        let ctx = ctx_with(FlowInfo::new("parity").with_dest("out"), "posts", pivot(5));
        let stage = PaginatorStage::new(PaginatorOptions {
            pivot: Some("posts".to_string()),
            page_by: PageBy::Func(Rc::new(|_: &Entry, index: usize| {
                json!(if index % 2 == 0 { "even" } else { "odd" })
            })),
            ..Default::default()
        });
        let out = run_stage(&stage, &ctx, vec![Entry::new("").with_basename("p")]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].borrow().dest_path, Some(PathBuf::from("out/peven.html")));
        assert_eq!(out[1].borrow().page_items().unwrap().len(), 2);
    }

    #[test]
    fn test_configuration_errors() {
        let ctx = ctx_with(FlowInfo::new("blog"), "posts", pivot(1));

        let missing = try_run_stage(&PaginatorStage::default(), &ctx, Vec::new());
        assert!(matches!(missing, Err(PipelineError::Config { .. })));

        let unknown = try_run_stage(&paginator("drafts"), &ctx, Vec::new());
        assert!(matches!(unknown, Err(PipelineError::Config { .. })));

        let zero = PaginatorStage::new(PaginatorOptions {
            pivot: Some("posts".to_string()),
            page_size: 0,
            ..Default::default()
        });
        assert!(matches!(try_run_stage(&zero, &ctx, Vec::new()), Err(PipelineError::Config { .. })));
    }

    #[test]
    fn test_options_from_yaml() {
        let options: PaginatorOptions =
            serde_yaml::from_str("pivot: posts\npageSize: 10\npageBy: category").unwrap();
        assert_eq!(options.pivot.as_deref(), Some("posts"));
        assert_eq!(options.page_size, 10);
        assert!(matches!(options.page_by, PageBy::Field(ref f) if f == "category"));

        assert!(serde_yaml::from_str::<PaginatorOptions>("pivot: posts\npageBy: [a, b]").is_err());
    }
}
