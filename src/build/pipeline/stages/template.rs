//! Template rendering stage.
//!
//! Renders entry content as a tera template and optionally wraps the result
//! in a layout file.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};
use tera::Context;

use crate::build::entry::{Entry, EntryRef};
use crate::build::pipeline::{BoxStream, EntryStream, GlobalData, PipelineError, Stage, StageContext};
use crate::build::render::Renderer;

/// How deep linked entries (`prev`, `next`, `pageItems`) are expanded in
/// the template context.
const CONTEXT_DEPTH: usize = 2;

/// Options for [`TemplateStage`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TemplateOptions {
    /// Layout file, rendered with the entry's output as `body`
    pub layout: Option<PathBuf>,
    /// Use the content as the body verbatim, without rendering it
    pub layout_only: bool,
    /// Glob of template files to load for `import`/`include`
    pub templates: Option<String>,
}

/// Stage that renders `content` with tera.
///
/// The rendering context is the entry's fields, then every resolved
/// dependency by flow name, then the global data; later sources win on
/// name clashes. The layout additionally gets `body`, the rendered content,
/// which overrides any entry or data field named `body`.
#[derive(Debug, Clone, Default)]
pub struct TemplateStage {
    options: TemplateOptions,
}

impl TemplateStage {
    pub fn new(options: TemplateOptions) -> Self {
        Self { options }
    }
}

impl Stage for TemplateStage {
    fn name(&self) -> &'static str {
        "template"
    }

    fn build(&self, upstream: BoxStream, ctx: &StageContext) -> Result<BoxStream, PipelineError> {
        let templates = self.options.templates.as_deref();
        let mut renderer = Renderer::new(templates)
            .map_err(|e| PipelineError::template(templates.unwrap_or("templates"), e))?;

        if let Some(layout) = &self.options.layout {
            renderer
                .set_layout(layout)
                .map_err(|e| PipelineError::template(layout.display().to_string(), e))?;
        }

        Ok(Box::new(TemplateStream {
            upstream,
            renderer,
            layout_only: self.options.layout_only,
            shared: shared_context(ctx),
        }))
    }
}

/// The part of the context common to every entry of a flow.
fn shared_context(ctx: &StageContext) -> Map<String, Value> {
    let mut shared = ctx.deps.to_values();
    let data: &GlobalData = &ctx.data;
    shared.extend(data.clone());
    shared
}

struct TemplateStream {
    upstream: BoxStream,
    renderer: Renderer,
    layout_only: bool,
    shared: Map<String, Value>,
}

impl TemplateStream {
    fn render(&mut self, entry: &Entry) -> tera::Result<String> {
        let mut values = match entry.to_value(CONTEXT_DEPTH) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        values.extend(self.shared.clone());
        let mut context = Context::from_value(Value::Object(values))?;

        let body = if self.layout_only {
            entry.content.clone()
        } else {
            self.renderer.render_content(&entry.content, &context)?
        };

        if !self.renderer.has_layout() {
            return Ok(body);
        }
        context.insert("body", &body);
        self.renderer.render_layout(&context)
    }
}

impl EntryStream for TemplateStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        let Some(entry) = self.upstream.pull()? else {
            return Ok(None);
        };

        let rendered = self.render(&entry.borrow());
        match rendered {
            Ok(content) => {
                entry.borrow_mut().content = content;
                Ok(Some(entry))
            }
            Err(e) => {
                let name = entry.borrow().describe();
                tracing::error!(entry = %name, error = ?e, "template rendering failed");
                Err(PipelineError::template(name, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::build::pipeline::stages::test_support::{run_stage, try_run_stage};
    use crate::build::pipeline::{FlowInfo, ResolvedDependencies};

    fn ctx_with(deps: ResolvedDependencies, data: GlobalData) -> StageContext {
        StageContext::new(FlowInfo::new("pages"), deps, Rc::new(data))
    }

    fn ctx() -> StageContext {
        ctx_with(ResolvedDependencies::new(), GlobalData::new())
    }

    #[test]
    fn test_renders_entry_fields() {
        let entry = Entry::new("<h1>{{ title }}</h1>{{ basename }}")
            .with_basename("hello")
            .with_field("title", json!("Hello & welcome"));
        let out = run_stage(&TemplateStage::default(), &ctx(), vec![entry]);
        assert_eq!(out[0].borrow().content, "<h1>Hello & welcome</h1>hello");
    }

    #[test]
    fn test_dependencies_and_data_in_context() {
        let mut deps = ResolvedDependencies::new();
        deps.insert(
            "posts",
            Rc::new(vec![
                Entry::new("").with_field("title", json!("First")).into_ref(),
                Entry::new("").with_field("title", json!("Second")).into_ref(),
            ]),
        );
        let mut data = GlobalData::new();
        data.insert("site".to_string(), json!({"name": "Example"}));

        let entry = Entry::new("{{ site.name }}:{% for p in posts %} {{ p.title }}{% endfor %}");
        let out = run_stage(&TemplateStage::default(), &ctx_with(deps, data), vec![entry]);
        assert_eq!(out[0].borrow().content, "Example: First Second");
    }

    #[test]
    fn test_data_wins_over_entry_fields() {
        let mut data = GlobalData::new();
        data.insert("title".to_string(), json!("from data"));
        let entry = Entry::new("{{ title }}").with_field("title", json!("from entry"));
        let out = run_stage(&TemplateStage::default(), &ctx_with(ResolvedDependencies::new(), data), vec![entry]);
        assert_eq!(out[0].borrow().content, "from data");
    }

    #[test]
    fn test_layout_wraps_rendered_body() {
        let mut layout = tempfile::NamedTempFile::new().unwrap();
        write!(layout, "<title>{{{{ title }}}}</title><main>{{{{ body }}}}</main>").unwrap();

        let stage = TemplateStage::new(TemplateOptions {
            layout: Some(layout.path().to_path_buf()),
            ..Default::default()
        });
        let entry = Entry::new("<p>{{ title | upper }}</p>").with_field("title", json!("Hi"));
        let out = run_stage(&stage, &ctx(), vec![entry]);
        assert_eq!(out[0].borrow().content, "<title>Hi</title><main><p>HI</p></main>");
    }

    #[test]
    fn test_layout_only_keeps_content_verbatim() {
        let mut layout = tempfile::NamedTempFile::new().unwrap();
        write!(layout, "[{{{{ body }}}}]").unwrap();

        let stage = TemplateStage::new(TemplateOptions {
            layout: Some(layout.path().to_path_buf()),
            layout_only: true,
            ..Default::default()
        });
        let out = run_stage(&stage, &ctx(), vec![Entry::new("{{ not rendered }}")]);
        assert_eq!(out[0].borrow().content, "[{{ not rendered }}]");
    }

    #[test]
    fn test_rendered_body_overrides_body_field() {
        let mut layout = tempfile::NamedTempFile::new().unwrap();
        write!(layout, "[{{{{ body }}}}]").unwrap();

        let mut data = GlobalData::new();
        data.insert("body".to_string(), json!("from data"));
        let stage = TemplateStage::new(TemplateOptions {
            layout: Some(layout.path().to_path_buf()),
            ..Default::default()
        });
        let entry = Entry::new("rendered").with_field("body", json!("from entry"));
        let out = run_stage(&stage, &ctx_with(ResolvedDependencies::new(), data), vec![entry]);
        assert_eq!(out[0].borrow().content, "[rendered]");
    }

    #[test]
    fn test_page_items_are_expanded() {
        let mut deps = ResolvedDependencies::new();
        let posts = Rc::new(vec![
            Entry::new("").with_basename("a").into_ref(),
            Entry::new("").with_basename("b").into_ref(),
        ]);
        deps.insert("posts", posts.clone());

        let mut page = Entry::new("{% for item in pageItems %}{{ item.basename }}{% endfor %}/{{ pageCount }}");
        page.pagination = Some(crate::build::entry::Pagination {
            page: json!(1),
            items: posts,
            count: 1,
            size: 5,
        });
        let out = run_stage(&TemplateStage::default(), &ctx_with(deps, GlobalData::new()), vec![page]);
        assert_eq!(out[0].borrow().content, "ab/1");
    }

    #[test]
    fn test_render_error_is_fatal() {
        let err = try_run_stage(
            &TemplateStage::default(),
            &ctx(),
            vec![Entry::new("{{ missing }}").with_basename("broken")],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Template { ref name, .. } if name == "broken"));
    }

    #[test]
    fn test_missing_layout_fails_at_build() {
        let stage = TemplateStage::new(TemplateOptions {
            layout: Some(PathBuf::from("/nonexistent/layout.html")),
            ..Default::default()
        });
        assert!(try_run_stage(&stage, &ctx(), Vec::new()).is_err());
    }
}
