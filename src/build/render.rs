use std::path::Path;

use tera::{Context, Tera};

use super::filters;

/// Name under which a configured layout file is registered.
const LAYOUT_TEMPLATE_NAME: &str = "__layout__";

/// Name under which entry content is temporarily registered.
const CONTENT_TEMPLATE_NAME: &str = "__content_render__";

/// The template renderer, wrapping Tera.
///
/// Autoescaping is off: entry content is already HTML by the time it is
/// wrapped in a layout.
pub struct Renderer {
    tera: Tera,
    has_layout: bool,
}

impl Renderer {
    /// Create a renderer, optionally loading templates matching `glob` so
    /// content and layouts can import or include them.
    pub fn new(glob: Option<&str>) -> tera::Result<Self> {
        let mut tera = match glob {
            Some(glob) => Tera::new(glob)?,
            None => Tera::default(),
        };
        tera.autoescape_on(vec![]);
        filters::register(&mut tera);

        Ok(Self {
            tera,
            has_layout: false,
        })
    }

    /// Compile a layout file; it is rendered with `body` set to the content.
    pub fn set_layout(&mut self, path: &Path) -> tera::Result<()> {
        self.tera.add_template_file(path, Some(LAYOUT_TEMPLATE_NAME))?;
        self.has_layout = true;
        Ok(())
    }

    pub fn has_layout(&self) -> bool {
        self.has_layout
    }

    /// Render entry content as a template.
    ///
    /// The content is added as a temporary template so it has access to
    /// macros defined in the loaded template files.
    pub fn render_content(&mut self, content: &str, context: &Context) -> tera::Result<String> {
        self.tera.add_raw_template(CONTENT_TEMPLATE_NAME, content)?;

        let result = self.tera.render(CONTENT_TEMPLATE_NAME, context);

        // Clean up the temporary template
        self.tera.templates.remove(CONTENT_TEMPLATE_NAME);

        result
    }

    /// Render the layout with the given context.
    pub fn render_layout(&self, context: &Context) -> tera::Result<String> {
        self.tera.render(LAYOUT_TEMPLATE_NAME, context)
    }
}
