//! Destination stage: assigns `destPath` from a path template or function.

use std::fmt;
use std::path::{MAIN_SEPARATOR_STR, Path};
use std::rc::Rc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::build::entry::{Entry, EntryRef};
use crate::build::paths::join_dest;
use crate::build::pipeline::placeholder::interpolate;
use crate::build::pipeline::{BoxStream, EntryStream, FlowInfo, PipelineError, Stage, StageContext};

/// Computes a path relative to the flow's destination directory.
///
/// Arguments are the entry, the flow's output extension, the platform path
/// separator and the flow's destination directory.
pub type DestFn = Rc<dyn Fn(&Entry, &str, &str, Option<&Path>) -> String>;

/// A destination path policy.
#[derive(Clone)]
pub enum DestSpec {
    /// A `$(name)` template such as `$(basename)$(outExt)`
    Template(String),
    Func(DestFn),
}

impl fmt::Debug for DestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestSpec::Template(template) => f.debug_tuple("Template").field(template).finish(),
            DestSpec::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for DestSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)
            .map(DestSpec::Template)
            .map_err(|e| D::Error::custom(format!("dest must be a string or a function: {e}")))
    }
}

/// Options for [`DestinationStage`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DestinationOptions {
    /// Required
    pub dest: Option<DestSpec>,
}

/// Stage that sets `destPath` to `<flow dest>/<relative path>`.
#[derive(Debug, Clone, Default)]
pub struct DestinationStage {
    options: DestinationOptions,
}

impl DestinationStage {
    pub fn new(options: DestinationOptions) -> Self {
        Self { options }
    }

    /// Shorthand for a template-driven destination.
    pub fn template(template: impl Into<String>) -> Self {
        Self::new(DestinationOptions {
            dest: Some(DestSpec::Template(template.into())),
        })
    }
}

impl Stage for DestinationStage {
    fn name(&self) -> &'static str {
        "destination"
    }

    fn build(&self, upstream: BoxStream, ctx: &StageContext) -> Result<BoxStream, PipelineError> {
        let spec = self.options.dest.clone().ok_or_else(|| {
            PipelineError::stage("destination", "dest parameter must be a string or a function")
        })?;

        Ok(Box::new(DestinationStream {
            upstream,
            spec,
            flow: ctx.flow.clone(),
        }))
    }
}

struct DestinationStream {
    upstream: BoxStream,
    spec: DestSpec,
    flow: Rc<FlowInfo>,
}

impl DestinationStream {
    fn relative_path(&self, entry: &Entry) -> Result<String, PipelineError> {
        let dest = self.flow.dest.as_deref();
        match &self.spec {
            DestSpec::Func(func) => Ok(func(entry, &self.flow.out_ext, MAIN_SEPARATOR_STR, dest)),
            DestSpec::Template(template) => interpolate(template, |key| {
                // Entry fields shadow the stage's own names
                entry.lookup(key).or_else(|| match key {
                    "sep" => Some(Value::from(MAIN_SEPARATOR_STR)),
                    "outExt" => Some(Value::from(self.flow.out_ext.as_str())),
                    "dest" => dest.map(|d| Value::from(d.to_string_lossy().into_owned())),
                    _ => None,
                })
            }),
        }
    }
}

impl EntryStream for DestinationStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        let Some(entry) = self.upstream.pull()? else {
            return Ok(None);
        };

        let relative = self.relative_path(&entry.borrow())?;
        let dest_path = join_dest(self.flow.dest.as_deref(), &relative);
        entry.borrow_mut().dest_path = Some(dest_path);
        Ok(Some(entry))
    }
}
