//! Stage lookup by name, for flows assembled from configuration.
//!
//! A flow's stage list in YAML names each stage and optionally gives it
//! options:
//!
//! ```yaml
//! stages:
//!   - yafm
//!   - markdown
//!   - destination: { dest: "$(basename)$(outExt)" }
//!   - template: { layout: layouts/post.html }
//! ```

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value as Yaml;

use super::stages::{
    DestinationStage, MarkdownStage, PaginatorStage, PermalinkStage, SequencerStage,
    SummaryStage, TemplateStage, UnpublishStage, YafmStage,
};
use super::{PipelineError, Stage};

/// One stage invocation: a registered stage name and its raw options.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    pub name: String,
    /// `Null` when no options were given
    pub params: Yaml,
}

impl StageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Yaml::Null,
        }
    }

    pub fn with_params(name: impl Into<String>, params: Yaml) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl<'de> Deserialize<'de> for StageSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let value = Yaml::deserialize(deserializer)?;
        match value {
            Yaml::String(name) => Ok(StageSpec::new(name)),
            Yaml::Mapping(mapping) if mapping.len() == 1 => {
                let Some((name, params)) = mapping.into_iter().next() else {
                    return Err(D::Error::custom("empty stage mapping"));
                };
                let name = name
                    .as_str()
                    .ok_or_else(|| D::Error::custom("stage name must be a string"))?
                    .to_string();
                Ok(StageSpec::with_params(name, params))
            }
            _ => Err(D::Error::custom(
                "stage must be a name or a single-key map from name to options",
            )),
        }
    }
}

type StageCtor = Box<dyn Fn(&Yaml) -> Result<Box<dyn Stage>, PipelineError>>;

/// Maps stage names to constructors taking YAML options.
pub struct StageRegistry {
    ctors: BTreeMap<String, StageCtor>,
}

impl StageRegistry {
    /// A registry with no stages.
    pub fn empty() -> Self {
        Self {
            ctors: BTreeMap::new(),
        }
    }

    /// A registry with every built-in stage.
    ///
    /// `passthru` is registered too, but its callback can only be supplied
    /// from code, so creating it from configuration always fails.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("yafm", |p| Ok(Box::new(YafmStage::new(parse_options("yafm", p)?))));
        registry.register("paginator", |p| {
            Ok(Box::new(PaginatorStage::new(parse_options("paginator", p)?)))
        });
        registry.register("sequencer", |p| {
            Ok(Box::new(SequencerStage::new(parse_options("sequencer", p)?)))
        });
        registry.register("destination", |p| {
            Ok(Box::new(DestinationStage::new(parse_options("destination", p)?)))
        });
        registry.register("permalink", |p| {
            Ok(Box::new(PermalinkStage::new(parse_options("permalink", p)?)))
        });
        registry.register("unpublish", |_| Ok(Box::new(UnpublishStage)));
        registry.register("summary", |p| {
            Ok(Box::new(SummaryStage::new(parse_options("summary", p)?)))
        });
        registry.register("markdown", |p| {
            Ok(Box::new(MarkdownStage::new(parse_options("markdown", p)?)))
        });
        registry.register("template", |p| {
            Ok(Box::new(TemplateStage::new(parse_options("template", p)?)))
        });
        registry.register("passthru", |_| {
            Err(PipelineError::stage(
                "passthru",
                "parameter 'pass' must be a function; add a PassthruStage to the flow from code",
            ))
        });
        registry
    }

    /// Register (or replace) a stage constructor.
    pub fn register<F>(&mut self, name: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn(&Yaml) -> Result<Box<dyn Stage>, PipelineError> + 'static,
    {
        self.ctors.insert(name.into(), Box::new(ctor));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctors.contains_key(name)
    }

    /// Registered stage names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.ctors.keys().map(String::as_str).collect()
    }

    /// Construct the stage a spec names.
    pub fn create(&self, spec: &StageSpec) -> Result<Box<dyn Stage>, PipelineError> {
        let ctor = self
            .ctors
            .get(&spec.name)
            .ok_or_else(|| PipelineError::UnknownStage(spec.name.clone()))?;
        ctor(&spec.params)
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Deserialize stage options; absent options give the defaults.
pub fn parse_options<T>(stage: &str, params: &Yaml) -> Result<T, PipelineError>
where
    T: DeserializeOwned + Default,
{
    if params.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(params.clone())
        .map_err(|e| PipelineError::stage(stage, format!("invalid options: {e}")))
}
