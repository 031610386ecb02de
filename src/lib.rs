//! Lazy, pull-based content pipelines for static site builds.
//!
//! A site is a set of named [`Flow`]s. Each flow reads entries from a
//! source and pulls them through a chain of stages (front matter, markdown,
//! pagination, sequencing, paths, templates). Flows may depend on the
//! complete output of other flows; the [`Orchestrator`] orders them, drains
//! each depended-upon flow once and hands its entries to the dependents.
//!
//! ```ignore
//! let config = SiteConfig::load_from_file(Path::new("site.yaml"))?;
//! let mut orchestrator = Orchestrator::from_config(&config, &StageRegistry::with_defaults())?;
//! orchestrator.run(&mut WriteSink::new("."))?;
//! ```

pub mod build;
pub mod config;
pub mod logging;
mod util;

pub use build::entry::{Entry, EntryRef, LinkArena, Pagination, Sequence};
pub use build::orchestrator::{BuildSummary, Orchestrator};
pub use build::pipeline::stages;
pub use build::pipeline::{
    BoxStream, EntryStream, Flow, FlowInfo, GlobalData, Materialized, PipelineError,
    ResolvedDependencies, Stage, StageContext, StageRegistry, StageSpec,
};
pub use build::sink::{CollectSink, Sink, WriteSink};
pub use build::source::{EntrySource, FileSource, MemorySource};
pub use config::{ConfigError, FlowConfig, SiteConfig};
