//! Lazy pull-based flow pipeline.
//!
//! A flow is an ordered chain of stages wired front to back into a single
//! [`EntryStream`]:
//!
//! ```text
//! source -> yafm -> markdown -> sequencer -> template -> (sink)
//! ```
//!
//! Every stage is a factory: given its upstream stream and a
//! [`StageContext`] it returns a new stream. Nothing runs until the sink
//! pulls, and each pull moves at most one entry through each one-to-one
//! stage. Stages that need look-ahead (the front-matter splitter) or the
//! whole collection (paginator, sequencer) buffer internally.

mod context;
mod error;
pub mod placeholder;
mod registry;
pub mod stages;

use std::collections::VecDeque;
use std::rc::Rc;

pub use context::{
    FlowInfo, GlobalData, Materialized, ResolvedDependencies, StageContext,
};
pub use error::PipelineError;
pub use registry::{StageRegistry, StageSpec, parse_options};

use crate::build::entry::{EntryRef, LinkArena};
use crate::build::source::EntrySource;

/// A pull-iterator of entries.
///
/// `Ok(None)` signals end of sequence. Once a stream has returned
/// `Ok(None)` it must keep doing so; flows wrap every stage in [`Fuse`]
/// to guarantee it.
pub trait EntryStream {
    /// Pull the next entry.
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError>;
}

/// A boxed entry stream, as passed between stages.
pub type BoxStream = Box<dyn EntryStream>;

/// A stage factory in a flow.
///
/// `build` is called once per flow build. It must not pull from
/// `upstream`; pulling starts when the returned stream is pulled.
pub trait Stage {
    /// Stage name (used for insertion points and diagnostics).
    fn name(&self) -> &'static str;

    /// Wrap `upstream` with this stage's transformation.
    ///
    /// Configuration problems are reported here, before any entry moves.
    fn build(&self, upstream: BoxStream, ctx: &StageContext) -> Result<BoxStream, PipelineError>;
}

/// Stream adapter that stays exhausted once its inner stream ends.
pub struct Fuse {
    inner: BoxStream,
    done: bool,
}

impl Fuse {
    pub fn new(inner: BoxStream) -> Self {
        Self { inner, done: false }
    }
}

impl EntryStream for Fuse {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        if self.done {
            return Ok(None);
        }
        let next = self.inner.pull()?;
        if next.is_none() {
            self.done = true;
        }
        Ok(next)
    }
}

/// A stream over entries already in memory.
#[derive(Default)]
pub struct VecStream {
    entries: VecDeque<EntryRef>,
}

impl VecStream {
    pub fn new(entries: impl IntoIterator<Item = EntryRef>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl EntryStream for VecStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        Ok(self.entries.pop_front())
    }
}

/// Drain a stream completely into memory.
pub fn materialize(stream: &mut dyn EntryStream) -> Result<Vec<EntryRef>, PipelineError> {
    let mut entries = Vec::new();
    while let Some(entry) = stream.pull()? {
        entries.push(entry);
    }
    Ok(entries)
}

/// A named flow: a source, an ordered chain of stages and output settings.
///
/// # Extension Points
///
/// Insert stages around existing ones by name:
///
/// ```ignore
/// flow.insert_after("markdown", SummaryStage::default())?;
/// ```
pub struct Flow {
    info: FlowInfo,
    source: Box<dyn EntrySource>,
    stages: Vec<Box<dyn Stage>>,
}

impl Flow {
    /// Create a flow with no stages.
    pub fn new<S: EntrySource + 'static>(info: FlowInfo, source: S) -> Self {
        Self {
            info,
            source: Box::new(source),
            stages: Vec::new(),
        }
    }

    pub fn info(&self) -> &FlowInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Add a stage to the end of the flow.
    pub fn add_stage<S: Stage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Add an already boxed stage to the end of the flow.
    pub fn add_boxed_stage(&mut self, stage: Box<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Insert a stage before the named stage.
    pub fn insert_before<S: Stage + 'static>(
        &mut self,
        name: &str,
        stage: S,
    ) -> Result<&mut Self, PipelineError> {
        let pos = self.position(name)?;
        self.stages.insert(pos, Box::new(stage));
        Ok(self)
    }

    /// Insert a stage after the named stage.
    pub fn insert_after<S: Stage + 'static>(
        &mut self,
        name: &str,
        stage: S,
    ) -> Result<&mut Self, PipelineError> {
        let pos = self.position(name)?;
        self.stages.insert(pos + 1, Box::new(stage));
        Ok(self)
    }

    /// Get the names of all stages in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Wire the source and every stage into one stream.
    ///
    /// No entry is pulled here; configuration errors from any stage abort
    /// the build of this flow.
    pub fn build(
        &self,
        deps: ResolvedDependencies,
        data: Rc<GlobalData>,
    ) -> Result<BoxStream, PipelineError> {
        self.build_with_links(deps, data, Rc::new(LinkArena::new()))
    }

    /// Like [`Flow::build`], recording sequences in `links`.
    pub fn build_with_links(
        &self,
        deps: ResolvedDependencies,
        data: Rc<GlobalData>,
        links: Rc<LinkArena>,
    ) -> Result<BoxStream, PipelineError> {
        let ctx = StageContext::new(self.info.clone(), deps, data).with_links(links);
        let mut stream: BoxStream = Box::new(Fuse::new(self.source.open(&ctx.flow)?));
        for stage in &self.stages {
            tracing::debug!(flow = %self.info.name, stage = stage.name(), "building stage");
            stream = Box::new(Fuse::new(stage.build(stream, &ctx)?));
        }
        Ok(stream)
    }

    fn position(&self, name: &str) -> Result<usize, PipelineError> {
        self.stages
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| PipelineError::UnknownStage(name.to_string()))
    }
}
