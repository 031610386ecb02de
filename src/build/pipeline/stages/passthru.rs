//! Pass-through stage: runs a user callback on every entry.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::build::entry::EntryRef;
use crate::build::pipeline::{BoxStream, EntryStream, PipelineError, Stage, StageContext};

/// Callback invoked per entry with the stage params and context.
///
/// Returning `Ok(None)` passes the original entry downstream unchanged.
pub type PassFn = Rc<dyn Fn(&EntryRef, &Value, &StageContext) -> anyhow::Result<Option<EntryRef>>>;

/// Stage that hands each entry to a callback and emits what it returns.
#[derive(Clone)]
pub struct PassthruStage {
    pass: PassFn,
    params: Value,
}

impl PassthruStage {
    pub fn new<F>(pass: F) -> Self
    where
        F: Fn(&EntryRef, &Value, &StageContext) -> anyhow::Result<Option<EntryRef>> + 'static,
    {
        Self {
            pass: Rc::new(pass),
            params: Value::Null,
        }
    }

    /// Params passed to every callback invocation.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

impl fmt::Debug for PassthruStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassthruStage")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Stage for PassthruStage {
    fn name(&self) -> &'static str {
        "passthru"
    }

    fn build(&self, upstream: BoxStream, ctx: &StageContext) -> Result<BoxStream, PipelineError> {
        Ok(Box::new(PassthruStream {
            upstream,
            pass: self.pass.clone(),
            params: self.params.clone(),
            ctx: ctx.clone(),
        }))
    }
}

struct PassthruStream {
    upstream: BoxStream,
    pass: PassFn,
    params: Value,
    ctx: StageContext,
}

impl EntryStream for PassthruStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        let Some(entry) = self.upstream.pull()? else {
            return Ok(None);
        };

        let replacement = (self.pass)(&entry, &self.params, &self.ctx).map_err(|source| {
            PipelineError::Pass {
                stage: "passthru".to_string(),
                source,
            }
        })?;
        Ok(Some(replacement.unwrap_or(entry)))
    }
}
