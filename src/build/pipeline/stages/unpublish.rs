//! Publish filter: drops entries marked `published: false`.

use crate::build::entry::EntryRef;
use crate::build::pipeline::{BoxStream, EntryStream, PipelineError, Stage, StageContext};

/// Skips entries whose `published` field is exactly `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnpublishStage;

impl Stage for UnpublishStage {
    fn name(&self) -> &'static str {
        "unpublish"
    }

    fn build(&self, upstream: BoxStream, _ctx: &StageContext) -> Result<BoxStream, PipelineError> {
        Ok(Box::new(UnpublishStream { upstream }))
    }
}

struct UnpublishStream {
    upstream: BoxStream,
}

impl EntryStream for UnpublishStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        while let Some(entry) = self.upstream.pull()? {
            if !entry.borrow().is_unpublished() {
                return Ok(Some(entry));
            }
            tracing::debug!(entry = %entry.borrow().describe(), "skipping unpublished entry");
        }
        Ok(None)
    }
}
