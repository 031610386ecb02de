//! Sequencing stage.
//!
//! Materializes the whole upstream, optionally sorts and reverses it,
//! cross-links neighbours and then replays it.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::build::entry::{Entry, EntryRef, LinkArena, Sequence};
use crate::build::pipeline::{BoxStream, EntryStream, PipelineError, Stage, StageContext};
use crate::util::compare_values;

/// Comparator used to order a sequence.
pub type SortFn = Rc<dyn Fn(&Entry, &Entry) -> Ordering>;

/// Sort key for a sequence.
#[derive(Clone)]
pub enum SortBy {
    /// Sort by the value of a (dotted) field
    Field(String),
    /// Sort with a comparator
    Func(SortFn),
}

impl fmt::Debug for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortBy::Field(field) => f.debug_tuple("Field").field(field).finish(),
            SortBy::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for SortBy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)
            .map(SortBy::Field)
            .map_err(|e| D::Error::custom(format!("sortBy must be a field name or a function: {e}")))
    }
}

/// Options for [`SequencerStage`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SequencerOptions {
    pub sort_by: Option<SortBy>,
    pub reverse: bool,
    /// Set `prev`/`next` on each entry
    pub insert_refs: bool,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            sort_by: None,
            reverse: false,
            insert_refs: true,
        }
    }
}

/// Stage that turns its upstream into a linked sequence.
///
/// Each upstream entry is cloned before it is linked. Every emitted entry
/// gets `sequence`, one list shared by all of them; with `insertRefs`
/// (the default) each also gets `prev` and `next`, except at the ends.
///
/// The links own their targets, so they survive later stages that drop or
/// replace entries. The sequence is recorded in the context's
/// [`LinkArena`].
#[derive(Debug, Clone, Default)]
pub struct SequencerStage {
    options: SequencerOptions,
}

impl SequencerStage {
    pub fn new(options: SequencerOptions) -> Self {
        Self { options }
    }
}

impl Stage for SequencerStage {
    fn name(&self) -> &'static str {
        "sequencer"
    }

    fn build(&self, upstream: BoxStream, ctx: &StageContext) -> Result<BoxStream, PipelineError> {
        Ok(Box::new(SequencerStream {
            upstream,
            options: self.options.clone(),
            links: ctx.links.clone(),
            sequence: None,
            index: 0,
        }))
    }
}

struct SequencerStream {
    upstream: BoxStream,
    options: SequencerOptions,
    links: Rc<LinkArena>,
    /// The collected entries; `None` until the first pull
    sequence: Option<Vec<EntryRef>>,
    index: usize,
}

impl SequencerStream {
    fn collect(&mut self) -> Result<Vec<EntryRef>, PipelineError> {
        let mut items = Vec::new();
        while let Some(entry) = self.upstream.pull()? {
            items.push(entry.borrow().fork());
        }

        match &self.options.sort_by {
            Some(SortBy::Field(field)) => {
                let mut keyed: Vec<_> = items
                    .into_iter()
                    .map(|e| {
                        let key = e.borrow().lookup(field);
                        (key, e)
                    })
                    .collect();
                keyed.sort_by(|(a, _), (b, _)| compare_values(a.as_ref(), b.as_ref()));
                items = keyed.into_iter().map(|(_, e)| e).collect();
            }
            Some(SortBy::Func(compare)) => {
                items.sort_by(|a, b| compare(&a.borrow(), &b.borrow()));
            }
            None => {}
        }
        if self.options.reverse {
            items.reverse();
        }

        let shared = Rc::new(Sequence::new(&items));
        self.links.track(&shared);
        let last = items.len().saturating_sub(1);
        for (i, item) in items.iter().enumerate() {
            let mut entry = item.borrow_mut();
            if self.options.insert_refs {
                entry.prev = (i > 0).then(|| items[i - 1].clone());
                entry.next = (i < last).then(|| items[i + 1].clone());
            }
            entry.sequence = Some(shared.clone());
        }

        Ok(items)
    }
}

impl EntryStream for SequencerStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        if self.sequence.is_none() {
            let items = self.collect()?;
            tracing::debug!(entries = items.len(), "sequence collected");
            self.sequence = Some(items);
        }

        let next = self
            .sequence
            .as_ref()
            .and_then(|items| items.get(self.index))
            .cloned();
        if next.is_some() {
            self.index += 1;
        }
        Ok(next)
    }
}
