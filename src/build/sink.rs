//! Entry sinks: consumers of a flow's final stream.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::build::entry::EntryRef;
use crate::build::pipeline::{FlowInfo, PipelineError};

/// Consumes the entries a flow emits, one at a time.
pub trait Sink {
    fn consume(&mut self, flow: &FlowInfo, entry: &EntryRef) -> Result<(), PipelineError>;
}

/// Keeps every emitted entry, grouped by flow name.
#[derive(Debug, Default)]
pub struct CollectSink {
    flows: BTreeMap<String, Vec<EntryRef>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries emitted by the named flow (empty if none).
    pub fn entries(&self, flow: &str) -> &[EntryRef] {
        self.flows.get(flow).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names of the flows that emitted at least one entry, sorted.
    pub fn flow_names(&self) -> Vec<&str> {
        self.flows.keys().map(String::as_str).collect()
    }
}

impl Sink for CollectSink {
    fn consume(&mut self, flow: &FlowInfo, entry: &EntryRef) -> Result<(), PipelineError> {
        self.flows
            .entry(flow.name.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }
}

/// Writes each entry's `content` to its `destPath` below a root directory.
///
/// Entries without a `destPath` are skipped with a warning.
#[derive(Debug)]
pub struct WriteSink {
    root: PathBuf,
    written: usize,
    skipped: usize,
}

impl WriteSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: 0,
            skipped: 0,
        }
    }

    /// Number of files written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Number of entries skipped for lack of a destination.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Sink for WriteSink {
    fn consume(&mut self, flow: &FlowInfo, entry: &EntryRef) -> Result<(), PipelineError> {
        let entry = entry.borrow();
        let Some(dest_path) = &entry.dest_path else {
            tracing::warn!(
                flow = %flow.name,
                entry = %entry.describe(),
                "entry has no destPath, not writing it"
            );
            self.skipped += 1;
            return Ok(());
        };

        let output_path = self.root.join(dest_path);

        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&output_path, &entry.content)?;
        tracing::debug!(flow = %flow.name, path = %output_path.display(), "wrote entry");
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::entry::Entry;

    #[test]
    fn test_collect_sink_groups_by_flow() {
        let mut sink = CollectSink::new();
        let posts = FlowInfo::new("posts");
        let pages = FlowInfo::new("pages");
        sink.consume(&posts, &Entry::new("1").into_ref()).unwrap();
        sink.consume(&pages, &Entry::new("2").into_ref()).unwrap();
        sink.consume(&posts, &Entry::new("3").into_ref()).unwrap();

        assert_eq!(sink.entries("posts").len(), 2);
        assert_eq!(sink.entries("pages")[0].borrow().content, "2");
        assert!(sink.entries("missing").is_empty());
        assert_eq!(sink.flow_names(), vec!["pages", "posts"]);
    }

    #[test]
    fn test_write_sink_writes_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = WriteSink::new(dir.path());
        let flow = FlowInfo::new("posts");

        let mut entry = Entry::new("<p>hello</p>");
        entry.dest_path = Some(PathBuf::from("public/blog/hello.html"));
        sink.consume(&flow, &entry.into_ref()).unwrap();
        sink.consume(&flow, &Entry::new("orphan").into_ref()).unwrap();

        let written = std::fs::read_to_string(dir.path().join("public/blog/hello.html")).unwrap();
        assert_eq!(written, "<p>hello</p>");
        assert_eq!(sink.written(), 1);
        assert_eq!(sink.skipped(), 1);
    }
}
