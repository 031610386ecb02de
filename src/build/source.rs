//! Entry sources: where a flow's initial entries come from.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::build::entry::{Entry, EntryRef};
use crate::build::pipeline::{BoxStream, EntryStream, FlowInfo, PipelineError, VecStream};

/// Supplies the first stream of a flow.
///
/// `open` is called once per flow build. The returned stream yields
/// entries until exhausted and then signals end of sequence.
pub trait EntrySource {
    fn open(&self, flow: &FlowInfo) -> Result<BoxStream, PipelineError>;
}

// =============================================================================
// In-memory source
// =============================================================================

/// A fixed list of entries. Every `open` hands out fresh copies.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: Vec<Entry>,
}

impl MemorySource {
    pub fn new(entries: impl IntoIterator<Item = Entry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl EntrySource for MemorySource {
    fn open(&self, _flow: &FlowInfo) -> Result<BoxStream, PipelineError> {
        Ok(Box::new(VecStream::new(self.entries.iter().map(Entry::fork))))
    }
}

// =============================================================================
// Filesystem source
// =============================================================================

/// Reads content files from disk.
///
/// Each configured path is either a file or a directory; directories are
/// walked recursively in file-name order. Files are only read when pulled.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    paths: Vec<PathBuf>,
}

impl FileSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    /// List every file this source would read, in order.
    pub fn discover(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let mut files = Vec::new();
        for path in &self.paths {
            if path.is_dir() {
                for dir_entry in WalkDir::new(path).sort_by_file_name() {
                    let dir_entry = dir_entry?;
                    if dir_entry.file_type().is_file() {
                        files.push(dir_entry.into_path());
                    }
                }
            } else {
                files.push(path.clone());
            }
        }
        Ok(files)
    }
}

impl EntrySource for FileSource {
    fn open(&self, flow: &FlowInfo) -> Result<BoxStream, PipelineError> {
        let files = self.discover()?;
        tracing::debug!(flow = %flow.name, files = files.len(), "discovered source files");
        Ok(Box::new(FileStream {
            files: files.into(),
        }))
    }
}

struct FileStream {
    files: VecDeque<PathBuf>,
}

impl EntryStream for FileStream {
    fn pull(&mut self) -> Result<Option<EntryRef>, PipelineError> {
        let Some(path) = self.files.pop_front() else {
            return Ok(None);
        };
        read_entry(&path).map(|entry| Some(entry.into_ref()))
    }
}

/// Read one content file into an entry with `srcPath`, `basename` and
/// `content` set.
pub fn read_entry(path: &Path) -> Result<Entry, PipelineError> {
    let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut entry = Entry::new(content);
    entry.basename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string());
    entry.src_path = Some(path.to_path_buf());
    Ok(entry)
}
