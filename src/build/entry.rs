//! Entries: the content units that flow through a pipeline.
//!
//! An entry carries its `content` payload, a handful of well-known typed
//! fields that stages read and write (paths, permalink, pagination, links)
//! and an ordered side-map of arbitrary fields, usually set by front matter.
//!
//! Entries are shared as [`EntryRef`] (`Rc<RefCell<Entry>>`) so that lists
//! such as a sequencer's `sequence` or a paginator's `pageItems` observe
//! mutations made by later stages.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};

use crate::util::value_to_string;

/// A shared, mutable handle to an entry.
pub type EntryRef = Rc<RefCell<Entry>>;

// =============================================================================
// Well-known field names
// =============================================================================

pub const CONTENT: &str = "content";
pub const BASENAME: &str = "basename";
pub const SRC_PATH: &str = "srcPath";
pub const DEST_PATH: &str = "destPath";
pub const PERMALINK: &str = "permalink";
pub const SUMMARY: &str = "summary";
pub const SPLIT: &str = "split";
pub const PUBLISHED: &str = "published";
pub const PAGE: &str = "page";
pub const PAGE_ITEMS: &str = "pageItems";
pub const PAGE_COUNT: &str = "pageCount";
pub const PAGE_SIZE: &str = "pageSize";
pub const PREV: &str = "prev";
pub const NEXT: &str = "next";
pub const SEQUENCE: &str = "sequence";

// =============================================================================
// Shared lists
// =============================================================================

/// The ordered list installed on every entry of one sequencer output.
///
/// All entries of the output share one `Rc<Sequence>`, and the sequence
/// owns its entries. Entries a later stage drops or replaces stay reachable
/// through `sequence`, `prev` and `next` of the others.
///
/// Entries and their sequence form reference cycles; [`LinkArena::release`]
/// breaks them.
#[derive(Default)]
pub struct Sequence {
    entries: Vec<EntryRef>,
}

impl Sequence {
    /// Build a sequence over the given entries, in order.
    pub fn new(entries: &[EntryRef]) -> Self {
        Self {
            entries: entries.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<EntryRef> {
        self.entries.get(index).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = EntryRef> + '_ {
        self.entries.iter().cloned()
    }

    /// Position of `entry` in this sequence (by identity).
    pub fn position(&self, entry: &EntryRef) -> Option<usize> {
        self.entries.iter().position(|e| Rc::ptr_eq(e, entry))
    }

    /// Clear `prev`, `next` and `sequence` on every member.
    fn unlink(&self) {
        for entry in &self.entries {
            if let Ok(mut entry) = entry.try_borrow_mut() {
                entry.prev = None;
                entry.next = None;
                entry.sequence = None;
            }
        }
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Every sequence built during one build.
///
/// The orchestrator owns one arena and releases it when dropped, which
/// unlinks the sequenced entries so they can be freed.
#[derive(Debug, Default)]
pub struct LinkArena {
    sequences: RefCell<Vec<Weak<Sequence>>>,
}

impl LinkArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, sequence: &Rc<Sequence>) {
        self.sequences.borrow_mut().push(Rc::downgrade(sequence));
    }

    /// Number of tracked sequences that are still alive.
    pub fn live(&self) -> usize {
        self.sequences
            .borrow()
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    /// Unlink every tracked sequence.
    pub fn release(&self) {
        let sequences = self.sequences.take();
        let released = sequences
            .iter()
            .filter_map(Weak::upgrade)
            .inspect(|sequence| sequence.unlink())
            .count();
        if released > 0 {
            tracing::debug!(sequences = released, "sequence links released");
        }
    }
}

/// Pagination state set by the paginator on each page entry.
#[derive(Debug, Clone)]
pub struct Pagination {
    /// The group key of this page (a page number by default)
    pub page: Value,
    /// The pivot entries assigned to this page, in pivot order
    pub items: Rc<Vec<EntryRef>>,
    /// Total number of pages
    pub count: usize,
    /// Configured page size
    pub size: usize,
}

// =============================================================================
// Entry
// =============================================================================

/// One content unit moving through a flow.
#[derive(Clone, Default)]
pub struct Entry {
    /// Text payload; replaced in place by rendering stages
    pub content: String,
    /// Base file name without extension (e.g. "hello-world")
    pub basename: Option<String>,
    /// Path of the file this entry was read from
    pub src_path: Option<PathBuf>,
    /// Path this entry will be written to
    pub dest_path: Option<PathBuf>,
    /// Public link derived from `dest_path`
    pub permalink: Option<String>,
    /// First paragraph of the content
    pub summary: Option<String>,
    /// Ordinal of this entry within a multi-split source file
    pub split: Option<usize>,
    pub pagination: Option<Pagination>,
    pub prev: Option<EntryRef>,
    pub next: Option<EntryRef>,
    pub sequence: Option<Rc<Sequence>>,
    /// Arbitrary fields, usually from front matter
    pub fields: Map<String, Value>,
}

impl Entry {
    /// Create an entry with the given content and no other fields.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Set the basename (builder style).
    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = Some(basename.into());
        self
    }

    /// Set any field by name (builder style).
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.set(key, value);
        self
    }

    /// Wrap this entry in a fresh shared handle.
    pub fn into_ref(self) -> EntryRef {
        Rc::new(RefCell::new(self))
    }

    /// Clone this entry into a fresh shared handle.
    pub fn fork(&self) -> EntryRef {
        self.clone().into_ref()
    }

    /// Read a field by name, well-known fields first.
    ///
    /// Linked entries (`prev`, `next`, `pageItems`, `sequence`) are returned
    /// in their shallow form.
    pub fn get(&self, key: &str) -> Option<Value> {
        let known = match key {
            CONTENT => Some(Value::String(self.content.clone())),
            BASENAME => self.basename.clone().map(Value::String),
            SRC_PATH => self.src_path.as_deref().map(path_value),
            DEST_PATH => self.dest_path.as_deref().map(path_value),
            PERMALINK => self.permalink.clone().map(Value::String),
            SUMMARY => self.summary.clone().map(Value::String),
            SPLIT => self.split.map(Value::from),
            PAGE => self.pagination.as_ref().map(|p| p.page.clone()),
            PAGE_COUNT => self.pagination.as_ref().map(|p| Value::from(p.count)),
            PAGE_SIZE => self.pagination.as_ref().map(|p| Value::from(p.size)),
            PAGE_ITEMS => self
                .pagination
                .as_ref()
                .map(|p| shallow_list(p.items.iter().cloned())),
            PREV => self.prev().map(|e| e.borrow().to_value(0)),
            NEXT => self.next().map(|e| e.borrow().to_value(0)),
            SEQUENCE => self.sequence.as_ref().map(|s| shallow_list(s.iter())),
            _ => None,
        };
        known.or_else(|| self.fields.get(key).cloned())
    }

    /// Read a dotted field path such as `author.name` or `tags.0`.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let mut value = self.get(parts.next()?)?;
        for part in parts {
            value = match value {
                Value::Object(mut map) => map.remove(part)?,
                Value::Array(mut items) => {
                    let index: usize = part.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        Some(value)
    }

    /// Write a field by name.
    ///
    /// Well-known text fields take the plain-text form of scalar values;
    /// `null` clears them. Everything else lands in the side-map.
    pub fn set(&mut self, key: &str, value: Value) {
        match key {
            CONTENT => self.content = self.text_field(key, &value).unwrap_or_default(),
            BASENAME => self.basename = self.text_field(key, &value),
            SRC_PATH => self.src_path = self.text_field(key, &value).map(PathBuf::from),
            DEST_PATH => self.dest_path = self.text_field(key, &value).map(PathBuf::from),
            PERMALINK => self.permalink = self.text_field(key, &value),
            SUMMARY => self.summary = self.text_field(key, &value),
            SPLIT => self.split = value.as_u64().and_then(|n| usize::try_from(n).ok()),
            _ => {
                self.fields.insert(key.to_string(), value);
            }
        }
    }

    /// Merge a map of fields onto this entry; incoming keys win.
    pub fn merge(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            self.set(&key, value);
        }
    }

    /// True only when `published` is explicitly `false`.
    pub fn is_unpublished(&self) -> bool {
        matches!(self.fields.get(PUBLISHED), Some(Value::Bool(false)))
    }

    /// The previous entry in the sequence, if any.
    pub fn prev(&self) -> Option<EntryRef> {
        self.prev.clone()
    }

    /// The next entry in the sequence, if any.
    pub fn next(&self) -> Option<EntryRef> {
        self.next.clone()
    }

    /// The pivot entries of this page, if this entry is a page.
    pub fn page_items(&self) -> Option<&[EntryRef]> {
        self.pagination.as_ref().map(|p| p.items.as_slice())
    }

    /// A short description for log messages.
    pub fn describe(&self) -> String {
        self.src_path
            .as_ref()
            .map(|p| p.display().to_string())
            .or_else(|| self.basename.clone())
            .unwrap_or_else(|| "<anonymous entry>".to_string())
    }

    /// Serialize this entry for a template context.
    ///
    /// `depth` bounds how far linked entries are expanded: at depth 0 only
    /// this entry's own fields are included. At depth > 0, `prev`, `next`
    /// and `pageItems` are expanded at `depth - 1`, and `sequence` is
    /// expanded shallowly.
    pub fn to_value(&self, depth: usize) -> Value {
        let mut map = self.fields.clone();
        map.insert(CONTENT.to_string(), Value::String(self.content.clone()));
        for key in [BASENAME, SRC_PATH, DEST_PATH, PERMALINK, SUMMARY, SPLIT] {
            if let Some(value) = self.get(key) {
                map.insert(key.to_string(), value);
            }
        }

        if let Some(pagination) = &self.pagination {
            map.insert(PAGE.to_string(), pagination.page.clone());
            map.insert(PAGE_COUNT.to_string(), Value::from(pagination.count));
            map.insert(PAGE_SIZE.to_string(), Value::from(pagination.size));
            if depth > 0 {
                let items = pagination
                    .items
                    .iter()
                    .map(|e| e.borrow().to_value(depth - 1))
                    .collect();
                map.insert(PAGE_ITEMS.to_string(), Value::Array(items));
            }
        }

        if depth > 0 {
            if let Some(prev) = self.prev() {
                map.insert(PREV.to_string(), prev.borrow().to_value(depth - 1));
            }
            if let Some(next) = self.next() {
                map.insert(NEXT.to_string(), next.borrow().to_value(depth - 1));
            }
            if let Some(sequence) = &self.sequence {
                map.insert(SEQUENCE.to_string(), shallow_list(sequence.iter()));
            }
        }

        Value::Object(map)
    }

    fn text_field(&self, key: &str, value: &Value) -> Option<String> {
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            tracing::warn!(
                entry = %self.describe(),
                field = key,
                "ignoring non-scalar value for text field"
            );
        }
        value_to_string(value)
    }
}

// Links are printed by name; following them would recurse through the cycle.
impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("content", &self.content)
            .field("basename", &self.basename)
            .field("src_path", &self.src_path)
            .field("dest_path", &self.dest_path)
            .field("permalink", &self.permalink)
            .field("summary", &self.summary)
            .field("split", &self.split)
            .field("pagination", &self.pagination)
            .field("prev", &self.prev.as_ref().map(link_name))
            .field("next", &self.next.as_ref().map(link_name))
            .field("sequence", &self.sequence)
            .field("fields", &self.fields)
            .finish()
    }
}

fn link_name(entry: &EntryRef) -> String {
    entry
        .try_borrow()
        .map(|e| e.describe())
        .unwrap_or_else(|_| "<borrowed entry>".to_string())
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

fn shallow_list(entries: impl Iterator<Item = EntryRef>) -> Value {
    Value::Array(entries.map(|e| e.borrow().to_value(0)).collect())
}
