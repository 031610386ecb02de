//! Flow metadata and the shared context handed to stage factories.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::build::entry::{EntryRef, LinkArena};

/// Global build data merged into every template context.
pub type GlobalData = Map<String, Value>;

/// A fully drained flow: its entries in emission order.
pub type Materialized = Rc<Vec<EntryRef>>;

/// Static description of a flow, visible to every stage of that flow.
#[derive(Debug, Clone)]
pub struct FlowInfo {
    /// Unique flow name (used as the dependency key)
    pub name: String,
    /// Output directory; stages derive `destPath` below it
    pub dest: Option<PathBuf>,
    /// Output file extension, including the dot (e.g. ".html")
    pub out_ext: String,
    /// Names of flows whose complete output this flow needs
    pub depends: Vec<String>,
}

impl FlowInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dest: None,
            out_ext: ".html".to_string(),
            depends: Vec::new(),
        }
    }

    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn with_out_ext(mut self, out_ext: impl Into<String>) -> Self {
        self.out_ext = out_ext.into();
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends.push(name.into());
        self
    }
}

/// Materialized outputs of a flow's declared dependencies, keyed by flow name.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDependencies {
    flows: BTreeMap<String, Materialized>,
}

impl ResolvedDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entries: Materialized) {
        self.flows.insert(name.into(), entries);
    }

    pub fn get(&self, name: &str) -> Option<&Materialized> {
        self.flows.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flows.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Materialized)> {
        self.flows.iter()
    }

    /// Serialize every dependency as an array of entry values.
    pub fn to_values(&self) -> Map<String, Value> {
        self.flows
            .iter()
            .map(|(name, entries)| {
                let items = entries.iter().map(|e| e.borrow().to_value(1)).collect();
                (name.clone(), Value::Array(items))
            })
            .collect()
    }
}

/// Everything a stage factory receives besides its upstream and params.
///
/// Cheap to clone; stages keep a copy for use while pulling.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub flow: Rc<FlowInfo>,
    pub deps: Rc<ResolvedDependencies>,
    pub data: Rc<GlobalData>,
    /// Where sequencers record the sequences they build
    pub links: Rc<LinkArena>,
}

impl StageContext {
    pub fn new(flow: FlowInfo, deps: ResolvedDependencies, data: Rc<GlobalData>) -> Self {
        Self {
            flow: Rc::new(flow),
            deps: Rc::new(deps),
            data,
            links: Rc::new(LinkArena::new()),
        }
    }

    /// Record sequences in a shared arena instead of a private one.
    pub fn with_links(mut self, links: Rc<LinkArena>) -> Self {
        self.links = links;
        self
    }

    /// A context for a standalone flow with no dependencies or global data.
    pub fn for_flow(flow: FlowInfo) -> Self {
        Self::new(flow, ResolvedDependencies::new(), Rc::new(GlobalData::new()))
    }
}
