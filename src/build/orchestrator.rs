//! Dependency orchestration across flows.
//!
//! Flows name the flows they depend on. The orchestrator checks that the
//! resulting graph is closed and acyclic, drains every depended-upon flow
//! exactly once, and hands the drained entries to dependents as
//! [`ResolvedDependencies`].

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::build::entry::LinkArena;
use crate::build::pipeline::{
    BoxStream, Flow, FlowInfo, GlobalData, Materialized, PipelineError, ResolvedDependencies,
    StageRegistry, VecStream, materialize,
};
use crate::build::sink::Sink;
use crate::build::source::FileSource;
use crate::config::SiteConfig;

/// Number of entries each flow emitted during [`Orchestrator::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildSummary {
    /// `(flow name, entries)` in the order the flows ran
    pub flows: Vec<(String, usize)>,
}

impl BuildSummary {
    pub fn total_entries(&self) -> usize {
        self.flows.iter().map(|(_, count)| count).sum()
    }

    /// Entries emitted by one flow, if it ran.
    pub fn entries(&self, flow: &str) -> Option<usize> {
        self.flows
            .iter()
            .find(|(name, _)| name == flow)
            .map(|(_, count)| *count)
    }
}

/// Drives a set of flows in dependency order.
///
/// Sequencer links (`prev`, `next`, `sequence`) on the entries it produced
/// stay valid while the orchestrator lives. Dropping it unlinks them.
pub struct Orchestrator {
    flows: Vec<Flow>,
    index: BTreeMap<String, usize>,
    /// Flow indices, dependencies before dependents
    order: Vec<usize>,
    /// Names of flows some other flow depends on
    depended_on: BTreeSet<String>,
    data: Rc<GlobalData>,
    resolved: BTreeMap<String, Materialized>,
    links: Rc<LinkArena>,
}

impl Orchestrator {
    /// Validate the dependency graph of `flows`.
    ///
    /// Fails on duplicate flow names, dependencies on undeclared flows and
    /// dependency cycles.
    pub fn new(flows: Vec<Flow>, data: GlobalData) -> Result<Self, PipelineError> {
        let mut index = BTreeMap::new();
        for (i, flow) in flows.iter().enumerate() {
            if index.insert(flow.name().to_string(), i).is_some() {
                return Err(PipelineError::DuplicateFlow(flow.name().to_string()));
            }
        }

        let mut depended_on = BTreeSet::new();
        for flow in &flows {
            for dependency in &flow.info().depends {
                if !index.contains_key(dependency) {
                    return Err(PipelineError::UnknownDependency {
                        flow: flow.name().to_string(),
                        dependency: dependency.clone(),
                    });
                }
                depended_on.insert(dependency.clone());
            }
        }

        let order = topological_order(&flows, &index)?;

        Ok(Self {
            flows,
            index,
            order,
            depended_on,
            data: Rc::new(data),
            resolved: BTreeMap::new(),
            links: Rc::new(LinkArena::new()),
        })
    }

    /// Assemble flows from configuration, reading sources from disk.
    pub fn from_config(config: &SiteConfig, registry: &StageRegistry) -> Result<Self, PipelineError> {
        let mut flows = Vec::with_capacity(config.flows.len());
        for flow_config in &config.flows {
            let mut info = FlowInfo::new(&flow_config.name).with_out_ext(&flow_config.out_ext);
            info.dest = flow_config.dest.clone();
            info.depends = flow_config.depends.clone();

            let mut flow = Flow::new(info, FileSource::new(flow_config.src.iter().cloned()));
            for spec in &flow_config.stages {
                flow.add_boxed_stage(registry.create(spec)?);
            }
            flows.push(flow);
        }
        Self::new(flows, config.data.clone())
    }

    /// Flow names in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.flows[i].name()).collect()
    }

    pub fn flow(&self, name: &str) -> Option<&Flow> {
        self.index.get(name).map(|&i| &self.flows[i])
    }

    /// Access a flow to add stages after it was configured.
    pub fn flow_mut(&mut self, name: &str) -> Option<&mut Flow> {
        self.index.get(name).map(|&i| &mut self.flows[i])
    }

    /// Drain the named flow, or return its already drained entries.
    ///
    /// Each flow is built and drained at most once per orchestrator; later
    /// calls share the same list.
    pub fn materialize(&mut self, name: &str) -> Result<Materialized, PipelineError> {
        if let Some(entries) = self.resolved.get(name) {
            return Ok(entries.clone());
        }

        let mut stream = self.build_flow(name)?;
        let entries = Rc::new(materialize(stream.as_mut())?);
        tracing::debug!(flow = name, entries = entries.len(), "flow materialized");

        self.resolved.insert(name.to_string(), entries.clone());
        Ok(entries)
    }

    /// A stream over the named flow's output.
    ///
    /// Its dependencies are materialized first. A flow that was already
    /// materialized is replayed rather than rebuilt.
    pub fn stream(&mut self, name: &str) -> Result<BoxStream, PipelineError> {
        if let Some(entries) = self.resolved.get(name) {
            return Ok(Box::new(VecStream::new(entries.iter().cloned())));
        }
        self.build_flow(name)
    }

    /// Run every flow in dependency order, feeding its output to `sink`.
    ///
    /// Flows that others depend on are materialized and replayed, so no
    /// flow is drained twice.
    pub fn run(&mut self, sink: &mut dyn Sink) -> Result<BuildSummary, PipelineError> {
        let mut summary = BuildSummary::default();

        for i in self.order.clone() {
            let info = self.flows[i].info().clone();
            let mut stream: BoxStream = if self.depended_on.contains(&info.name) {
                let entries = self.materialize(&info.name)?;
                Box::new(VecStream::new(entries.iter().cloned()))
            } else {
                self.stream(&info.name)?
            };

            let mut count = 0;
            while let Some(entry) = stream.pull()? {
                sink.consume(&info, &entry)?;
                count += 1;
            }
            tracing::info!(flow = %info.name, entries = count, "flow finished");
            summary.flows.push((info.name, count));
        }

        Ok(summary)
    }

    fn build_flow(&mut self, name: &str) -> Result<BoxStream, PipelineError> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| PipelineError::UnknownFlow(name.to_string()))?;

        let mut deps = ResolvedDependencies::new();
        for dependency in self.flows[i].info().depends.clone() {
            let entries = self.materialize(&dependency)?;
            deps.insert(dependency, entries);
        }

        tracing::debug!(flow = name, "building flow");
        self.flows[i].build_with_links(deps, self.data.clone(), self.links.clone())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.links.release();
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Order flows so every flow comes after its dependencies.
///
/// Declaration order is kept where the graph allows it.
fn topological_order(
    flows: &[Flow],
    index: &BTreeMap<String, usize>,
) -> Result<Vec<usize>, PipelineError> {
    let mut marks = vec![Mark::Unvisited; flows.len()];
    let mut path = Vec::new();
    let mut order = Vec::with_capacity(flows.len());

    for i in 0..flows.len() {
        visit(i, flows, index, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

fn visit(
    i: usize,
    flows: &[Flow],
    index: &BTreeMap<String, usize>,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<(), PipelineError> {
    match marks[i] {
        Mark::Done => return Ok(()),
        Mark::Visiting => {
            let start = path.iter().position(|&p| p == i).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..]
                .iter()
                .map(|&p| flows[p].name().to_string())
                .collect();
            cycle.push(flows[i].name().to_string());
            return Err(PipelineError::DependencyCycle(cycle));
        }
        Mark::Unvisited => {}
    }

    marks[i] = Mark::Visiting;
    path.push(i);
    for dependency in &flows[i].info().depends {
        if let Some(&d) = index.get(dependency) {
            visit(d, flows, index, marks, path, order)?;
        }
    }
    path.pop();
    marks[i] = Mark::Done;
    order.push(i);
    Ok(())
}
