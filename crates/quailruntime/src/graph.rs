use crate::registry::NodeRegistry;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use quailcore::{NodeKind, ResolveError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write;

/// Whole-registry dependency graph, edges pointing dependency -> dependant
pub struct DependencyGraph {
    graph: DiGraph<(String, NodeKind), ()>,
    indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph; every `requires` entry must name a registered node
    pub fn from_registry(registry: &NodeRegistry) -> Result<Self, ResolveError> {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();

        for descriptor in registry.descriptors() {
            let idx = graph.add_node((descriptor.id().to_string(), descriptor.kind()));
            indices.insert(descriptor.id().to_string(), idx);
        }

        for descriptor in registry.descriptors() {
            let to = indices[descriptor.id()];
            for dep in descriptor.requires() {
                let from = indices
                    .get(dep)
                    .ok_or_else(|| ResolveError::UnknownDependency {
                        node: descriptor.id().to_string(),
                        missing: dep.clone(),
                    })?;
                graph.add_edge(*from, to, ());
            }
        }

        Ok(Self { graph, indices })
    }

    /// Fails with `CyclicDependency` when any cycle exists
    pub fn validate(&self) -> Result<(), ResolveError> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(ResolveError::CyclicDependency {
                path: self.cycle_through(cycle.node_id()),
            }),
        }
    }

    /// Shortest dependency cycle from `start` back to itself, written the way
    /// the resolver reports it: each id requires the next one
    fn cycle_through(&self, start: NodeIndex) -> Vec<String> {
        let members: HashSet<NodeIndex> = tarjan_scc(&self.graph)
            .into_iter()
            .find(|component| component.contains(&start))
            .unwrap_or_default()
            .into_iter()
            .collect();

        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut closing = None;
        'search: while let Some(current) = queue.pop_front() {
            for dep in self.graph.neighbors_directed(current, Direction::Incoming) {
                if !members.contains(&dep) {
                    continue;
                }
                if dep == start {
                    closing = Some(current);
                    break 'search;
                }
                if !parent.contains_key(&dep) {
                    parent.insert(dep, current);
                    queue.push_back(dep);
                }
            }
        }

        let mut chain = Vec::new();
        let mut node = closing;
        while let Some(current) = node.filter(|n| *n != start) {
            chain.push(current);
            node = parent.get(&current).copied();
        }
        chain.reverse();

        std::iter::once(start)
            .chain(chain)
            .chain(std::iter::once(start))
            .map(|idx| self.graph[idx].0.clone())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Ids that `id` depends on directly
    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Ids that depend on `id` directly
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.indices.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].0.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Graphviz rendering: tasks as boxes, checks as ovals
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph quail {\n  rankdir=LR;\n");
        for idx in self.graph.node_indices() {
            let (id, kind) = &self.graph[idx];
            let shape = match kind {
                NodeKind::Task => "box",
                NodeKind::Check => "oval",
            };
            let _ = writeln!(out, "  \"{}\" [shape={}];", escape(id), shape);
        }
        for edge in self.graph.edge_references() {
            let (from, _) = &self.graph[edge.source()];
            let (to, _) = &self.graph[edge.target()];
            let _ = writeln!(out, "  \"{}\" -> \"{}\";", escape(from), escape(to));
        }
        out.push('}');
        out
    }
}

fn escape(id: &str) -> String {
    id.replace('\\', "\\\\").replace('"', "\\\"")
}
