//! Planner: turns a flat resource list into a resolved, read-only plan.
//!
//! Planning is pure: it builds the graph in memory and resolves it. No
//! provider or storage is touched, so a planning error has no side effects.

use crate::graph::DependencyGraph;
use std::collections::{HashMap, HashSet};
use tessera_core::{Error, Resource, Result};
use tracing::{debug, warn};

/// One resource in a resolved plan.
#[derive(Clone, Debug)]
pub struct PlannedNode {
    pub resource: Resource,
    /// Ids this node is created after.
    pub dependencies: Vec<String>,
    /// Ids created after this node.
    pub dependents: Vec<String>,
    /// Position in the creation order.
    pub index: usize,
}

impl PlannedNode {
    pub fn id(&self) -> &str {
        &self.resource.id
    }
}

/// A resolved dependency graph. Immutable once built, so it can be shared
/// with concurrent execution tasks.
#[derive(Clone, Debug)]
pub struct Plan {
    graph: DependencyGraph,
    nodes: Vec<PlannedNode>,
    index: HashMap<String, usize>,
}

impl Plan {
    /// Snapshot a resolved graph. Fails if the graph has no current resolution.
    pub fn from_graph(graph: DependencyGraph) -> Result<Self> {
        let order = graph
            .resolved_order()
            .ok_or_else(|| Error::Internal("dependency graph is not resolved".into()))?;

        let index: HashMap<String, usize> = order
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id().to_string(), i))
            .collect();

        let mut nodes: Vec<PlannedNode> = order
            .iter()
            .enumerate()
            .map(|(i, node)| PlannedNode {
                resource: node.resource().clone(),
                dependencies: node.dependencies().to_vec(),
                dependents: Vec::new(),
                index: i,
            })
            .collect();

        for i in 0..nodes.len() {
            let id = nodes[i].resource.id.clone();
            for dep in nodes[i].dependencies.clone() {
                if let Some(&d) = index.get(&dep) {
                    nodes[d].dependents.push(id.clone());
                }
            }
        }

        Ok(Self {
            graph,
            nodes,
            index,
        })
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> &[PlannedNode] {
        &self.nodes
    }

    pub fn get(&self, id: &str) -> Option<&PlannedNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn order(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id()).collect()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Build and resolve a dependency graph from `resources`.
///
/// Returns the first structural error: a malformed `dependencies` argument,
/// a dependency on an id not in `resources` ([`Error::UnknownNode`]), or a
/// cycle ([`Error::CycleDetected`]).
///
/// When an id is declared more than once the last declaration wins whole:
/// its arguments and its `dependencies` replace the earlier ones, and the
/// earlier declarations' dependencies are dropped rather than merged.
pub fn plan(resources: impl IntoIterator<Item = Resource>) -> Result<Plan> {
    let resources: Vec<Resource> = resources.into_iter().collect();
    let mut graph = DependencyGraph::new();
    let mut seen = HashSet::new();

    for resource in &resources {
        if !seen.insert(resource.id.clone()) {
            warn!(id = %resource.id, "duplicate resource id, last declaration wins");
        }
        graph.add_node(resource.clone());
    }

    // Edges come from the node actually kept for each id.
    let kept: Vec<Resource> = graph.nodes().map(|n| n.resource().clone()).collect();
    for resource in &kept {
        for dep in resource.dependencies()? {
            graph.add_edge(&resource.id, &dep)?;
        }
    }

    graph.resolve()?;
    let plan = Plan::from_graph(graph)?;
    debug!(order = ?plan.order(), "plan resolved");
    Ok(plan)
}
