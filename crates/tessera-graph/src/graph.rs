//! Dependency graph: resources as nodes, edges from a resource to what it depends on.
//!
//! Nodes are owned by the graph's node table. A node refers to its
//! dependencies by id, so replacing a node never leaves dangling references:
//! edges pointing at it follow the new node automatically.

use std::collections::HashMap;
use tessera_core::{Error, Resource, Result};

#[derive(Clone, Debug)]
pub struct DependencyNode {
    resource: Resource,
    dependencies: Vec<String>,
}

impl DependencyNode {
    fn new(resource: Resource) -> Self {
        Self {
            resource,
            dependencies: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.resource.id
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Ids of the nodes this node must be created after.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, DependencyNode>,
    /// Node ids in first-insertion order; traversal roots follow it.
    insertion: Vec<String>,
    resolved: Option<Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node keyed by the resource id. An existing node with the same
    /// id is replaced outright, dependencies included.
    pub fn add_node(&mut self, resource: Resource) {
        let id = resource.id.clone();
        if self
            .nodes
            .insert(id.clone(), DependencyNode::new(resource))
            .is_none()
        {
            self.insertion.push(id);
        }
        self.resolved = None;
    }

    /// Record that `from` depends on `to`.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<()> {
        if !self.nodes.contains_key(to) {
            return Err(Error::unknown_node(to));
        }
        let node = self
            .nodes
            .get_mut(from)
            .ok_or_else(|| Error::unknown_node(from))?;
        if !node.dependencies.iter().any(|d| d == to) {
            node.dependencies.push(to.to_string());
        }
        self.resolved = None;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&DependencyNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.insertion.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Compute a creation order in which every node follows all of its dependencies.
    pub fn resolve(&mut self) -> Result<Vec<&DependencyNode>> {
        self.resolved = None;
        let order = self.post_order()?;

        tracing::debug!(nodes = order.len(), "dependency graph resolved");
        self.resolved = Some(order);
        Ok(self.resolved_order().unwrap_or_default())
    }

    /// Three-state depth-first walk from each root in insertion order. The
    /// walk keeps its own frame stack of `(node, next dependency index)`, so
    /// chain depth is bounded by memory rather than the thread stack.
    fn post_order(&self) -> Result<Vec<String>> {
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.nodes.len());
        let mut stack: Vec<(&DependencyNode, usize)> = Vec::new();
        let mut order: Vec<String> = Vec::with_capacity(self.nodes.len());

        for root in &self.insertion {
            if marks.contains_key(root.as_str()) {
                continue;
            }
            let node = self.nodes.get(root).ok_or_else(|| Error::unknown_node(root))?;
            marks.insert(node.id(), Mark::InProgress);
            stack.push((node, 0));

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                let Some(dep) = node.dependencies.get(next) else {
                    stack.pop();
                    marks.insert(node.id(), Mark::Done);
                    order.push(node.id().to_string());
                    continue;
                };
                frame.1 += 1;

                match marks.get(dep.as_str()) {
                    Some(Mark::Done) => {}
                    Some(Mark::InProgress) => {
                        let start = stack
                            .iter()
                            .position(|(n, _)| n.id() == dep.as_str())
                            .unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[start..].iter().map(|(n, _)| n.id().to_string()).collect();
                        cycle.push(dep.clone());
                        return Err(Error::CycleDetected { path: cycle });
                    }
                    None => {
                        let child = self.nodes.get(dep).ok_or_else(|| Error::unknown_node(dep))?;
                        marks.insert(child.id(), Mark::InProgress);
                        stack.push((child, 0));
                    }
                }
            }
        }
        Ok(order)
    }

    /// The last resolved order, or `None` if the graph changed since (or was never resolved).
    pub fn resolved_order(&self) -> Option<Vec<&DependencyNode>> {
        self.resolved
            .as_ref()
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}
