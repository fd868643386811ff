//! Generic directed acyclic graph (DAG) library for dependency resolution.
//!
//! This crate provides a small DAG implementation used to model project
//! dependency graphs:
//! - Nested sub-project dependencies
//! - Build ordering of dependency artifacts
//!
//! # Features
//!
//! - Generic nodes and edges with type parameters
//! - Deterministic node order (insertion order)
//! - Cycle rejection on edge insertion, with the offending cycle reported
//! - Deterministic topological sorting using Kahn's algorithm
//! - Optional serde support
//!
//! # Example
//!
//! ```
//! use convenient_graph::{DAG, GraphError};
//!
//! // Projects as nodes, "must be built before" as edges
//! let mut dag = DAG::<&str, ()>::new();
//!
//! let util = dag.add_node("util");
//! let core = dag.add_node("core");
//! let app = dag.add_node("app");
//!
//! dag.add_edge(util, core, ()).unwrap(); // core depends on util
//! dag.add_edge(core, app, ()).unwrap(); // app depends on core
//!
//! assert_eq!(dag.topological_sort(), vec![util, core, app]);
//!
//! // util depending on app would close a cycle
//! let err = dag.add_edge(app, util, ()).unwrap_err();
//! assert!(matches!(err, GraphError::CycleDetected(_)));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Node identifier in the DAG.
///
/// Identifiers are handed out in insertion order, so ordering by `NodeId`
/// is ordering by insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in insertion order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

fn format_path(path: &[NodeId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Error types for DAG operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Adding an edge would close a cycle.
    ///
    /// The path follows edge direction and starts and ends with the same node.
    #[error("Cycle detected in graph: {}", format_path(.0))]
    CycleDetected(Vec<NodeId>),

    /// Node not found
    #[error("Node {0} not found in graph")]
    NodeNotFound(NodeId),
}

/// Result type for DAG operations.
pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Node<N> {
    data: N,
    // Outgoing edges (this node -> other nodes), in insertion order
    outgoing: Vec<NodeId>,
    // Incoming edges (other nodes -> this node), in insertion order
    incoming: Vec<NodeId>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Edge<E> {
    from: NodeId,
    to: NodeId,
    data: E,
}

/// Generic directed acyclic graph (DAG).
///
/// An edge `from -> to` means `from` must be processed before `to`. The graph
/// refuses any edge that would introduce a cycle, so it is acyclic at all
/// times.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DAG<N, E> {
    nodes: Vec<Node<N>>,
    edges: Vec<Edge<E>>,
}

impl<N, E> Default for DAG<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, E> DAG<N, E> {
    /// Create a new empty DAG.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Add a node to the graph and return its ID.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        id
    }

    /// Add a directed edge from `from` to `to` with associated data.
    ///
    /// The edge represents precedence: `from` must be processed before `to`.
    /// For example, if project B depends on project A, call `add_edge(A, B, ...)`.
    /// Adding an edge that already exists is a no-op.
    ///
    /// # Errors
    ///
    /// - `GraphError::NodeNotFound` if either node doesn't exist
    /// - `GraphError::CycleDetected` if adding the edge would create a cycle
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, data: E) -> GraphResult<()> {
        self.check(from)?;
        self.check(to)?;

        if from == to {
            return Err(GraphError::CycleDetected(vec![from, from]));
        }
        if self.contains_edge(from, to) {
            return Ok(());
        }

        // If `to` already reaches `from`, the new edge closes the loop
        if let Some(mut cycle) = self.path(to, from) {
            cycle.push(to);
            return Err(GraphError::CycleDetected(cycle));
        }

        self.edges.push(Edge { from, to, data });
        self.nodes[from.0].outgoing.push(to);
        self.nodes[to.0].incoming.push(from);

        Ok(())
    }

    fn check(&self, id: NodeId) -> GraphResult<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::NodeNotFound(id))
        }
    }

    /// Whether the edge `from -> to` is present.
    #[must_use]
    pub fn contains_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.nodes
            .get(from.0)
            .is_some_and(|node| node.outgoing.contains(&to))
    }

    /// Shortest path from `start` to `end` following edge direction.
    ///
    /// Returns `None` if `end` is not reachable from `start`. A node always
    /// reaches itself with the single-element path `[start]`.
    #[must_use]
    pub fn path(&self, start: NodeId, end: NodeId) -> Option<Vec<NodeId>> {
        if self.check(start).is_err() || self.check(end).is_err() {
            return None;
        }
        if start == end {
            return Some(vec![start]);
        }

        let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for &neighbor in &self.nodes[current.0].outgoing {
                if neighbor == start || parents.contains_key(&neighbor) {
                    continue;
                }
                let _ = parents.insert(neighbor, current);
                if neighbor == end {
                    let mut path = vec![end];
                    let mut cursor = end;
                    while let Some(&parent) = parents.get(&cursor) {
                        path.push(parent);
                        cursor = parent;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(neighbor);
            }
        }

        None
    }

    /// Get a reference to a node's data.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn node(&self, id: NodeId) -> GraphResult<&N> {
        self.nodes
            .get(id.0)
            .map(|node| &node.data)
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Get all node IDs in insertion order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).collect()
    }

    /// Get the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get the data attached to the edge `from -> to`.
    #[must_use]
    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<&E> {
        self.edges
            .iter()
            .find(|edge| edge.from == from && edge.to == to)
            .map(|edge| &edge.data)
    }

    /// Get all direct dependencies (incoming edges) of a node, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn dependencies(&self, id: NodeId) -> GraphResult<&[NodeId]> {
        self.nodes
            .get(id.0)
            .map(|node| node.incoming.as_slice())
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Get all direct dependents (outgoing edges) of a node, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn dependents(&self, id: NodeId) -> GraphResult<&[NodeId]> {
        self.nodes
            .get(id.0)
            .map(|node| node.outgoing.as_slice())
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Perform topological sort using Kahn's algorithm.
    ///
    /// Returns nodes in dependency order (dependencies before dependents).
    /// Among nodes that are ready at the same time, the one inserted first
    /// comes first, so the order is stable across runs.
    #[must_use]
    pub fn topological_sort(&self) -> Vec<NodeId> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.incoming.len()).collect();

        // Ready nodes, smallest id first
        let mut ready: BTreeSet<NodeId> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(index, _)| NodeId(index))
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(node_id) = ready.pop_first() {
            result.push(node_id);

            for &neighbor in &self.nodes[node_id.0].outgoing {
                let degree = &mut in_degree[neighbor.0];
                *degree -= 1;
                if *degree == 0 {
                    let _ = ready.insert(neighbor);
                }
            }
        }

        result
    }
}
