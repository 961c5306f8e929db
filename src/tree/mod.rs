//! Execution tree
//!
//! A rooted tree of computation states: each edge is one re-executable step,
//! each leaf a deliverable version. The tree is an immutable arena; per-run
//! decisions live in [`DecisionState`](crate::state::DecisionState).

mod builder;
mod node;
pub mod shapes;
mod traversal;

pub use builder::TreeBuilder;
pub use node::{Node, NodeCosts, NodeId};
pub use traversal::{post_order, pre_order, LeafPaths};

use thiserror::Error;

use crate::space::{Cost, Quantization, Storage};

/// Errors raised while building or configuring a tree
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    /// A measured cost was negative.
    #[error("negative {field}: {value}")]
    NegativeMeasurement {
        /// Which attribute was measured
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// A measured cost was NaN or infinite.
    #[error("non-finite {field}: {value}")]
    NonFiniteMeasurement {
        /// Which attribute was measured
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// Cache budget below zero.
    #[error("negative cache budget: {0}")]
    NegativeBudget(f64),

    /// Quantization unit must be positive and finite.
    #[error("invalid {field}: {value}")]
    InvalidQuantization {
        /// Which unit was invalid
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// Node id not present in the arena.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A node was linked under a second parent.
    #[error("node {child} already owned by {existing}, cannot attach to {parent}")]
    DuplicateParent {
        /// Node being linked
        child: NodeId,
        /// Its current parent
        existing: NodeId,
        /// Rejected new parent
        parent: NodeId,
    },

    /// Linking would close a cycle.
    #[error("linking {child} under {parent} would create a cycle")]
    Cycle {
        /// Prospective parent
        parent: NodeId,
        /// Prospective child
        child: NodeId,
    },

    /// Tree has no nodes.
    #[error("tree has no nodes")]
    Empty,

    /// More than one parentless node.
    #[error("multiple roots: {0:?}")]
    MultipleRoots(Vec<NodeId>),

    /// A quantized measurement does not fit the integral unit type.
    #[error("{field} of {value} exceeds the unit range")]
    MeasurementOverflow {
        /// Which attribute was measured
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// Uncached replay cost, execution count or total storage exceeds `u64`.
    #[error("tree costs exceed the unit range")]
    CostOverflow,
}

/// Summary statistics of a tree
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TreeStats {
    /// Number of nodes
    pub nodes: usize,
    /// Number of leaves (deliverable versions)
    pub leaves: usize,
    /// Longest root-to-leaf edge count
    pub height: usize,
    /// Largest child count
    pub max_fanout: usize,
    /// Sum of recompute costs
    pub total_recompute: Cost,
    /// Sum of storage costs
    pub total_storage: Storage,
}

impl TreeStats {
    /// One-line report.
    pub fn report(&self) -> String {
        format!(
            "nodes={} leaves={} height={} max_fanout={} recompute={} storage={}",
            self.nodes,
            self.leaves,
            self.height,
            self.max_fanout,
            self.total_recompute,
            self.total_storage
        )
    }
}

/// Rooted execution tree with a cache budget
#[derive(Debug, Clone)]
pub struct ExecutionTree {
    nodes: Vec<Node>,
    root: NodeId,
    cache_budget: Storage,
    bounded: bool,
}

impl ExecutionTree {
    pub(crate) fn from_parts(nodes: Vec<Node>, root: NodeId) -> Self {
        let mut tree = Self {
            nodes,
            root,
            cache_budget: 0,
            bounded: false,
        };
        tree.bounded = tree.replay_bounds().is_some();
        tree
    }

    /// Uncached replay cost, unit execution count and total storage, or
    /// `None` if any of them overflows.
    ///
    /// Every cost the planners compute is at most the uncached replay cost,
    /// and every resident or per-path storage sum at most the total storage.
    fn replay_bounds(&self) -> Option<(Cost, Cost, Storage)> {
        let mut leaves = vec![0u64; self.nodes.len()];
        let mut cost: Cost = 0;
        let mut executions: Cost = 0;
        for id in post_order(self, self.root) {
            let below = if self.is_leaf(id) {
                1
            } else {
                self.children(id)
                    .iter()
                    .try_fold(0u64, |acc, child| acc.checked_add(leaves[child.0]))?
            };
            leaves[id.0] = below;
            cost = cost.checked_add(self.nodes[id.0].recompute_cost().checked_mul(below)?)?;
            executions = executions.checked_add(below)?;
        }
        let storage = self
            .nodes
            .iter()
            .try_fold(0 as Storage, |acc, node| acc.checked_add(node.storage_cost()))?;
        Some((cost, executions, storage))
    }

    /// Fail if replaying this tree could overflow the unit types.
    pub fn check_bounds(&self) -> Result<(), TreeError> {
        if self.bounded {
            Ok(())
        } else {
            Err(TreeError::CostOverflow)
        }
    }

    /// Root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a built tree; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node record by id.
    ///
    /// Ids handed out by the builder for this tree are always valid.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Checked lookup for ids of unknown provenance.
    pub fn get(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(id.0).ok_or(TreeError::UnknownNode(id))
    }

    /// All node ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|node| node.id)
    }

    /// All node records in creation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Children of `id` in insertion order.
    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Parent of `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Whether `id` is a leaf.
    #[inline]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id.0].is_leaf()
    }

    /// Leaves in creation order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|n| n.is_leaf()).map(|n| n.id)
    }

    /// Look up a node by label.
    pub fn find(&self, label: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.label == label).map(|n| n.id)
    }

    /// Tree height in edges.
    pub fn height(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Storage quota for checkpoints.
    pub fn cache_budget(&self) -> Storage {
        self.cache_budget
    }

    /// Assign the storage quota.
    pub fn set_cache_budget(&mut self, budget: Storage) {
        self.cache_budget = budget;
    }

    /// Assign the storage quota from a measured byte count.
    pub fn set_measured_budget(
        &mut self,
        bytes: f64,
        quantization: &Quantization,
    ) -> Result<(), TreeError> {
        self.cache_budget = quantization.budget(bytes)?;
        Ok(())
    }

    /// Ids on the path from the root down to `id`, inclusive.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut cursor = self.nodes[id.0].parent;
        while let Some(parent) = cursor {
            path.push(parent);
            cursor = self.nodes[parent.0].parent;
        }
        path.reverse();
        path
    }

    /// Every root-to-leaf path in depth-first child order.
    pub fn paths_to_leaves(&self) -> LeafPaths<'_> {
        LeafPaths::new(self)
    }

    /// Summary statistics.
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            nodes: self.nodes.len(),
            leaves: self.nodes.iter().filter(|n| n.is_leaf()).count(),
            height: self.height(),
            max_fanout: self.nodes.iter().map(|n| n.children.len()).max().unwrap_or(0),
            total_recompute: self.nodes.iter().map(|n| n.costs.recompute).sum(),
            total_storage: self.nodes.iter().map(|n| n.costs.storage).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_tree_stats() {
        let tree = shapes::fixed(|_| NodeCosts::unit());
        let stats = tree.stats();
        assert_eq!(stats.nodes, 15);
        assert_eq!(stats.leaves, 6);
        assert_eq!(stats.height, 7);
        assert_eq!(stats.max_fanout, 3);
        assert_eq!(stats.total_recompute, 15);
    }

    #[test]
    fn test_path_to_starts_at_root() {
        let tree = shapes::fixed(|_| NodeCosts::unit());
        let l = tree.find("L").unwrap();
        let labels: Vec<_> = tree
            .path_to(l)
            .into_iter()
            .map(|id| tree.node(id).label().to_string())
            .collect();
        assert_eq!(labels, ["A", "B", "D", "F", "H", "J", "K", "L"]);
    }

    #[test]
    fn test_measured_budget() {
        let mut tree = shapes::fixed(|_| NodeCosts::unit());
        let q = Quantization::new(1.0, 10.0).unwrap();
        tree.set_measured_budget(35.0, &q).unwrap();
        assert_eq!(tree.cache_budget(), 3);
        assert!(tree.set_measured_budget(-1.0, &q).is_err());
    }
}
