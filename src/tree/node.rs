//! Arena node representation
//!
//! Nodes live in a flat arena owned by [`ExecutionTree`](super::ExecutionTree)
//! and refer to each other through [`NodeId`] indices, so decision state can be
//! held in parallel vectors instead of on the nodes themselves.

use std::fmt;

use crate::space::{Cost, Storage};

/// Index of a node inside its tree's arena.
///
/// Ids are dense and assigned in creation order, which also fixes the
/// deterministic iteration order used by every algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Immutable cost attributes of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeCosts {
    /// Time to derive this node's state from its parent's state.
    pub recompute: Cost,

    /// Space needed to persist this node's state as a checkpoint.
    pub storage: Storage,
}

impl NodeCosts {
    /// Create costs from integral units.
    pub fn new(recompute: Cost, storage: Storage) -> Self {
        Self { recompute, storage }
    }

    /// Unit recompute cost and unit storage.
    pub fn unit() -> Self {
        Self::new(1, 1)
    }
}

/// Single node record in the arena
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) label: String,
    pub(crate) costs: NodeCosts,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) depth: usize,
}

impl Node {
    /// Arena id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Display label supplied by the builder.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Cost attributes.
    pub fn costs(&self) -> NodeCosts {
        self.costs
    }

    /// Recompute cost shortcut.
    #[inline]
    pub fn recompute_cost(&self) -> Cost {
        self.costs.recompute
    }

    /// Storage cost shortcut.
    #[inline]
    pub fn storage_cost(&self) -> Storage {
        self.costs.storage
    }

    /// Parent id (`None` for the root).
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Leaves are the deliverable versions.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Distance from the root (root has depth 0).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (r={}, s={})",
            self.label, self.costs.recompute, self.costs.storage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId(7).to_string(), "n7");
        assert_eq!(NodeId(7).index(), 7);
    }

    #[test]
    fn test_node_display_includes_costs() {
        let node = Node {
            id: NodeId(0),
            label: "A".to_string(),
            costs: NodeCosts::new(3, 4),
            parent: None,
            children: Vec::new(),
            depth: 0,
        };
        assert!(node.is_leaf());
        assert_eq!(node.to_string(), "A (r=3, s=4)");
    }
}
