//! Tree construction
//!
//! Nodes are created detached and then linked. Linking enforces single
//! ownership: a node may gain a parent only once and never under one of its
//! own descendants.

use super::{ExecutionTree, Node, NodeCosts, NodeId, TreeError};
use crate::space::Quantization;

/// Incremental builder for [`ExecutionTree`]
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
}

impl TreeBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes created so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node has been created yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a detached node.
    pub fn node(&mut self, label: impl Into<String>, costs: NodeCosts) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            label: label.into(),
            costs,
            parent: None,
            children: Vec::new(),
            depth: 0,
        });
        id
    }

    /// Create a detached node from measured seconds and bytes.
    pub fn measured_node(
        &mut self,
        label: impl Into<String>,
        seconds: f64,
        bytes: f64,
        quantization: &Quantization,
    ) -> Result<NodeId, TreeError> {
        let costs = NodeCosts::new(quantization.cost(seconds)?, quantization.storage(bytes)?);
        Ok(self.node(label, costs))
    }

    /// Create a node and attach it under `parent`.
    pub fn child(
        &mut self,
        parent: NodeId,
        label: impl Into<String>,
        costs: NodeCosts,
    ) -> Result<NodeId, TreeError> {
        self.check(parent)?;
        let id = self.node(label, costs);
        self.link(parent, id)?;
        Ok(id)
    }

    /// Attach an existing node under `parent`.
    pub fn link(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check(parent)?;
        self.check(child)?;

        if let Some(existing) = self.nodes[child.0].parent {
            return Err(TreeError::DuplicateParent {
                child,
                existing,
                parent,
            });
        }

        // Walk up from the prospective parent; meeting `child` means a cycle.
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(TreeError::Cycle { parent, child });
            }
            cursor = self.nodes[id.0].parent;
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Validate and freeze the tree.
    pub fn build(mut self) -> Result<ExecutionTree, TreeError> {
        let roots: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.parent.is_none())
            .map(|n| n.id)
            .collect();

        let root = match roots.as_slice() {
            [] => return Err(TreeError::Empty),
            [root] => *root,
            _ => return Err(TreeError::MultipleRoots(roots)),
        };

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let depth = self.nodes[id.0].depth;
            for i in 0..self.nodes[id.0].children.len() {
                let child = self.nodes[id.0].children[i];
                self.nodes[child.0].depth = depth + 1;
                stack.push(child);
            }
        }

        let tree = ExecutionTree::from_parts(self.nodes, root);
        tree.check_bounds()?;
        Ok(tree)
    }

    /// Assemble a tree from `(label, parent index, costs)` rows where every
    /// parent index precedes its child. Row 0 is the root.
    pub(crate) fn from_parent_table(rows: Vec<(String, Option<usize>, NodeCosts)>) -> ExecutionTree {
        let mut nodes: Vec<Node> = Vec::with_capacity(rows.len());
        for (index, (label, parent, costs)) in rows.into_iter().enumerate() {
            debug_assert!(parent.map_or(index == 0, |p| p < index));
            let id = NodeId(index);
            let parent = parent.map(NodeId);
            let depth = match parent {
                Some(p) => {
                    nodes[p.0].children.push(id);
                    nodes[p.0].depth + 1
                }
                None => 0,
            };
            nodes.push(Node {
                id,
                label,
                costs,
                parent,
                children: Vec::new(),
                depth,
            });
        }
        ExecutionTree::from_parts(nodes, NodeId(0))
    }

    fn check(&self, id: NodeId) -> Result<(), TreeError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(TreeError::UnknownNode(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_parent_rejected() {
        let mut builder = TreeBuilder::new();
        let a = builder.node("A", NodeCosts::unit());
        let b = builder.node("B", NodeCosts::unit());
        let c = builder.node("C", NodeCosts::unit());
        builder.link(a, c).unwrap();

        let err = builder.link(b, c).unwrap_err();
        assert_eq!(
            err,
            TreeError::DuplicateParent {
                child: c,
                existing: a,
                parent: b
            }
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let mut builder = TreeBuilder::new();
        let a = builder.node("A", NodeCosts::unit());
        let b = builder.child(a, "B", NodeCosts::unit()).unwrap();
        assert_eq!(
            builder.link(b, a).unwrap_err(),
            TreeError::Cycle { parent: b, child: a }
        );
        assert!(matches!(
            builder.link(a, a),
            Err(TreeError::DuplicateParent { .. }) | Err(TreeError::Cycle { .. })
        ));
    }

    #[test]
    fn test_build_requires_single_root() {
        assert_eq!(TreeBuilder::new().build().unwrap_err(), TreeError::Empty);

        let mut builder = TreeBuilder::new();
        let a = builder.node("A", NodeCosts::unit());
        let b = builder.node("B", NodeCosts::unit());
        assert_eq!(
            builder.build().unwrap_err(),
            TreeError::MultipleRoots(vec![a, b])
        );
    }

    #[test]
    fn test_build_rejects_overflowing_costs() {
        // The root alone fits, but it is replayed once per leaf.
        let mut builder = TreeBuilder::new();
        let root = builder.node("R", NodeCosts::new(u64::MAX, 1));
        builder.child(root, "L0", NodeCosts::unit()).unwrap();
        builder.child(root, "L1", NodeCosts::unit()).unwrap();
        assert_eq!(builder.build().unwrap_err(), TreeError::CostOverflow);

        let mut builder = TreeBuilder::new();
        let root = builder.node("R", NodeCosts::new(1, u64::MAX));
        builder.child(root, "L", NodeCosts::new(1, 1)).unwrap();
        assert_eq!(builder.build().unwrap_err(), TreeError::CostOverflow);

        let mut builder = TreeBuilder::new();
        builder.node("R", NodeCosts::new(u64::MAX, u64::MAX));
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_depths_assigned() {
        let mut builder = TreeBuilder::new();
        let a = builder.node("A", NodeCosts::unit());
        let b = builder.child(a, "B", NodeCosts::unit()).unwrap();
        let c = builder.child(b, "C", NodeCosts::unit()).unwrap();
        let tree = builder.build().unwrap();

        assert_eq!(tree.root(), a);
        assert_eq!(tree.node(c).depth(), 2);
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn test_measured_node_validates() {
        let q = Quantization::default();
        let mut builder = TreeBuilder::new();
        assert!(builder.measured_node("A", 1.5, 10.0, &q).is_ok());
        assert!(builder.measured_node("B", -1.0, 10.0, &q).is_err());
        assert!(builder.measured_node("C", 1.0, -10.0, &q).is_err());
    }
}
