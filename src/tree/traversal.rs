//! Stack-based traversals
//!
//! Recursion depth would equal tree height, so every walk here keeps an
//! explicit stack instead. Child order is always insertion order.

use super::{ExecutionTree, NodeId};

/// Nodes of the subtree at `start`, parents before children.
pub fn pre_order(tree: &ExecutionTree, start: NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        order.push(id);
        stack.extend(tree.children(id).iter().rev().copied());
    }
    order
}

/// Nodes of the subtree at `start`, children before parents.
pub fn post_order(tree: &ExecutionTree, start: NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack = vec![(start, false)];
    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        stack.push((id, true));
        stack.extend(tree.children(id).iter().rev().map(|&child| (child, false)));
    }
    order
}

/// Iterator over root-to-leaf paths in depth-first order
///
/// Each frame stores the node and the index of the next child to descend
/// into, so the stack doubles as the current path.
#[derive(Debug)]
pub struct LeafPaths<'a> {
    tree: &'a ExecutionTree,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> LeafPaths<'a> {
    /// Start enumeration at the tree root.
    pub fn new(tree: &'a ExecutionTree) -> Self {
        Self {
            tree,
            stack: vec![(tree.root(), 0)],
        }
    }
}

impl Iterator for LeafPaths<'_> {
    type Item = Vec<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (id, next_child) = *self.stack.last()?;
            let children = self.tree.children(id);

            if children.is_empty() {
                let path = self.stack.iter().map(|&(node, _)| node).collect();
                self.stack.pop();
                return Some(path);
            }

            if next_child < children.len() {
                if let Some(frame) = self.stack.last_mut() {
                    frame.1 += 1;
                }
                self.stack.push((children[next_child], 0));
            } else {
                self.stack.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{shapes, NodeCosts};

    fn labels(tree: &ExecutionTree, ids: &[NodeId]) -> String {
        ids.iter().map(|&id| tree.node(id).label()).collect()
    }

    #[test]
    fn test_orders_on_fixed_tree() {
        let tree = shapes::fixed(|_| NodeCosts::unit());
        assert_eq!(labels(&tree, &pre_order(&tree, tree.root())), "ABCDEFGHJKLMINO");
        assert_eq!(labels(&tree, &post_order(&tree, tree.root())), "CEGLKMJHONIFDBA");
    }

    #[test]
    fn test_leaf_paths() {
        let tree = shapes::fixed(|_| NodeCosts::unit());
        let paths: Vec<String> = tree
            .paths_to_leaves()
            .map(|path| labels(&tree, &path))
            .collect();
        assert_eq!(
            paths,
            ["ABC", "ABDE", "ABDFG", "ABDFHJKL", "ABDFHJM", "ABDFINO"]
        );
    }

    #[test]
    fn test_single_node_tree() {
        let mut builder = crate::tree::TreeBuilder::new();
        builder.node("R", NodeCosts::unit());
        let tree = builder.build().unwrap();
        let paths: Vec<_> = tree.paths_to_leaves().collect();
        assert_eq!(paths, vec![vec![tree.root()]]);
        assert_eq!(post_order(&tree, tree.root()), vec![tree.root()]);
    }
}
