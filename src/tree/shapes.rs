//! Synthetic tree shapes
//!
//! Node-cost factories receive the depth of the node being created.

use super::{ExecutionTree, NodeCosts, TreeBuilder};

/// Unit recompute and storage cost at every depth.
pub fn unit_costs(_depth: usize) -> NodeCosts {
    NodeCosts::unit()
}

/// Recompute and storage cost both `depth + 1`.
pub fn depth_scaled(depth: usize) -> NodeCosts {
    let units = depth as u64 + 1;
    NodeCosts::new(units, units)
}

/// The 15-node reference tree with six leaves.
///
/// ```text
/// A ─ B ┬ C
///       └ D ┬ E
///           └ F ┬ G
///               ├ H ─ J ┬ K ─ L
///               │       └ M
///               └ I ─ N ─ O
/// ```
pub fn fixed(costs: impl Fn(usize) -> NodeCosts) -> ExecutionTree {
    const LAYOUT: [(&str, Option<usize>, usize); 15] = [
        ("A", None, 0),
        ("B", Some(0), 1),
        ("C", Some(1), 2),
        ("D", Some(1), 2),
        ("E", Some(3), 3),
        ("F", Some(3), 3),
        ("G", Some(5), 4),
        ("H", Some(5), 4),
        ("I", Some(5), 4),
        ("J", Some(7), 5),
        ("K", Some(9), 6),
        ("L", Some(10), 7),
        ("M", Some(9), 6),
        ("N", Some(8), 5),
        ("O", Some(13), 6),
    ];

    let rows = LAYOUT
        .iter()
        .map(|&(label, parent, depth)| (label.to_string(), parent, costs(depth)))
        .collect();
    TreeBuilder::from_parent_table(rows)
}

/// Perfect `k`-ary tree of the given height, numbered breadth-first.
pub fn kary(k: usize, height: usize, costs: impl Fn(usize) -> NodeCosts) -> ExecutionTree {
    let mut rows = vec![("N0".to_string(), None, costs(0))];
    let mut level = vec![0usize];

    for depth in 1..=height {
        let mut next = Vec::with_capacity(level.len() * k);
        for &parent in &level {
            for _ in 0..k {
                let index = rows.len();
                rows.push((format!("N{index}"), Some(parent), costs(depth)));
                next.push(index);
            }
        }
        level = next;
    }

    TreeBuilder::from_parent_table(rows)
}

/// Single path whose nodes carry the given costs, root first.
///
/// An empty `costs` slice yields a lone zero-cost root.
pub fn chain(costs: &[NodeCosts]) -> ExecutionTree {
    let rows = costs
        .iter()
        .enumerate()
        .map(|(i, &c)| (format!("P{i}"), i.checked_sub(1), c))
        .collect::<Vec<_>>();
    if rows.is_empty() {
        return TreeBuilder::from_parent_table(vec![("P0".to_string(), None, NodeCosts::default())]);
    }
    TreeBuilder::from_parent_table(rows)
}

/// Root with one leaf child per entry of `leaves`.
pub fn star(root: NodeCosts, leaves: &[NodeCosts]) -> ExecutionTree {
    let mut rows = vec![("R".to_string(), None, root)];
    rows.extend(
        leaves
            .iter()
            .enumerate()
            .map(|(i, &c)| (format!("L{i}"), Some(0), c)),
    );
    TreeBuilder::from_parent_table(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kary_sizes() {
        let tree = kary(3, 3, unit_costs);
        assert_eq!(tree.len(), 40);
        assert_eq!(tree.leaves().count(), 27);
        assert_eq!(tree.height(), 3);

        let tree = kary(2, 3, depth_scaled);
        assert_eq!(tree.len(), 15);
        assert_eq!(tree.node(tree.find("N14").unwrap()).recompute_cost(), 4);
    }

    #[test]
    fn test_kary_degenerate_arity() {
        assert_eq!(kary(1, 4, unit_costs).len(), 5);
        assert_eq!(kary(0, 4, unit_costs).len(), 1);
    }

    #[test]
    fn test_fixed_depths_match_layout() {
        let tree = fixed(depth_scaled);
        for node in tree.nodes() {
            assert_eq!(node.recompute_cost(), node.depth() as u64 + 1);
        }
    }

    #[test]
    fn test_chain_and_star() {
        let tree = chain(&[NodeCosts::new(3, 1), NodeCosts::new(4, 1), NodeCosts::new(5, 1)]);
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.leaves().count(), 1);

        let tree = star(NodeCosts::new(5, 1), &[NodeCosts::new(2, 1); 2]);
        assert_eq!(tree.children(tree.root()).len(), 2);
    }

    #[test]
    fn test_empty_inputs_still_have_a_root() {
        let tree = chain(&[]);
        assert_eq!(tree.len(), 1);
        assert!(tree.is_leaf(tree.root()));
        assert_eq!(tree.node(tree.root()).costs(), NodeCosts::default());

        let tree = star(NodeCosts::new(5, 1), &[]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.leaves().collect::<Vec<_>>(), vec![tree.root()]);
    }
}
