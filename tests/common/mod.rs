#![allow(dead_code)]

use chex::tree::{shapes, NodeCosts};
use chex::{ExecutionTree, Storage, TreeBuilder};
use proptest::prelude::*;
use proptest::sample::Index;
use std::ops::Range;

/// Random tree with up to `max_nodes` nodes. Each new node picks an
/// existing node as parent, so every shape from chain to star can appear.
pub fn arb_tree(max_nodes: usize) -> impl Strategy<Value = ExecutionTree> {
    arb_tree_in(max_nodes, 0..6)
}

/// Random tree whose storage costs are drawn from `storage`.
pub fn arb_tree_in(max_nodes: usize, storage: Range<u64>) -> impl Strategy<Value = ExecutionTree> {
    let costs = (0u64..10, storage);
    (
        costs.clone(),
        proptest::collection::vec((any::<Index>(), costs), 0..max_nodes.saturating_sub(1)),
    )
        .prop_map(|((r, s), rows)| {
            let mut builder = TreeBuilder::new();
            let mut ids = vec![builder.node("v0", NodeCosts::new(r, s))];
            for (i, (pick, (r, s))) in rows.into_iter().enumerate() {
                let parent = ids[pick.index(ids.len())];
                let id = builder
                    .child(parent, format!("v{}", i + 1), NodeCosts::new(r, s))
                    .expect("parent exists");
                ids.push(id);
            }
            builder.build().expect("single root")
        })
}

/// Random tree paired with a budget in `0..=max_budget`.
pub fn arb_tree_with_budget(
    max_nodes: usize,
    max_budget: Storage,
) -> impl Strategy<Value = ExecutionTree> {
    (arb_tree(max_nodes), 0..=max_budget).prop_map(|(mut tree, budget)| {
        tree.set_cache_budget(budget);
        tree
    })
}

/// Root costing 5 (storage 3) over two leaves costing 2 (storage 1).
pub fn reference_star(budget: Storage) -> ExecutionTree {
    let mut tree = shapes::star(NodeCosts::new(5, 3), &[NodeCosts::new(2, 1); 2]);
    tree.set_cache_budget(budget);
    tree
}

/// Path R → A → B with recompute costs 3, 4, 5.
pub fn reference_chain(budget: Storage) -> ExecutionTree {
    let mut tree = shapes::chain(&[
        NodeCosts::new(3, 1),
        NodeCosts::new(4, 1),
        NodeCosts::new(5, 1),
    ]);
    tree.set_cache_budget(budget);
    tree
}
