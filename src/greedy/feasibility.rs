//! Simultaneous-budget feasibility
//!
//! Under the greedy model every checkpoint coexists for the whole replay, so
//! the storage of all cached nodes on any single root-to-leaf path must fit
//! in the cache budget at once.

use crate::space::Storage;
use crate::state::DecisionState;
use crate::tree::{ExecutionTree, NodeId};

/// Whether every root-to-leaf path through `node` keeps its cached storage
/// within the tree's budget under the current assignment.
///
/// Only paths through `node` are inspected; callers that grow the cache set
/// one node at a time keep all other paths feasible by induction.
pub fn within_budget(tree: &ExecutionTree, state: &DecisionState, node: NodeId) -> bool {
    let above: u128 = tree
        .path_to(node)
        .into_iter()
        .map(|id| cached_storage(tree, state, id))
        .sum();
    let below = max_load_below(tree, state, node);
    above + below <= u128::from(tree.cache_budget())
}

/// Largest cached storage found on any root-to-leaf path.
pub fn max_path_load(tree: &ExecutionTree, state: &DecisionState) -> Storage {
    let root = tree.root();
    let load = cached_storage(tree, state, root) + max_load_below(tree, state, root);
    Storage::try_from(load).unwrap_or(Storage::MAX)
}

/// Heaviest cached storage strictly below `node` along one downward path.
fn max_load_below(tree: &ExecutionTree, state: &DecisionState, node: NodeId) -> u128 {
    let mut best = 0;
    let mut stack: Vec<(NodeId, u128)> = tree.children(node).iter().map(|&c| (c, 0)).collect();

    while let Some((id, load)) = stack.pop() {
        let load = load + cached_storage(tree, state, id);
        if tree.is_leaf(id) {
            best = best.max(load);
        } else {
            stack.extend(tree.children(id).iter().map(|&c| (c, load)));
        }
    }

    best
}

#[inline]
fn cached_storage(tree: &ExecutionTree, state: &DecisionState, id: NodeId) -> u128 {
    if state.is_cached(id) {
        u128::from(tree.node(id).storage_cost())
    } else {
        0
    }
}
