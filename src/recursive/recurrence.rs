//! The planner recurrence
//!
//! Shared by the recursive and the explicit-stack traversal. Both supply a
//! `solve` callback for child sub-problems; the recursive traversal descends
//! on demand, the iterative one only reads entries it has already stored.

use super::memo::{MemoKey, ScriptEntry, ScriptStep};
use crate::space::Cost;
use crate::tree::{ExecutionTree, NodeId};
use crate::PlanError;

/// Child sub-problems `(node, key)` depends on, in child order.
pub(crate) fn subproblems(
    tree: &ExecutionTree,
    node: NodeId,
    key: MemoKey,
) -> Vec<(NodeId, MemoKey)> {
    let costs = tree.node(node).costs();
    let redo = key.redo(costs.recompute);
    let children = tree.children(node);

    if key.budget < costs.storage {
        children.iter().map(|&child| (child, redo)).collect()
    } else {
        let shared = key.shared(costs.storage);
        children
            .iter()
            .flat_map(|&child| [(child, shared), (child, redo)])
            .collect()
    }
}

/// Solve `(node, key)` given child costs.
pub(crate) fn resolve<F>(
    tree: &ExecutionTree,
    node: NodeId,
    key: MemoKey,
    mut solve: F,
) -> Result<ScriptEntry, PlanError>
where
    F: FnMut(NodeId, MemoKey) -> Result<Cost, PlanError>,
{
    let costs = tree.node(node).costs();
    let children = tree.children(node);
    if children.is_empty() {
        return Ok(ScriptEntry {
            cost: costs.recompute,
            steps: Vec::new(),
        });
    }

    let rederive = costs.recompute + key.carried;
    let redo_key = key.redo(costs.recompute);

    if key.budget < costs.storage {
        let mut cost = costs.recompute;
        let mut steps = Vec::with_capacity(2 * children.len() - 1);
        for (i, &child) in children.iter().enumerate() {
            if i > 0 {
                cost += rederive;
                steps.push(ScriptStep::redo(node));
            }
            cost += solve(child, redo_key)?;
            steps.push(ScriptStep::redo(child));
        }
        return Ok(ScriptEntry { cost, steps });
    }

    let shared_key = key.shared(costs.storage);
    let mut shared: Vec<(NodeId, Cost, i128)> = Vec::new();
    let mut redo: Vec<(NodeId, Cost)> = Vec::new();

    for &child in children {
        let shared_cost = solve(child, shared_key)?;
        let redo_cost = solve(child, redo_key)?;
        let savings = i128::from(shared_cost) - i128::from(redo_cost);
        if savings <= i128::from(rederive) {
            shared.push((child, shared_cost, savings));
        } else {
            redo.push((child, redo_cost));
        }
    }

    shared.sort_by_key(|&(_, _, savings)| savings);
    if redo.is_empty() {
        // Nothing returns to this node after the last child; visit the
        // child with the largest savings without holding the checkpoint.
        if let Some((child, _, _)) = shared.pop() {
            redo.push((child, solve(child, redo_key)?));
        }
    }

    let mut cost = costs.recompute;
    let mut steps = Vec::with_capacity(shared.len() + 2 * redo.len());
    for &(child, shared_cost, _) in &shared {
        cost += shared_cost;
        steps.push(ScriptStep::shared(child));
    }
    for (i, &(child, redo_cost)) in redo.iter().enumerate() {
        if i > 0 {
            cost += rederive;
            steps.push(ScriptStep::redo(node));
        }
        cost += redo_cost;
        steps.push(ScriptStep::redo(child));
    }

    Ok(ScriptEntry { cost, steps })
}

/// Recompute the cost described by `steps` at `(node, key)`.
pub(crate) fn explain<F>(
    tree: &ExecutionTree,
    node: NodeId,
    key: MemoKey,
    steps: &[ScriptStep],
    mut lookup: F,
) -> Result<Cost, PlanError>
where
    F: FnMut(NodeId, MemoKey) -> Result<Cost, PlanError>,
{
    let costs = tree.node(node).costs();
    let mut cost = costs.recompute;

    for step in steps {
        if step.node == node {
            cost += costs.recompute + key.carried;
        } else if step.shared {
            if key.budget < costs.storage {
                return Err(PlanError::InfeasibleStep {
                    node,
                    budget: key.budget,
                });
            }
            cost += lookup(step.node, key.shared(costs.storage))?;
        } else {
            cost += lookup(step.node, key.redo(costs.recompute))?;
        }
    }

    Ok(cost)
}
