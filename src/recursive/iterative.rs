//! Explicit-stack planner traversal
//!
//! Visits every reachable sub-problem without recursion, so plan depth is
//! bounded by heap rather than call stack. A sub-problem is combined only
//! after all of its children are stored; a child entry that is still
//! missing at that point is an error, never a zero cost.

use tracing::trace;

use super::memo::{MemoKey, ScriptTable};
use super::recurrence;
use crate::space::Cost;
use crate::tree::{ExecutionTree, NodeId};
use crate::PlanError;

#[derive(Debug, Clone, Copy)]
enum Task {
    Visit(NodeId, MemoKey),
    Combine(NodeId, MemoKey),
}

/// Solve `(node, key)` and every sub-problem below it into `table`.
pub(crate) fn plan(
    tree: &ExecutionTree,
    table: &mut ScriptTable,
    node: NodeId,
    key: MemoKey,
) -> Result<Cost, PlanError> {
    let mut stack = vec![Task::Visit(node, key)];
    let mut combined = 0usize;

    while let Some(task) = stack.pop() {
        match task {
            Task::Visit(id, k) => {
                if table.contains(id, k) {
                    continue;
                }
                stack.push(Task::Combine(id, k));
                for (child, child_key) in recurrence::subproblems(tree, id, k).into_iter().rev() {
                    if !table.contains(child, child_key) {
                        stack.push(Task::Visit(child, child_key));
                    }
                }
            }
            Task::Combine(id, k) => {
                if table.contains(id, k) {
                    continue;
                }
                let entry = recurrence::resolve(tree, id, k, |child, child_key| {
                    table.cost(child, child_key).ok_or(PlanError::MissingSubplan {
                        node: child,
                        budget: child_key.budget,
                        carried: child_key.carried,
                    })
                })?;
                trace!(node = %id, budget = k.budget, carried = k.carried, cost = entry.cost, "combined");
                table.insert(id, k, entry);
                combined += 1;
            }
        }
    }

    trace!(combined, "iterative plan finished");
    table.cost(node, key).ok_or(PlanError::MissingSubplan {
        node,
        budget: key.budget,
        carried: key.carried,
    })
}
