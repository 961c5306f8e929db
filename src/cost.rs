//! Cost evaluation
//!
//! Prices one depth-first replay of the whole tree under a fixed set of
//! checkpoints. A node that is not cached must be re-derived every time the
//! traversal returns to it, so its price scales with its fan-out `y`, the
//! number of leaf-reaching traversals that pass through it:
//!
//! ```text
//! y(leaf) = 1
//! y(v)    = Σ_children [ 1 + (y(c) − 1)·(1 − x(c)) ]
//! ```
//!
//! The force charge is `r·(1 + (y − 1)·(1 − x))` per node and gives the total
//! replay time; the marginal charge `r·(y − 1)·(1 − x)` leaves out the first
//! execution of every node. The two differ by the constant `Σ r`.

use crate::recursive::{MemoKey, RecursivePlanner};
use crate::space::Cost;
use crate::state::{DecisionMode, DecisionState};
use crate::tree::{post_order, ExecutionTree, NodeId};
use crate::PlanError;

/// Which executions a node is charged for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// Every execution, including the first.
    Force,
    /// Only re-executions.
    Marginal,
}

/// Fan-out based cost evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostEvaluator {
    charge: Charge,
    unit_recompute: bool,
}

impl CostEvaluator {
    /// Total replay time.
    pub const fn force() -> Self {
        Self {
            charge: Charge::Force,
            unit_recompute: false,
        }
    }

    /// Re-execution time only; used to rank greedy candidates.
    pub const fn marginal() -> Self {
        Self {
            charge: Charge::Marginal,
            unit_recompute: false,
        }
    }

    /// Number of executions (force charge with every recompute cost set to 1).
    pub const fn unit_force() -> Self {
        Self {
            charge: Charge::Force,
            unit_recompute: true,
        }
    }

    /// Charge mode.
    pub fn charge(&self) -> Charge {
        self.charge
    }

    /// Evaluate the whole tree, recording fan-outs in `state`.
    pub fn evaluate(&self, tree: &ExecutionTree, state: &mut DecisionState) -> Cost {
        let order = post_order(tree, tree.root());
        self.evaluate_in(tree, state, &order)
    }

    /// Evaluate with a precomputed post-order of the whole tree.
    pub fn evaluate_in(
        &self,
        tree: &ExecutionTree,
        state: &mut DecisionState,
        order: &[NodeId],
    ) -> Cost {
        let mut total: Cost = 0;

        for &id in order {
            let fanout = if tree.is_leaf(id) {
                1
            } else {
                tree.children(id)
                    .iter()
                    .map(|&child| {
                        if state.is_cached(child) {
                            1
                        } else {
                            state.fanout(child)
                        }
                    })
                    .sum()
            };
            state.set_fanout(id, fanout);

            let recompute = if self.unit_recompute {
                1
            } else {
                tree.node(id).recompute_cost()
            };
            let executions = match (self.charge, state.is_cached(id)) {
                (Charge::Force, true) => 1,
                (Charge::Force, false) => fanout,
                (Charge::Marginal, true) => 0,
                (Charge::Marginal, false) => fanout - 1,
            };
            total += recompute * executions;
        }

        total
    }
}

/// Total replay cost of whatever decision `state` currently carries.
///
/// A production schedule or the counts of an online pass are priced as
/// `Σ recompute × productions`; a script
/// table by its root entry at the tree's budget (planned on demand if the
/// entry is absent); a cache set by the force evaluator.
pub fn total_cost(tree: &ExecutionTree, state: &mut DecisionState) -> Result<Cost, PlanError> {
    state.ensure_matches(tree)?;
    match state.mode() {
        DecisionMode::Baseline => Ok(state
            .schedule()
            .map(|schedule| schedule.cost(tree))
            .unwrap_or_default()),
        DecisionMode::Online => Ok(state.online_cost(tree).unwrap_or_default()),
        DecisionMode::Script => {
            let key = MemoKey::root(tree.cache_budget());
            match state.scripts().cost(tree.root(), key) {
                Some(cost) => Ok(cost),
                None => RecursivePlanner::default().plan_at(
                    tree,
                    state.scripts_mut(),
                    tree.root(),
                    key,
                ),
            }
        }
        DecisionMode::CacheSet => Ok(CostEvaluator::force().evaluate(tree, state)),
    }
}
