//! Greedy checkpoint selection
//!
//! Grows the cache set one internal node per round. Each round tentatively
//! caches every remaining feasible candidate, prices the tree with the
//! marginal evaluator, and commits the best one. Selection stops as soon as no
//! feasible candidate lowers the cost.
//!
//! Budget model: simultaneous. All committed checkpoints coexist, checked per
//! root-to-leaf path by [`feasibility::within_budget`].

pub mod feasibility;

use tracing::{debug, info};

use crate::cost::CostEvaluator;
use crate::space::{Cost, Storage};
use crate::state::DecisionState;
use crate::tree::{post_order, ExecutionTree, NodeId};
use crate::PlanError;

/// Ranking rule for candidates within a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreedyObjective {
    /// Lowest resulting cost.
    TotalCost,
    /// Lowest resulting cost per unit of the candidate's storage.
    ///
    /// A candidate with zero storage takes nothing from the budget and ranks
    /// ahead of every candidate that does; two of them compare by cost.
    CostDensity,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    node: NodeId,
    cost: Cost,
    storage: Storage,
}

impl GreedyObjective {
    /// Whether `candidate` beats `incumbent`; ties keep the incumbent.
    fn prefers(self, candidate: &Candidate, incumbent: &Candidate) -> bool {
        match self {
            GreedyObjective::TotalCost => candidate.cost < incumbent.cost,
            GreedyObjective::CostDensity => match (candidate.storage, incumbent.storage) {
                (0, 0) => candidate.cost < incumbent.cost,
                (0, _) => true,
                (_, 0) => false,
                // cost / storage < best_cost / best_storage
                (s, b) => {
                    u128::from(candidate.cost) * u128::from(b)
                        < u128::from(incumbent.cost) * u128::from(s)
                }
            },
        }
    }
}

/// Outcome of a greedy selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreedySelection {
    /// Total replay cost (force charge) of the final cache set.
    pub cost: Cost,
    /// Committed nodes in commit order.
    pub selected: Vec<NodeId>,
    /// Rounds executed, including the final round that found nothing.
    pub rounds: usize,
    /// Tentative evaluations performed.
    pub evaluations: usize,
}

/// Greedy selector parameterized by its ranking rule
#[derive(Debug, Clone, Copy)]
pub struct GreedySelector {
    objective: GreedyObjective,
}

impl GreedySelector {
    /// Create a selector.
    pub fn new(objective: GreedyObjective) -> Self {
        Self { objective }
    }

    /// Ranking rule.
    pub fn objective(&self) -> GreedyObjective {
        self.objective
    }

    /// Run selection, leaving the chosen set in `state`'s cached flags.
    pub fn select(
        &self,
        tree: &ExecutionTree,
        state: &mut DecisionState,
    ) -> Result<GreedySelection, PlanError> {
        state.ensure_pristine(tree)?;

        let order = post_order(tree, tree.root());
        let marginal = CostEvaluator::marginal();
        let mut current = marginal.evaluate_in(tree, state, &order);

        let mut pool: Vec<NodeId> = tree.ids().filter(|&id| !tree.is_leaf(id)).collect();
        let mut selected = Vec::new();
        let mut rounds = 0;
        let mut evaluations = 0;

        loop {
            rounds += 1;
            let mut best: Option<Candidate> = None;

            for &node in &pool {
                state.set_cached(node, true);
                if feasibility::within_budget(tree, state, node) {
                    let cost = marginal.evaluate_in(tree, state, &order);
                    evaluations += 1;
                    if cost < current {
                        let candidate = Candidate {
                            node,
                            cost,
                            storage: tree.node(node).storage_cost(),
                        };
                        let better = best
                            .map_or(true, |incumbent| self.objective.prefers(&candidate, &incumbent));
                        if better {
                            best = Some(candidate);
                        }
                    }
                }
                state.set_cached(node, false);
            }

            let Some(choice) = best else {
                break;
            };

            state.set_cached(choice.node, true);
            pool.retain(|&id| id != choice.node);
            debug!(
                round = rounds,
                node = %choice.node,
                marginal_cost = choice.cost,
                saved = current - choice.cost,
                "greedy commit"
            );
            current = choice.cost;
            selected.push(choice.node);
        }

        let cost = CostEvaluator::force().evaluate_in(tree, state, &order);
        info!(
            objective = ?self.objective,
            cost,
            cached = selected.len(),
            rounds,
            "greedy selection complete"
        );

        Ok(GreedySelection {
            cost,
            selected,
            rounds,
            evaluations,
        })
    }
}
