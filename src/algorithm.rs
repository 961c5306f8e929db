//! Closed set of decision algorithms
//!
//! Every variant runs through the same `run(tree, state, config)` entry point
//! and reports its cost next to the decision it produced.

use std::fmt;
use std::str::FromStr;

use crate::cost::CostEvaluator;
use crate::greedy::{GreedyObjective, GreedySelector};
use crate::online::{OnlineApproximator, OnlineReport};
use crate::recursive::{RecursivePlan, RecursivePlanner};
use crate::space::Cost;
use crate::state::DecisionState;
use crate::tree::{ExecutionTree, NodeId};
use crate::{PlanError, PlannerConfig};

/// Decision algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Nothing cached.
    Uncached,
    /// Greedy, lowest total cost per round.
    GreedyTime,
    /// Greedy, largest saving per unit of storage per round.
    GreedyDensity,
    /// Exact tree DP under the threaded budget.
    Recursive,
    /// Single streaming pass with an LFU cache.
    Online,
}

impl Algorithm {
    /// Every algorithm, in report order.
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Uncached,
        Algorithm::GreedyTime,
        Algorithm::GreedyDensity,
        Algorithm::Recursive,
        Algorithm::Online,
    ];

    /// Short name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Uncached => "uncached",
            Algorithm::GreedyTime => "greedy-time",
            Algorithm::GreedyDensity => "greedy-density",
            Algorithm::Recursive => "recursive",
            Algorithm::Online => "online",
        }
    }

    /// One-line description.
    pub fn description(&self) -> &'static str {
        match self {
            Algorithm::Uncached => "replay every version from the root, no checkpoints",
            Algorithm::GreedyTime => "greedy checkpoints minimising total replay time",
            Algorithm::GreedyDensity => "greedy checkpoints minimising replay cost per storage unit",
            Algorithm::Recursive => "exact tree DP with a threaded checkpoint budget",
            Algorithm::Online => "one pass over versions with an LFU runtime cache",
        }
    }

    /// Run on `tree`, writing decisions into `state`.
    ///
    /// `state` must be pristine; see [`crate::Planner`] for a session that
    /// resets it.
    pub fn run(
        &self,
        tree: &ExecutionTree,
        state: &mut DecisionState,
        config: &PlannerConfig,
    ) -> Result<PlanOutcome, PlanError> {
        let (cost, decision) = match self {
            Algorithm::Uncached => {
                state.ensure_pristine(tree)?;
                (CostEvaluator::force().evaluate(tree, state), Decision::None)
            }
            Algorithm::GreedyTime | Algorithm::GreedyDensity => {
                let objective = if *self == Algorithm::GreedyTime {
                    GreedyObjective::TotalCost
                } else {
                    GreedyObjective::CostDensity
                };
                let selection = GreedySelector::new(objective).select(tree, state)?;
                (selection.cost, Decision::CacheSet(selection.selected))
            }
            Algorithm::Recursive => {
                let plan = RecursivePlanner::from_config(config).plan(tree, state)?;
                (plan.cost, Decision::Script(plan))
            }
            Algorithm::Online => {
                let report = OnlineApproximator::new().run(tree, state)?;
                (report.cost, Decision::Online(report))
            }
        };

        Ok(PlanOutcome {
            algorithm: *self,
            cost,
            decision,
        })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == wanted)
            .ok_or_else(|| PlanError::UnknownAlgorithm(s.to_string()))
    }
}

/// What an algorithm decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to persist.
    None,
    /// Simultaneously cached nodes, in commit order.
    CacheSet(Vec<NodeId>),
    /// Decision script and its replay.
    Script(RecursivePlan),
    /// Statistics of the simulated runtime cache.
    Online(OnlineReport),
}

/// Cost and decision of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Algorithm that ran.
    pub algorithm: Algorithm,
    /// Total replay time.
    pub cost: Cost,
    /// Produced decision.
    pub decision: Decision,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{shapes, NodeCosts};

    #[test]
    fn test_names_round_trip() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.name().parse::<Algorithm>().unwrap(), algorithm);
        }
        assert_eq!("Greedy_Time".parse::<Algorithm>().unwrap(), Algorithm::GreedyTime);
        assert!(matches!(
            "annealing".parse::<Algorithm>(),
            Err(PlanError::UnknownAlgorithm(name)) if name == "annealing"
        ));
    }

    #[test]
    fn test_every_algorithm_prices_the_star() {
        let mut tree = shapes::star(NodeCosts::new(5, 3), &[NodeCosts::new(2, 1); 2]);
        tree.set_cache_budget(3);
        let config = PlannerConfig::default();

        for algorithm in Algorithm::ALL {
            let mut state = DecisionState::new(&tree);
            let outcome = algorithm.run(&tree, &mut state, &config).unwrap();
            let expected = if algorithm == Algorithm::Uncached { 14 } else { 9 };
            assert_eq!(outcome.cost, expected, "{algorithm}");
        }
    }

    #[test]
    fn test_dirty_state_rejected() {
        let tree = shapes::star(NodeCosts::new(5, 3), &[NodeCosts::new(2, 1); 2]);
        let mut state = DecisionState::new(&tree);
        state.set_cached(tree.root(), true);
        for algorithm in Algorithm::ALL {
            assert!(matches!(
                algorithm.run(&tree, &mut state, &PlannerConfig::default()),
                Err(PlanError::StateNotReset { .. })
            ));
        }
    }
}
