//! # Checkpoint planning for branching replays
//!
//! A branching computation (a notebook edited into several divergent
//! versions, say) is recorded as a tree: every node carries the time needed
//! to derive its state from its parent and the space needed to persist that
//! state. Reproducing every leaf by depth-first replay re-derives an internal
//! node each time the traversal comes back to it unless the node was
//! checkpointed. This crate decides which nodes to checkpoint under a storage
//! budget.
//!
//! ## Algorithms
//!
//! 1. **Greedy** (two rankings): grow a set of simultaneously cached nodes,
//!    budget checked per root-to-leaf path.
//! 2. **Recursive**: exact tree DP where the budget is threaded down one
//!    checkpoint chain; emits a decision script and a replay plan.
//! 3. **Online**: one pass over the versions with an LFU runtime cache.
//!
//! Greedy and recursive interpret the budget differently (simultaneous vs
//! threaded); their costs are comparable, their feasibility is not.
//!
//! ## Usage Example
//!
//! ```
//! use chex::{Algorithm, Planner, PlannerConfig};
//! use chex::tree::{shapes, NodeCosts};
//!
//! let mut tree = shapes::star(NodeCosts::new(5, 3), &[NodeCosts::new(2, 1); 2]);
//! tree.set_cache_budget(3);
//!
//! let mut planner = Planner::new(&tree, PlannerConfig::default());
//! let outcome = planner.run(&tree, Algorithm::Recursive)?;
//! assert_eq!(outcome.cost, 9);
//! # Ok::<(), chex::PlanError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod algorithm; // Closed algorithm enum and outcomes
pub mod baseline; // Exact-solver boundary
pub mod cost; // Fan-out cost evaluator
pub mod greedy; // Simultaneous-budget heuristics
pub mod online; // LFU streaming approximation
pub mod recursive; // Threaded-budget tree DP
pub mod space; // Integral units and storage tracking
pub mod state; // Per-run decision state
pub mod tree; // Execution tree arena

pub use algorithm::{Algorithm, Decision, PlanOutcome};
pub use baseline::{BaselineError, ExactSolver, ProductionSchedule};
pub use cost::{total_cost, CostEvaluator};
pub use recursive::{MemoKey, RecursivePlanner, ReplayAction, ReplayPlan, ScriptStep, Traversal};
pub use space::{Cost, Quantization, Storage};
pub use state::{DecisionMode, DecisionState};
pub use tree::{ExecutionTree, NodeCosts, NodeId, TreeBuilder, TreeError};

use thiserror::Error;
use tracing::info;

/// Configuration of a planning session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Reuse stored sub-problem results in the recursive traversal.
    pub memoize: bool,

    /// Recursive planner traversal.
    pub traversal: Traversal,

    /// Tree height above which `Traversal::Auto` avoids call-stack recursion.
    pub recursion_limit: usize,

    /// Re-derive every script entry after planning.
    pub verify_scripts: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            memoize: true,
            traversal: Traversal::Auto,
            recursion_limit: 256,
            verify_scripts: false,
        }
    }
}

impl PlannerConfig {
    /// Enable or disable memo lookups.
    pub fn with_memoize(mut self, enabled: bool) -> Self {
        self.memoize = enabled;
        self
    }

    /// Select the recursive planner traversal.
    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    /// Set the height limit for automatic traversal selection.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Enable script verification.
    pub fn with_verify_scripts(mut self, enabled: bool) -> Self {
        self.verify_scripts = enabled;
        self
    }
}

/// Errors that can occur while planning
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// Tree construction or lookup failed
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Imported baseline schedule is malformed
    #[error(transparent)]
    Baseline(#[from] BaselineError),

    /// An algorithm was started on a state that still holds decisions
    #[error("decision state holds a {mode:?} decision; reset before running")]
    StateNotReset {
        /// Populated mode
        mode: DecisionMode,
    },

    /// A baseline schedule was imported over another decision
    #[error("decision state already holds a {mode:?} decision")]
    StateOccupied {
        /// Populated mode
        mode: DecisionMode,
    },

    /// Decision state was sized for another tree
    #[error("decision state covers {found} nodes, tree has {expected}")]
    StateMismatch {
        /// Nodes in the tree
        expected: usize,
        /// Nodes in the state
        found: usize,
    },

    /// A sub-problem needed by a combine or replay step was never solved
    #[error("no script for {node} at budget {budget}, carried {carried}")]
    MissingSubplan {
        /// Node of the missing entry
        node: NodeId,
        /// Budget of the missing entry
        budget: Storage,
        /// Carried redo cost of the missing entry
        carried: Cost,
    },

    /// A stored script does not explain its stored cost
    #[error(
        "script for {node} at budget {budget}, carried {carried} stores {stored} \
         but its steps cost {recomputed}"
    )]
    InconsistentScript {
        /// Node of the entry
        node: NodeId,
        /// Budget of the entry
        budget: Storage,
        /// Carried redo cost of the entry
        carried: Cost,
        /// Cost stored in the entry
        stored: Cost,
        /// Cost re-derived from its steps
        recomputed: Cost,
    },

    /// A script shares a checkpoint its budget cannot hold
    #[error("script shares {node} at budget {budget}, which cannot hold it")]
    InfeasibleStep {
        /// Node whose checkpoint is shared
        node: NodeId,
        /// Budget at that point
        budget: Storage,
    },

    /// Algorithm name not recognised
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// Planning session over one tree
///
/// Owns the decision state and resets it before every run, so algorithms can
/// be run back to back.
#[derive(Debug)]
pub struct Planner {
    config: PlannerConfig,
    state: DecisionState,
}

impl Planner {
    /// Create a session sized for `tree`.
    pub fn new(tree: &ExecutionTree, config: PlannerConfig) -> Self {
        Self {
            config,
            state: DecisionState::new(tree),
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Decision state of the last run.
    pub fn state(&self) -> &DecisionState {
        &self.state
    }

    /// Reset the state and run one algorithm.
    pub fn run(
        &mut self,
        tree: &ExecutionTree,
        algorithm: Algorithm,
    ) -> Result<PlanOutcome, PlanError> {
        self.state.reset_for(tree);
        let outcome = algorithm.run(tree, &mut self.state, &self.config)?;
        info!(
            algorithm = %algorithm,
            budget = tree.cache_budget(),
            cost = outcome.cost,
            "run complete"
        );
        Ok(outcome)
    }

    /// Run several algorithms in order, returning `(algorithm, cost)` pairs.
    pub fn compare(
        &mut self,
        tree: &ExecutionTree,
        algorithms: &[Algorithm],
    ) -> Result<Vec<(Algorithm, Cost)>, PlanError> {
        algorithms
            .iter()
            .map(|&algorithm| Ok((algorithm, self.run(tree, algorithm)?.cost)))
            .collect()
    }

    /// Cost of whatever decision the state currently holds.
    pub fn cost(&mut self, tree: &ExecutionTree) -> Result<Cost, PlanError> {
        total_cost(tree, &mut self.state)
    }

    /// Clear the state.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}
