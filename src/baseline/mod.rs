//! Exact baseline boundary
//!
//! The exact solver is an external mixed-integer program. This module only
//! holds what the rest of the crate needs from it: the discrete time horizon
//! it enumerates over, the production schedule it returns, and validation of
//! that schedule before it is priced.
//!
//! A schedule stores one bit per node per time step, `1..=horizon`; bit 0 is
//! reserved and must stay clear.

use bitvec::prelude::*;
use thiserror::Error;

use crate::cost::CostEvaluator;
use crate::space::Cost;
use crate::state::DecisionState;
use crate::tree::{ExecutionTree, NodeId};

/// Errors raised while importing a production schedule
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BaselineError {
    /// Schedule sized for a different tree.
    #[error("schedule covers {found} nodes, tree has {expected}")]
    NodeCountMismatch {
        /// Nodes in the tree
        expected: usize,
        /// Rows in the schedule
        found: usize,
    },

    /// A row has the wrong number of time steps.
    #[error("node {node} has {found} time bits, expected {expected}")]
    HorizonMismatch {
        /// Offending node
        node: NodeId,
        /// `horizon + 1`
        expected: usize,
        /// Actual length
        found: usize,
    },

    /// Time step 0 precedes every production.
    #[error("node {0} produced at time 0")]
    ProducedAtZero(NodeId),

    /// Every node is needed at least once.
    #[error("node {0} is never produced")]
    NeverProduced(NodeId),

    /// One production per time step.
    #[error("time step {step} produces {count} nodes")]
    ConcurrentProduction {
        /// Offending step
        step: usize,
        /// Nodes produced there
        count: usize,
    },

    /// A node cannot appear before its parent exists.
    #[error("node {node} first produced at {step}, before its parent {parent}")]
    ProducedBeforeParent {
        /// Offending node
        node: NodeId,
        /// Its parent
        parent: NodeId,
        /// First production of the node
        step: usize,
    },

    /// `Σ recompute × productions` does not fit a [`Cost`].
    #[error("schedule cost exceeds the unit range")]
    CostOverflow,
}

/// Number of node executions of a full replay without any checkpoint.
///
/// Upper bound on the time steps an optimal schedule needs.
pub fn time_horizon(tree: &ExecutionTree) -> usize {
    let mut state = DecisionState::new(tree);
    CostEvaluator::unit_force().evaluate(tree, &mut state) as usize
}

/// Per-node production bitmap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionSchedule {
    horizon: usize,
    produced: Vec<BitVec>,
}

impl ProductionSchedule {
    /// All-clear schedule for `nodes` nodes over `1..=horizon`.
    pub fn new(nodes: usize, horizon: usize) -> Self {
        Self {
            horizon,
            produced: vec![bitvec![0; horizon + 1]; nodes],
        }
    }

    /// Build from raw rows, one per node.
    pub fn from_rows(horizon: usize, produced: Vec<BitVec>) -> Self {
        Self { horizon, produced }
    }

    /// Last time step.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Rows in the schedule.
    pub fn len(&self) -> usize {
        self.produced.len()
    }

    /// Whether the schedule has no rows.
    pub fn is_empty(&self) -> bool {
        self.produced.is_empty()
    }

    /// Record a production of `node` at `step`.
    pub fn mark(&mut self, node: NodeId, step: usize) {
        self.produced[node.index()].set(step, true);
    }

    /// Production bits of `node`.
    pub fn produced_at(&self, node: NodeId) -> &BitSlice {
        &self.produced[node.index()]
    }

    /// Number of times `node` is produced.
    pub fn productions(&self, node: NodeId) -> usize {
        self.produced[node.index()].count_ones()
    }

    /// `Σ recompute × productions`.
    ///
    /// Saturates for schedules that would fail validation with
    /// [`BaselineError::CostOverflow`].
    pub fn cost(&self, tree: &ExecutionTree) -> Cost {
        self.checked_cost(tree).unwrap_or(Cost::MAX)
    }

    fn checked_cost(&self, tree: &ExecutionTree) -> Option<Cost> {
        tree.nodes()
            .iter()
            .zip(&self.produced)
            .try_fold(0 as Cost, |total, (node, bits)| {
                let productions = Cost::try_from(bits.count_ones()).ok()?;
                total.checked_add(node.recompute_cost().checked_mul(productions)?)
            })
    }

    /// Check the structural constraints the exact model imposes.
    pub fn validate(&self, tree: &ExecutionTree) -> Result<(), BaselineError> {
        if self.produced.len() != tree.len() {
            return Err(BaselineError::NodeCountMismatch {
                expected: tree.len(),
                found: self.produced.len(),
            });
        }

        let width = self.horizon + 1;
        for id in tree.ids() {
            let bits = self.produced_at(id);
            if bits.len() != width {
                return Err(BaselineError::HorizonMismatch {
                    node: id,
                    expected: width,
                    found: bits.len(),
                });
            }
            if bits[0] {
                return Err(BaselineError::ProducedAtZero(id));
            }
            if bits.not_any() {
                return Err(BaselineError::NeverProduced(id));
            }
        }

        for step in 1..width {
            let count = self.produced.iter().filter(|bits| bits[step]).count();
            if count > 1 {
                return Err(BaselineError::ConcurrentProduction { step, count });
            }
        }

        for id in tree.ids() {
            let Some(parent) = tree.parent(id) else {
                continue;
            };
            let first = self.produced_at(id).first_one();
            let parent_first = self.produced_at(parent).first_one();
            if let (Some(step), Some(parent_step)) = (first, parent_first) {
                if step <= parent_step {
                    return Err(BaselineError::ProducedBeforeParent {
                        node: id,
                        parent,
                        step,
                    });
                }
            }
        }

        self.checked_cost(tree)
            .map(|_| ())
            .ok_or(BaselineError::CostOverflow)
    }
}

/// External exact solver
///
/// Implementations return a schedule over `1..=horizon`; the caller validates
/// it before importing.
pub trait ExactSolver {
    /// Solve `tree` at its cache budget.
    fn solve(&self, tree: &ExecutionTree, horizon: usize)
        -> Result<ProductionSchedule, BaselineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::total_cost;
    use crate::tree::{shapes, NodeCosts};

    /// Re-derives the root before every leaf of a star, as a replay
    /// without checkpoints does.
    struct NoCheckpoints;

    impl ExactSolver for NoCheckpoints {
        fn solve(
            &self,
            tree: &ExecutionTree,
            horizon: usize,
        ) -> Result<ProductionSchedule, BaselineError> {
            let mut schedule = ProductionSchedule::new(tree.len(), horizon);
            let root = tree.root();
            let mut step = 0;
            for &leaf in tree.children(root) {
                step += 1;
                schedule.mark(root, step);
                step += 1;
                schedule.mark(leaf, step);
            }
            Ok(schedule)
        }
    }

    #[test]
    fn test_horizon_counts_unit_executions() {
        let tree = shapes::star(NodeCosts::new(5, 3), &[NodeCosts::new(2, 1); 2]);
        assert_eq!(time_horizon(&tree), 4);
        assert_eq!(time_horizon(&shapes::fixed(shapes::unit_costs)), 34);
    }

    #[test]
    fn test_schedule_imported_and_priced() {
        let tree = shapes::star(NodeCosts::new(5, 3), &[NodeCosts::new(2, 1); 2]);
        let horizon = time_horizon(&tree);
        let schedule = NoCheckpoints.solve(&tree, horizon).unwrap();
        assert_eq!(schedule.productions(tree.root()), 2);
        assert_eq!(schedule.cost(&tree), 14);

        let mut state = DecisionState::new(&tree);
        state.import_schedule(&tree, schedule).unwrap();
        assert_eq!(total_cost(&tree, &mut state).unwrap(), 14);
        assert_eq!(
            state.produced_at(tree.root()).map(|bits| bits.count_ones()),
            Some(2)
        );
    }

    #[test]
    fn test_validation_failures() {
        let tree = shapes::star(NodeCosts::unit(), &[NodeCosts::unit(); 2]);
        let root = tree.root();
        let [l0, l1] = [tree.children(root)[0], tree.children(root)[1]];

        let short = ProductionSchedule::new(2, 4);
        assert!(matches!(
            short.validate(&tree),
            Err(BaselineError::NodeCountMismatch { .. })
        ));

        let mut at_zero = ProductionSchedule::new(3, 4);
        at_zero.mark(root, 0);
        assert_eq!(
            at_zero.validate(&tree),
            Err(BaselineError::ProducedAtZero(root))
        );

        let mut missing = ProductionSchedule::new(3, 4);
        missing.mark(root, 1);
        missing.mark(l0, 2);
        assert_eq!(missing.validate(&tree), Err(BaselineError::NeverProduced(l1)));

        let mut crowded = ProductionSchedule::new(3, 4);
        crowded.mark(root, 1);
        crowded.mark(l0, 2);
        crowded.mark(l1, 2);
        assert_eq!(
            crowded.validate(&tree),
            Err(BaselineError::ConcurrentProduction { step: 2, count: 2 })
        );

        let mut early = ProductionSchedule::new(3, 4);
        early.mark(l0, 1);
        early.mark(root, 2);
        early.mark(l1, 3);
        assert!(matches!(
            early.validate(&tree),
            Err(BaselineError::ProducedBeforeParent { step: 1, .. })
        ));

        let ragged = ProductionSchedule::from_rows(
            4,
            vec![bitvec![0, 1, 0, 0, 0], bitvec![0, 0, 1, 0], bitvec![0, 0, 0, 1, 0]],
        );
        assert!(matches!(
            ragged.validate(&tree),
            Err(BaselineError::HorizonMismatch { found: 4, .. })
        ));
    }
}
