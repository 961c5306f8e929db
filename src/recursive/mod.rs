//! Recursive checkpoint planner
//!
//! Exact tree dynamic program under the threaded budget model: a node that
//! is checkpointed consumes its storage from the budget seen by the children
//! that share it, and the budget is handed back once those children are done.
//! Only one evolving checkpoint chain exists at a time.
//!
//! ## Recurrence
//!
//! A sub-problem is `(node, budget, carried)` where `carried` is the time
//! needed to re-derive the node's parent from the last checkpoint. With
//! `rederive = r + carried`:
//!
//! - leaf: `r`
//! - `budget < s`: `r + Σ f(c, budget, rederive) + (k − 1)·rederive`
//! - otherwise each child is priced both through a checkpoint of the node
//!   `f(c, budget − s, 0)` and by redoing `f(c, budget, rederive)`; children
//!   whose savings stay within `rederive` share the checkpoint, visited first
//!   in ascending savings order, the rest are redone with `rederive` charged
//!   between consecutive ones. When every child shares, the one with the
//!   largest savings is redone instead.
//!
//! The resulting scripts live in a [`ScriptTable`]; [`ReplayPlan`] turns them
//! into concrete replay actions.

mod iterative;
mod memo;
mod recurrence;
mod replay;

pub use memo::{MemoKey, ScriptEntry, ScriptStep, ScriptTable};
pub use replay::{ReplayAction, ReplayPlan, ScriptStats};

use std::fmt;

use tracing::{debug, info};

use crate::space::Cost;
use crate::state::DecisionState;
use crate::tree::{ExecutionTree, NodeId};
use crate::{PlanError, PlannerConfig};

/// How the planner walks sub-problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    /// Call-stack recursion; honours the memoize switch.
    Recursive,
    /// Explicit task stack; always memoized.
    Iterative,
    /// Recursive up to the configured height limit, iterative above it.
    #[default]
    Auto,
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Traversal::Recursive => "recursive",
            Traversal::Iterative => "iterative",
            Traversal::Auto => "auto",
        };
        f.write_str(name)
    }
}

/// Result of planning a whole tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursivePlan {
    /// Total replay cost at the tree's budget.
    pub cost: Cost,
    /// Root script: the decision script handed to a replay engine.
    pub script: Vec<ScriptStep>,
    /// Flattened replay actions.
    pub replay: ReplayPlan,
}

impl RecursivePlan {
    /// Replay statistics.
    pub fn stats(&self) -> ScriptStats {
        self.replay.stats()
    }
}

/// Tree DP planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursivePlanner {
    memoize: bool,
    traversal: Traversal,
    recursion_limit: usize,
    verify: bool,
}

impl Default for RecursivePlanner {
    fn default() -> Self {
        Self::from_config(&PlannerConfig::default())
    }
}

impl RecursivePlanner {
    /// Planner with the recursive settings of `config`.
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self {
            memoize: config.memoize,
            traversal: config.traversal,
            recursion_limit: config.recursion_limit,
            verify: config.verify_scripts,
        }
    }

    /// Concrete traversal used for `tree`.
    pub fn traversal_for(&self, tree: &ExecutionTree) -> Traversal {
        match self.traversal {
            Traversal::Auto if tree.height() > self.recursion_limit => Traversal::Iterative,
            Traversal::Auto => Traversal::Recursive,
            other => other,
        }
    }

    /// Plan the whole tree at its cache budget into `state`'s script table.
    pub fn plan(
        &self,
        tree: &ExecutionTree,
        state: &mut DecisionState,
    ) -> Result<RecursivePlan, PlanError> {
        state.ensure_pristine(tree)?;

        let key = MemoKey::root(tree.cache_budget());
        let cost = self.plan_at(tree, state.scripts_mut(), tree.root(), key)?;
        let table = state.scripts();

        if self.verify {
            let checked = table.verify(tree)?;
            debug!(checked, "script table verified");
        }

        let script = table
            .script(tree.root(), key)
            .map(<[ScriptStep]>::to_vec)
            .unwrap_or_default();
        let replay = ReplayPlan::build(tree, table, key)?;
        let stats = replay.stats();

        info!(
            budget = key.budget,
            cost,
            traversal = %self.traversal_for(tree),
            entries = stats.entries,
            checkpoints = stats.checkpoints,
            restores = stats.restores,
            footprint_bytes = stats.footprint_bytes,
            "recursive plan complete"
        );

        Ok(RecursivePlan {
            cost,
            script,
            replay,
        })
    }

    /// Solve one sub-problem into `table`, returning its cost.
    pub fn plan_at(
        &self,
        tree: &ExecutionTree,
        table: &mut ScriptTable,
        node: NodeId,
        key: MemoKey,
    ) -> Result<Cost, PlanError> {
        tree.get(node)?;
        match self.traversal_for(tree) {
            Traversal::Iterative => iterative::plan(tree, table, node, key),
            _ => self.descend(tree, table, node, key),
        }
    }

    fn descend(
        &self,
        tree: &ExecutionTree,
        table: &mut ScriptTable,
        node: NodeId,
        key: MemoKey,
    ) -> Result<Cost, PlanError> {
        if self.memoize {
            if let Some(cost) = table.cost(node, key) {
                return Ok(cost);
            }
        }

        let entry = recurrence::resolve(tree, node, key, |child, child_key| {
            self.descend(tree, table, child, child_key)
        })?;
        let cost = entry.cost;
        table.insert(node, key, entry);
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostEvaluator;
    use crate::tree::{shapes, NodeCosts};

    fn planner(traversal: Traversal) -> RecursivePlanner {
        RecursivePlanner::from_config(&PlannerConfig::default().with_traversal(traversal))
    }

    #[test]
    fn test_star_budget_threshold() {
        let mut tree = shapes::star(NodeCosts::new(5, 3), &[NodeCosts::new(2, 1); 2]);
        for (budget, expected) in [(0, 14), (2, 14), (3, 9), (10, 9)] {
            tree.set_cache_budget(budget);
            let mut state = DecisionState::new(&tree);
            let plan = planner(Traversal::Recursive).plan(&tree, &mut state).unwrap();
            assert_eq!(plan.cost, expected, "budget {budget}");
            assert_eq!(plan.replay.execution_cost(&tree), expected);
        }
    }

    #[test]
    fn test_traversals_agree_on_fixed_tree() {
        let mut tree = shapes::fixed(shapes::depth_scaled);
        for budget in 0..12 {
            tree.set_cache_budget(budget);
            let mut rec = DecisionState::new(&tree);
            let mut it = DecisionState::new(&tree);
            let a = planner(Traversal::Recursive).plan(&tree, &mut rec).unwrap();
            let b = planner(Traversal::Iterative).plan(&tree, &mut it).unwrap();
            assert_eq!(a.cost, b.cost);
            assert_eq!(a.script, b.script);
            assert_eq!(a.replay.actions(), b.replay.actions());
        }
    }

    #[test]
    fn test_memo_switch_keeps_costs() {
        let mut tree = shapes::kary(3, 3, shapes::depth_scaled);
        tree.set_cache_budget(4);

        let mut memo = DecisionState::new(&tree);
        let mut plain = DecisionState::new(&tree);
        let with = planner(Traversal::Recursive).plan(&tree, &mut memo).unwrap();
        let without = RecursivePlanner::from_config(
            &PlannerConfig::default()
                .with_traversal(Traversal::Recursive)
                .with_memoize(false),
        )
        .plan(&tree, &mut plain)
        .unwrap();

        assert_eq!(with.cost, without.cost);
        assert_eq!(memo.scripts(), plain.scripts());
    }

    #[test]
    fn test_auto_switches_on_height() {
        let tree = shapes::chain(&[NodeCosts::unit(); 10]);
        let low = RecursivePlanner::from_config(&PlannerConfig::default().with_recursion_limit(4));
        let high = RecursivePlanner::from_config(&PlannerConfig::default().with_recursion_limit(64));
        assert_eq!(low.traversal_for(&tree), Traversal::Iterative);
        assert_eq!(high.traversal_for(&tree), Traversal::Recursive);
    }

    #[test]
    fn test_verified_plan() {
        let mut tree = shapes::fixed(shapes::depth_scaled);
        tree.set_cache_budget(6);
        let mut state = DecisionState::new(&tree);
        let config = PlannerConfig::default().with_verify_scripts(true);
        let plan = RecursivePlanner::from_config(&config).plan(&tree, &mut state).unwrap();
        let uncached = CostEvaluator::force().evaluate(&tree, &mut DecisionState::new(&tree));
        assert_eq!(uncached, 123);
        assert!(plan.cost <= uncached);
        assert!(!plan.script.is_empty());
        assert!(plan.stats().entries > 0);
    }
}
