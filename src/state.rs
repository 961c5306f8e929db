//! Per-run decision state
//!
//! The tree itself never changes after construction. Everything an algorithm
//! decides is written here, in vectors indexed by [`NodeId`], so one tree can
//! be shared by many runs and test cases.
//!
//! At most one decision mode is populated at a time: a cache set (greedy
//! family or an imported cache assignment), a script table (recursive
//! planner), per-node production counts (online pass), or a production
//! schedule (exact baseline).

use bitvec::slice::BitSlice;

use crate::baseline::ProductionSchedule;
use crate::recursive::ScriptTable;
use crate::space::Cost;
use crate::tree::{ExecutionTree, NodeId};
use crate::PlanError;

/// Which kind of decision the state currently carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionMode {
    /// `cached` flags (possibly all false)
    CacheSet,
    /// Recursive planner scripts
    Script,
    /// Production counts of an online pass
    Online,
    /// Externally computed production schedule
    Baseline,
}

/// Explicit per-run context for one tree
#[derive(Debug, Clone)]
pub struct DecisionState {
    cached: Vec<bool>,
    fanout: Vec<u64>,
    scripts: ScriptTable,
    schedule: Option<ProductionSchedule>,
    productions: Option<Vec<u64>>,
}

impl DecisionState {
    /// Fresh state sized for `tree`.
    pub fn new(tree: &ExecutionTree) -> Self {
        Self {
            cached: vec![false; tree.len()],
            fanout: vec![0; tree.len()],
            scripts: ScriptTable::with_nodes(tree.len()),
            schedule: None,
            productions: None,
        }
    }

    /// Number of nodes this state covers.
    pub fn len(&self) -> usize {
        self.cached.len()
    }

    /// Whether the state covers no nodes.
    pub fn is_empty(&self) -> bool {
        self.cached.is_empty()
    }

    /// Clear every decision; costs and structure live in the tree and are untouched.
    pub fn reset(&mut self) {
        self.cached.fill(false);
        self.fanout.fill(0);
        self.scripts.clear();
        self.schedule = None;
        self.productions = None;
    }

    /// Clear and resize for a (possibly different) tree.
    pub fn reset_for(&mut self, tree: &ExecutionTree) {
        self.reset();
        self.cached.resize(tree.len(), false);
        self.fanout.resize(tree.len(), 0);
        self.scripts.resize(tree.len());
    }

    /// Populated decision mode.
    pub fn mode(&self) -> DecisionMode {
        if self.schedule.is_some() {
            DecisionMode::Baseline
        } else if self.productions.is_some() {
            DecisionMode::Online
        } else if !self.scripts.is_empty() {
            DecisionMode::Script
        } else {
            DecisionMode::CacheSet
        }
    }

    /// No decision of any kind recorded.
    pub fn is_pristine(&self) -> bool {
        self.schedule.is_none()
            && self.productions.is_none()
            && self.scripts.is_empty()
            && !self.cached.contains(&true)
    }

    /// Fail unless the state is pristine and sized for `tree`.
    pub fn ensure_pristine(&self, tree: &ExecutionTree) -> Result<(), PlanError> {
        self.ensure_matches(tree)?;
        if self.is_pristine() {
            Ok(())
        } else {
            Err(PlanError::StateNotReset { mode: self.mode() })
        }
    }

    /// Fail unless the state is sized for `tree` and the tree's costs fit
    /// the unit types.
    pub fn ensure_matches(&self, tree: &ExecutionTree) -> Result<(), PlanError> {
        tree.check_bounds()?;
        if self.len() == tree.len() {
            Ok(())
        } else {
            Err(PlanError::StateMismatch {
                expected: tree.len(),
                found: self.len(),
            })
        }
    }

    /// Whether `id` is a materialized checkpoint.
    #[inline]
    pub fn is_cached(&self, id: NodeId) -> bool {
        self.cached[id.index()]
    }

    /// Set or clear the checkpoint flag of `id`.
    #[inline]
    pub fn set_cached(&mut self, id: NodeId, cached: bool) {
        self.cached[id.index()] = cached;
    }

    /// Cached nodes in id order.
    pub fn cached_nodes(&self) -> Vec<NodeId> {
        self.cached
            .iter()
            .enumerate()
            .filter(|(_, &cached)| cached)
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Fan-out computed by the last cost evaluation.
    pub fn fanout(&self, id: NodeId) -> u64 {
        self.fanout[id.index()]
    }

    pub(crate) fn set_fanout(&mut self, id: NodeId, fanout: u64) {
        self.fanout[id.index()] = fanout;
    }

    /// Recursive planner scripts.
    pub fn scripts(&self) -> &ScriptTable {
        &self.scripts
    }

    pub(crate) fn scripts_mut(&mut self) -> &mut ScriptTable {
        &mut self.scripts
    }

    /// Imported production schedule, if any.
    pub fn schedule(&self) -> Option<&ProductionSchedule> {
        self.schedule.as_ref()
    }

    /// Production bits of `id` from the imported schedule.
    pub fn produced_at(&self, id: NodeId) -> Option<&BitSlice> {
        self.schedule.as_ref().map(|s| s.produced_at(id))
    }

    /// Times the online pass produced `id`, if an online pass ran.
    pub fn productions(&self, id: NodeId) -> Option<u64> {
        self.productions.as_ref().map(|counts| counts[id.index()])
    }

    /// `Σ recompute × productions` of the recorded online pass.
    pub fn online_cost(&self, tree: &ExecutionTree) -> Option<Cost> {
        self.productions.as_ref().map(|counts| {
            tree.ids()
                .map(|id| tree.node(id).recompute_cost() * counts[id.index()])
                .sum::<Cost>()
        })
    }

    pub(crate) fn record_productions(&mut self, counts: Vec<u64>) {
        debug_assert_eq!(counts.len(), self.len());
        self.productions = Some(counts);
    }

    /// Accept an externally computed cache assignment.
    pub fn import_cache_set(
        &mut self,
        tree: &ExecutionTree,
        nodes: &[NodeId],
    ) -> Result<(), PlanError> {
        self.ensure_pristine(tree)?;
        for &id in nodes {
            tree.get(id)?;
            self.cached[id.index()] = true;
        }
        Ok(())
    }

    /// Accept an externally computed production schedule after validating it.
    pub fn import_schedule(
        &mut self,
        tree: &ExecutionTree,
        schedule: ProductionSchedule,
    ) -> Result<(), PlanError> {
        if !self.is_pristine() {
            return Err(PlanError::StateOccupied { mode: self.mode() });
        }
        self.ensure_matches(tree)?;
        schedule.validate(tree)?;
        self.schedule = Some(schedule);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{shapes, NodeCosts};

    #[test]
    fn test_reset_clears_every_mode() {
        let tree = shapes::star(NodeCosts::new(5, 1), &[NodeCosts::new(2, 1); 2]);
        let mut state = DecisionState::new(&tree);
        assert!(state.is_pristine());
        assert_eq!(state.mode(), DecisionMode::CacheSet);

        state.set_cached(tree.root(), true);
        state.set_fanout(tree.root(), 2);
        assert!(!state.is_pristine());
        assert!(matches!(
            state.ensure_pristine(&tree),
            Err(PlanError::StateNotReset { .. })
        ));

        state.reset();
        assert!(state.is_pristine());
        assert_eq!(state.fanout(tree.root()), 0);
        assert!(state.cached_nodes().is_empty());
    }

    #[test]
    fn test_state_size_checked() {
        let small = shapes::star(NodeCosts::unit(), &[NodeCosts::unit()]);
        let large = shapes::fixed(|_| NodeCosts::unit());
        let mut state = DecisionState::new(&small);
        assert!(matches!(
            state.ensure_pristine(&large),
            Err(PlanError::StateMismatch { expected: 15, found: 2 })
        ));

        state.reset_for(&large);
        assert!(state.ensure_pristine(&large).is_ok());
    }

    #[test]
    fn test_online_counts_are_a_decision() {
        let tree = shapes::star(NodeCosts::new(5, 3), &[NodeCosts::new(2, 1); 2]);
        let mut state = DecisionState::new(&tree);
        assert_eq!(state.online_cost(&tree), None);

        state.record_productions(vec![1, 1, 1]);
        assert_eq!(state.mode(), DecisionMode::Online);
        assert!(!state.is_pristine());
        assert_eq!(state.productions(tree.root()), Some(1));
        assert_eq!(state.online_cost(&tree), Some(9));

        state.reset();
        assert!(state.is_pristine());
        assert_eq!(state.productions(tree.root()), None);
    }

    #[test]
    fn test_import_cache_set() {
        let tree = shapes::fixed(|_| NodeCosts::unit());
        let mut state = DecisionState::new(&tree);
        let b = tree.find("B").unwrap();
        let f = tree.find("F").unwrap();
        state.import_cache_set(&tree, &[f, b]).unwrap();
        assert_eq!(state.cached_nodes(), vec![b, f]);
        assert!(state.import_cache_set(&tree, &[b]).is_err());
    }
}
