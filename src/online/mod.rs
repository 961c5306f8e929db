//! Online frequency-based approximation
//!
//! Streams the root-to-leaf paths once, in child order, with no lookahead.
//! A bounded runtime cache keeps node states resident; each path resumes from
//! its deepest resident node and everything produced along the way is
//! admitted, then the least frequently visited nodes are evicted until the
//! resident set fits the budget again. On frequency ties the deeper node
//! leaves first.
//!
//! How often each node was produced is recorded in the [`DecisionState`], so
//! the cost query prices an online pass like any other decision.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use tracing::{info, trace};

use crate::space::{Cost, Storage, StorageTracker};
use crate::state::DecisionState;
use crate::tree::{ExecutionTree, NodeId};
use crate::PlanError;

/// Outcome of an online pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OnlineReport {
    /// Total recompute time charged.
    pub cost: Cost,
    /// Paths replayed.
    pub paths: usize,
    /// Paths that resumed from a resident node instead of the root.
    pub reused_paths: usize,
    /// Nodes evicted.
    pub evictions: usize,
    /// Largest resident storage after eviction.
    pub peak_resident: Storage,
}

type EvictionKey = (u64, Reverse<usize>, NodeId);

/// Online LFU cache simulator
#[derive(Debug, Clone, Copy, Default)]
pub struct OnlineApproximator;

impl OnlineApproximator {
    /// Create an approximator.
    pub fn new() -> Self {
        Self
    }

    /// Replay every path once under the tree's cache budget, recording
    /// production counts in `state`.
    pub fn run(
        &self,
        tree: &ExecutionTree,
        state: &mut DecisionState,
    ) -> Result<OnlineReport, PlanError> {
        state.ensure_pristine(tree)?;

        let budget = tree.cache_budget();
        let mut frequency = vec![0u64; tree.len()];
        let mut productions = vec![0u64; tree.len()];
        let mut resident: BTreeSet<EvictionKey> = BTreeSet::new();
        let mut slot: Vec<Option<EvictionKey>> = vec![None; tree.len()];
        let mut tracker = StorageTracker::new();
        let mut report = OnlineReport::default();

        for path in tree.paths_to_leaves() {
            report.paths += 1;

            let start = path
                .iter()
                .rposition(|id| slot[id.index()].is_some())
                .map_or(0, |deepest| deepest + 1);
            if start > 0 {
                report.reused_paths += 1;
            }
            let produced = &path[start..];
            report.cost += produced
                .iter()
                .map(|&id| tree.node(id).recompute_cost())
                .sum::<Cost>();

            // Re-key resident path nodes under their new frequency.
            for &id in &path {
                let depth = tree.node(id).depth();
                if let Some(old) = slot[id.index()].take() {
                    resident.remove(&old);
                    frequency[id.index()] += 1;
                    let key = (frequency[id.index()], Reverse(depth), id);
                    resident.insert(key);
                    slot[id.index()] = Some(key);
                } else {
                    frequency[id.index()] += 1;
                }
            }

            for &id in produced {
                productions[id.index()] += 1;
                let key = (frequency[id.index()], Reverse(tree.node(id).depth()), id);
                resident.insert(key);
                slot[id.index()] = Some(key);
                tracker.allocate(tree.node(id).storage_cost());
            }

            while !tracker.fits(budget) {
                let Some(victim) = resident.pop_first() else {
                    break;
                };
                let (freq, Reverse(depth), id) = victim;
                slot[id.index()] = None;
                tracker.free(tree.node(id).storage_cost());
                report.evictions += 1;
                trace!(node = %id, freq, depth, "evicted");
            }
            tracker.settle();
        }

        report.peak_resident = tracker.peak();
        state.record_productions(productions);
        info!(
            budget,
            cost = report.cost,
            paths = report.paths,
            reused = report.reused_paths,
            evictions = report.evictions,
            "online pass complete"
        );
        Ok(report)
    }
}
