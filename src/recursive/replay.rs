//! Replay plans
//!
//! Flattens the decision scripts of a planned tree into the concrete action
//! sequence a checkpoint/restore engine executes. Generated with an explicit
//! frame stack, one frame per node on the current root path.

use std::fmt;

use tracing::trace;

use super::memo::{MemoKey, ScriptTable};
use crate::space::Cost;
use crate::tree::{ExecutionTree, NodeId};
use crate::PlanError;

/// Single replay instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ReplayAction {
    /// Derive the node's state from its parent's current state.
    Execute(NodeId),
    /// Persist the current state, which is the node's.
    Checkpoint(NodeId),
    /// Load a persisted checkpoint.
    Restore(NodeId),
    /// Drop all state and start again above the root.
    Restart,
}

impl ReplayAction {
    fn tag(&self) -> (u8, u64) {
        match *self {
            ReplayAction::Execute(id) => (0, id.index() as u64),
            ReplayAction::Checkpoint(id) => (1, id.index() as u64),
            ReplayAction::Restore(id) => (2, id.index() as u64),
            ReplayAction::Restart => (3, 0),
        }
    }
}

impl fmt::Display for ReplayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayAction::Execute(id) => write!(f, "exec {id}"),
            ReplayAction::Checkpoint(id) => write!(f, "checkpoint {id}"),
            ReplayAction::Restore(id) => write!(f, "restore {id}"),
            ReplayAction::Restart => write!(f, "restart"),
        }
    }
}

/// Counters describing a replay plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ScriptStats {
    /// Node executions
    pub executions: usize,
    /// Checkpoints created
    pub checkpoints: usize,
    /// Checkpoint loads
    pub restores: usize,
    /// Restarts from scratch
    pub restarts: usize,
    /// Entries stored in the script table
    pub entries: usize,
    /// Approximate script table size in bytes
    pub footprint_bytes: usize,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeId,
    key: MemoKey,
    anchor: Option<usize>,
    cursor: usize,
    checkpointed: bool,
}

impl Frame {
    fn new(node: NodeId, key: MemoKey, anchor: Option<usize>) -> Self {
        Self {
            node,
            key,
            anchor,
            cursor: 0,
            checkpointed: false,
        }
    }
}

/// Concrete replay of a planned tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayPlan {
    root: NodeId,
    key: MemoKey,
    actions: Vec<ReplayAction>,
    stats: ScriptStats,
}

impl ReplayPlan {
    /// Flatten the scripts stored for `key` at the root.
    pub fn build(
        tree: &ExecutionTree,
        table: &ScriptTable,
        key: MemoKey,
    ) -> Result<Self, PlanError> {
        let root = tree.root();
        let mut stats = ScriptStats {
            entries: table.len(),
            footprint_bytes: table.footprint_bytes(),
            ..ScriptStats::default()
        };
        let mut actions = vec![ReplayAction::Execute(root)];
        let mut frames = vec![Frame::new(root, key, None)];

        while let Some(depth) = frames.len().checked_sub(1) {
            let frame = frames[depth];
            let entry = table
                .get(frame.node, frame.key)
                .ok_or(PlanError::MissingSubplan {
                    node: frame.node,
                    budget: frame.key.budget,
                    carried: frame.key.carried,
                })?;
            let Some(&step) = entry.steps.get(frame.cursor) else {
                frames.pop();
                continue;
            };
            frames[depth].cursor += 1;
            let costs = tree.node(frame.node).costs();

            if step.node == frame.node {
                // Re-derive this node from the anchor checkpoint.
                let start = match frame.anchor {
                    Some(anchor) => {
                        actions.push(ReplayAction::Restore(frames[anchor].node));
                        stats.restores += 1;
                        anchor + 1
                    }
                    None => {
                        actions.push(ReplayAction::Restart);
                        stats.restarts += 1;
                        0
                    }
                };
                actions.extend(frames[start..=depth].iter().map(|f| ReplayAction::Execute(f.node)));
            } else if step.shared {
                if frame.key.budget < costs.storage {
                    return Err(PlanError::InfeasibleStep {
                        node: frame.node,
                        budget: frame.key.budget,
                    });
                }
                if frame.checkpointed {
                    actions.push(ReplayAction::Restore(frame.node));
                    stats.restores += 1;
                } else {
                    actions.push(ReplayAction::Checkpoint(frame.node));
                    frames[depth].checkpointed = true;
                    stats.checkpoints += 1;
                }
                actions.push(ReplayAction::Execute(step.node));
                frames.push(Frame::new(step.node, frame.key.shared(costs.storage), Some(depth)));
            } else {
                let after_shared = frame.cursor > 0 && entry.steps[frame.cursor - 1].shared;
                if after_shared {
                    actions.push(ReplayAction::Restore(frame.node));
                    stats.restores += 1;
                }
                actions.push(ReplayAction::Execute(step.node));
                frames.push(Frame::new(step.node, frame.key.redo(costs.recompute), frame.anchor));
            }
        }

        stats.executions = actions
            .iter()
            .filter(|a| matches!(a, ReplayAction::Execute(_)))
            .count();
        trace!(actions = actions.len(), ?stats, "replay plan built");

        Ok(Self {
            root,
            key,
            actions,
            stats,
        })
    }

    /// Root the plan starts from.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Key the root script was planned at.
    pub fn key(&self) -> MemoKey {
        self.key
    }

    /// Ordered actions.
    pub fn actions(&self) -> &[ReplayAction] {
        &self.actions
    }

    /// Action counters and script table size.
    pub fn stats(&self) -> ScriptStats {
        self.stats
    }

    /// Total recompute time of all executions.
    pub fn execution_cost(&self, tree: &ExecutionTree) -> Cost {
        self.actions
            .iter()
            .filter_map(|action| match action {
                ReplayAction::Execute(id) => Some(tree.node(*id).recompute_cost()),
                _ => None,
            })
            .sum()
    }

    /// Leaves in the order the plan first reaches them.
    pub fn leaf_order(&self, tree: &ExecutionTree) -> Vec<NodeId> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                ReplayAction::Execute(id) if tree.is_leaf(*id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Content hash of the action sequence.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.root.index() as u64).to_le_bytes());
        hasher.update(&self.key.budget.to_le_bytes());
        for action in &self.actions {
            let (tag, index) = action.tag();
            hasher.update(&[tag]);
            hasher.update(&index.to_le_bytes());
        }
        hasher.finalize()
    }
}

impl fmt::Display for ReplayPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f, "{i:>5}  {action}")?;
        }
        Ok(())
    }
}
