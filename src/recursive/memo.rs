//! Memo table for the recursive planner
//!
//! One ordered map per node, keyed by [`MemoKey`]. Each entry stores the cost
//! of the sub-problem together with the step sequence that produced it, so the
//! table is both the memo and the decision script.

use std::collections::BTreeMap;
use std::mem::size_of;

use super::recurrence;
use crate::space::{Cost, Storage};
use crate::tree::{ExecutionTree, NodeId};
use crate::PlanError;

/// Sub-problem key: remaining budget and redo cost carried since the last
/// checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MemoKey {
    /// Storage still available along the current checkpoint chain.
    pub budget: Storage,
    /// Recompute time needed to re-derive the parent from the last checkpoint.
    pub carried: Cost,
}

impl MemoKey {
    /// Key with an explicit carried cost.
    pub const fn new(budget: Storage, carried: Cost) -> Self {
        Self { budget, carried }
    }

    /// Entry key of a whole-tree plan.
    pub const fn root(budget: Storage) -> Self {
        Self::new(budget, 0)
    }

    /// Child key when the parent (of the given storage) is checkpointed.
    ///
    /// Callers check `storage <= budget` first.
    pub(crate) fn shared(self, storage: Storage) -> Self {
        Self::new(self.budget - storage, 0)
    }

    /// Child key when the parent is re-derived from the last checkpoint.
    pub(crate) fn redo(self, recompute: Cost) -> Self {
        Self::new(self.budget, self.carried + recompute)
    }
}

/// One entry of a decision script
///
/// A step naming a child is a visit of that child, through the parent's
/// shared checkpoint when `shared` is set. A step naming the node that owns
/// the script re-derives that node from the last checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ScriptStep {
    /// Target node
    pub node: NodeId,
    /// Whether the visit starts from the parent's checkpoint
    pub shared: bool,
}

impl ScriptStep {
    /// Visit through the shared checkpoint.
    pub const fn shared(node: NodeId) -> Self {
        Self { node, shared: true }
    }

    /// Visit (or re-derivation) without a checkpoint.
    pub const fn redo(node: NodeId) -> Self {
        Self {
            node,
            shared: false,
        }
    }
}

/// Memoized sub-problem result
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ScriptEntry {
    /// Total cost of the sub-problem, including the node's first execution.
    pub cost: Cost,
    /// Ordered steps; empty for leaves.
    pub steps: Vec<ScriptStep>,
}

/// Per-node decision scripts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptTable {
    entries: Vec<BTreeMap<MemoKey, ScriptEntry>>,
    len: usize,
}

impl ScriptTable {
    /// Empty table covering `nodes` nodes.
    pub fn with_nodes(nodes: usize) -> Self {
        Self {
            entries: vec![BTreeMap::new(); nodes],
            len: 0,
        }
    }

    /// Drop every entry and cover `nodes` nodes.
    pub fn resize(&mut self, nodes: usize) {
        self.clear();
        self.entries.resize_with(nodes, BTreeMap::new);
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(BTreeMap::clear);
        self.len = 0;
    }

    /// Whether no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of stored entries across all nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Stored entry.
    pub fn get(&self, node: NodeId, key: MemoKey) -> Option<&ScriptEntry> {
        self.entries.get(node.index())?.get(&key)
    }

    /// Stored cost.
    pub fn cost(&self, node: NodeId, key: MemoKey) -> Option<Cost> {
        self.get(node, key).map(|entry| entry.cost)
    }

    /// Whether `(node, key)` has been solved.
    pub fn contains(&self, node: NodeId, key: MemoKey) -> bool {
        self.get(node, key).is_some()
    }

    /// Store an entry, returning the one it replaced.
    pub fn insert(
        &mut self,
        node: NodeId,
        key: MemoKey,
        entry: ScriptEntry,
    ) -> Option<ScriptEntry> {
        let slot = &mut self.entries[node.index()];
        let previous = slot.insert(key, entry);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Entries of one node in key order.
    pub fn entries_for(&self, node: NodeId) -> impl Iterator<Item = (&MemoKey, &ScriptEntry)> {
        self.entries
            .get(node.index())
            .into_iter()
            .flat_map(|map| map.iter())
    }

    /// Distinct budgets solved at `node`, ascending.
    pub fn budgets_for(&self, node: NodeId) -> Vec<Storage> {
        let mut budgets: Vec<Storage> = self.entries_for(node).map(|(key, _)| key.budget).collect();
        budgets.dedup();
        budgets
    }

    /// Decision script handed to a replay engine: the steps stored at
    /// `(node, key)`.
    pub fn script(&self, node: NodeId, key: MemoKey) -> Option<&[ScriptStep]> {
        self.get(node, key).map(|entry| entry.steps.as_slice())
    }

    /// Approximate heap and inline size of the table in bytes.
    pub fn footprint_bytes(&self) -> usize {
        let per_node = self.entries.capacity() * size_of::<BTreeMap<MemoKey, ScriptEntry>>();
        let per_entry: usize = self
            .entries
            .iter()
            .flat_map(|map| map.values())
            .map(|entry| {
                size_of::<MemoKey>()
                    + size_of::<ScriptEntry>()
                    + entry.steps.capacity() * size_of::<ScriptStep>()
            })
            .sum();
        size_of::<Self>() + per_node + per_entry
    }

    /// Re-derive every stored cost from its steps and the stored child
    /// entries. Returns the number of entries checked.
    pub fn verify(&self, tree: &ExecutionTree) -> Result<usize, PlanError> {
        let mut checked = 0;
        for node in tree.ids() {
            for (&key, entry) in self.entries_for(node) {
                let recomputed = recurrence::explain(tree, node, key, &entry.steps, |child, k| {
                    self.cost(child, k).ok_or(PlanError::MissingSubplan {
                        node: child,
                        budget: k.budget,
                        carried: k.carried,
                    })
                })?;
                if recomputed != entry.cost {
                    return Err(PlanError::InconsistentScript {
                        node,
                        budget: key.budget,
                        carried: key.carried,
                        stored: entry.cost,
                        recomputed,
                    });
                }
                checked += 1;
            }
        }
        Ok(checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{shapes, NodeCosts};

    #[test]
    fn test_insert_counts_distinct_keys() {
        let mut table = ScriptTable::with_nodes(3);
        let node = NodeId(1);
        let entry = ScriptEntry {
            cost: 4,
            steps: Vec::new(),
        };

        assert!(table.insert(node, MemoKey::root(2), entry.clone()).is_none());
        assert!(table.insert(node, MemoKey::new(2, 5), entry.clone()).is_none());
        assert!(table.insert(node, MemoKey::root(2), entry).is_some());
        assert_eq!(table.len(), 2);
        assert_eq!(table.budgets_for(node), vec![2]);
        assert_eq!(table.cost(node, MemoKey::new(2, 5)), Some(4));
        assert_eq!(table.cost(node, MemoKey::new(3, 5)), None);

        table.clear();
        assert!(table.is_empty());
        assert!(!table.contains(node, MemoKey::root(2)));
    }

    #[test]
    fn test_key_derivation() {
        let key = MemoKey::new(10, 3);
        assert_eq!(key.shared(4), MemoKey::new(6, 0));
        assert_eq!(key.redo(5), MemoKey::new(10, 8));
    }

    #[test]
    fn test_verify_flags_tampered_entry() {
        let tree = shapes::star(NodeCosts::new(5, 3), &[NodeCosts::new(2, 1); 2]);
        let root = tree.root();
        let [l0, l1] = [tree.children(root)[0], tree.children(root)[1]];
        let key = MemoKey::root(3);

        let mut table = ScriptTable::with_nodes(tree.len());
        let leaf = ScriptEntry {
            cost: 2,
            steps: Vec::new(),
        };
        table.insert(l0, key.shared(3), leaf.clone());
        table.insert(l1, key.redo(5), leaf);
        table.insert(
            root,
            key,
            ScriptEntry {
                cost: 9,
                steps: vec![ScriptStep::shared(l0), ScriptStep::redo(l1)],
            },
        );
        assert_eq!(table.verify(&tree).unwrap(), 3);

        table.insert(
            root,
            key,
            ScriptEntry {
                cost: 8,
                steps: vec![ScriptStep::shared(l0), ScriptStep::redo(l1)],
            },
        );
        assert!(matches!(
            table.verify(&tree),
            Err(PlanError::InconsistentScript {
                stored: 8,
                recomputed: 9,
                ..
            })
        ));
    }

    #[test]
    fn test_footprint_grows_with_entries() {
        let mut table = ScriptTable::with_nodes(2);
        let empty = table.footprint_bytes();
        table.insert(
            NodeId(0),
            MemoKey::root(1),
            ScriptEntry {
                cost: 1,
                steps: vec![ScriptStep::redo(NodeId(1))],
            },
        );
        assert!(table.footprint_bytes() > empty);
    }
}
