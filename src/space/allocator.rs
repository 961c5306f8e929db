//! Resident-storage tracking for bounded caches

use super::Storage;

/// Tracks storage held by resident checkpoints
///
/// Allocations may temporarily overshoot the budget; the peak only records
/// settled states, i.e. after the owner has finished evicting.
#[derive(Debug, Default)]
pub struct StorageTracker {
    /// Storage currently resident
    current: Storage,

    /// Maximum settled residency
    peak: Storage,

    /// Number of allocations performed
    allocations: usize,
}

impl StorageTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a newly resident checkpoint.
    pub fn allocate(&mut self, size: Storage) {
        self.current = self.current.saturating_add(size);
        self.allocations += 1;
    }

    /// Release a checkpoint.
    pub fn free(&mut self, size: Storage) {
        self.current = self.current.saturating_sub(size);
    }

    /// Record the current residency as settled.
    pub fn settle(&mut self) {
        self.peak = self.peak.max(self.current);
    }

    /// Whether the resident set fits in `budget`.
    #[inline]
    pub fn fits(&self, budget: Storage) -> bool {
        self.current <= budget
    }

    /// Storage currently resident.
    pub fn current(&self) -> Storage {
        self.current
    }

    /// Maximum settled residency.
    pub fn peak(&self) -> Storage {
        self.peak
    }

    /// Total allocations performed.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_ignores_transient_overshoot() {
        let mut tracker = StorageTracker::new();
        tracker.allocate(5);
        tracker.allocate(7);
        assert!(!tracker.fits(10));
        tracker.free(7);
        tracker.settle();

        assert_eq!(tracker.current(), 5);
        assert_eq!(tracker.peak(), 5);
        assert_eq!(tracker.allocations(), 2);
    }

    #[test]
    fn test_free_saturates() {
        let mut tracker = StorageTracker::new();
        tracker.allocate(1);
        tracker.free(3);
        assert_eq!(tracker.current(), 0);
    }
}
