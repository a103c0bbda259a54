//! Dirty Tracker
//!
//! Per-key pending-change ledger accumulated since the last persistence
//! sync. Each key carries its final pending action; a Set after a Delete
//! overwrites the delete marker, so commit-time bookkeeping never replays
//! stale tombstones.
//!
//! While a full sync is pending, individual marks are not recorded: the
//! next sync rewrites the entire dataset anyway.

use std::collections::HashMap;

/// Final pending action for a dirty key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirtyOp {
    Set,
    Delete,
}

/// Ledger of keys changed since the last successful sync snapshot.
#[derive(Debug)]
pub(crate) struct DirtyTracker {
    pending: HashMap<String, DirtyOp>,
    need_full_sync: bool,
    pub(crate) threshold_count: usize,
    pub(crate) threshold_ratio: f64,
}

impl DirtyTracker {
    pub(crate) fn new(threshold_count: usize, threshold_ratio: f64) -> Self {
        Self {
            pending: HashMap::new(),
            need_full_sync: false,
            threshold_count,
            threshold_ratio,
        }
    }

    pub(crate) fn mark_set(&mut self, key: &str) {
        if !self.need_full_sync {
            self.pending.insert(key.to_string(), DirtyOp::Set);
        }
    }

    pub(crate) fn mark_delete(&mut self, key: &str) {
        if !self.need_full_sync {
            self.pending.insert(key.to_string(), DirtyOp::Delete);
        }
    }

    /// Requests a full rewrite on the next sync and drops the now-meaningless
    /// per-key ledger.
    pub(crate) fn request_full_sync(&mut self) {
        self.need_full_sync = true;
        self.pending.clear();
    }

    /// Consumes a pending full-sync request.
    pub(crate) fn take_full_sync_request(&mut self) -> bool {
        std::mem::take(&mut self.need_full_sync)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Splits the ledger into set-keys and delete-keys, clearing it.
    pub(crate) fn drain(&mut self) -> (Vec<String>, Vec<String>) {
        let mut set_keys = Vec::new();
        let mut delete_keys = Vec::new();
        for (key, op) in self.pending.drain() {
            match op {
                DirtyOp::Set => set_keys.push(key),
                DirtyOp::Delete => delete_keys.push(key),
            }
        }
        (set_keys, delete_keys)
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_delete() {
        let mut tracker = DirtyTracker::new(50, 0.2);
        tracker.mark_delete("k");
        tracker.mark_set("k");
        let (set_keys, delete_keys) = tracker.drain();
        assert_eq!(set_keys, vec!["k".to_string()]);
        assert!(delete_keys.is_empty());
    }

    #[test]
    fn test_drain_clears() {
        let mut tracker = DirtyTracker::new(50, 0.2);
        tracker.mark_set("a");
        tracker.mark_delete("b");
        assert_eq!(tracker.len(), 2);
        let (set_keys, delete_keys) = tracker.drain();
        assert_eq!(set_keys, vec!["a".to_string()]);
        assert_eq!(delete_keys, vec!["b".to_string()]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_full_sync_request_swallows_marks() {
        let mut tracker = DirtyTracker::new(50, 0.2);
        tracker.mark_set("a");
        tracker.request_full_sync();
        assert!(tracker.is_empty());

        // Marks made while the request is pending are pointless; the whole
        // dataset will be rewritten.
        tracker.mark_set("b");
        tracker.mark_delete("c");
        assert!(tracker.is_empty());

        assert!(tracker.take_full_sync_request());
        assert!(!tracker.take_full_sync_request());

        // After the request is consumed, marks record again.
        tracker.mark_set("d");
        assert_eq!(tracker.len(), 1);
    }
}
