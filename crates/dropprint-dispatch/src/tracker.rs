// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Keys that have already become jobs.
//
// A key is added once its document is staged and removed once it has been
// printed.  While a key is tracked the poller never downloads or announces
// it again, even if it is still in the store.

use std::collections::HashSet;

use tracing::debug;

use dropprint_core::types::JobKey;

/// In-memory dedup set.  Lives for the process lifetime only.
#[derive(Debug, Default)]
pub struct JobTracker {
    keys: HashSet<JobKey>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.keys.contains(key)
    }

    /// Track `key`.  Returns `false` if it was already tracked (no-op).
    pub fn mark_staged(&mut self, key: &JobKey) -> bool {
        let added = self.keys.insert(key.clone());
        debug!(%key, added, "tracker mark_staged");
        added
    }

    /// Stop tracking `key`.  Returns `false` if it was not tracked (no-op).
    pub fn release(&mut self, key: &JobKey) -> bool {
        let removed = self.keys.remove(key);
        debug!(%key, removed, "tracker release");
        removed
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_staged_is_idempotent() {
        let mut tracker = JobTracker::new();
        let key = JobKey::from("orders/1.ps");
        assert!(tracker.mark_staged(&key));
        assert!(!tracker.mark_staged(&key));
        assert!(tracker.contains(&key));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn release_of_untracked_key_is_noop() {
        let mut tracker = JobTracker::new();
        assert!(!tracker.release(&JobKey::from("never-seen.ps")));
        assert!(tracker.is_empty());
    }

    #[test]
    fn released_key_is_eligible_again() {
        let mut tracker = JobTracker::new();
        let key = JobKey::from("a.ps");
        tracker.mark_staged(&key);
        assert!(tracker.release(&key));
        assert!(!tracker.contains(&key));
        assert!(tracker.mark_staged(&key));
    }
}
