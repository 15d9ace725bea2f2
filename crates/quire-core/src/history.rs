// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Linear, branch-discarding undo/redo stack over the output sequence.
//
// The contract with callers: `commit` is called immediately BEFORE any
// mutation, with the state as it is right then. Undoing from the newest
// position first captures the live state so it remains reachable via redo.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::page::Page;

/// An immutable, independently-owned copy of the output sequence plus the
/// selection and scroll state needed to restore the view.
///
/// Pages are deep copies with cached thumbnails dropped, so later mutation of
/// the live sequence never changes a stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub label: String,
    pub pages: Vec<Page>,
    pub selection: Vec<usize>,
    /// Scroll position as a fraction of the full document extent.
    pub scroll: f64,
}

impl Snapshot {
    pub fn capture(label: impl Into<String>, pages: &[Page], selection: &[usize], scroll: f64) -> Self {
        Self {
            label: label.into(),
            pages: pages.iter().map(|p| p.duplicate(false)).collect(),
            selection: selection.to_vec(),
            scroll,
        }
    }
}

/// Snapshot stack with a single pointer; no branches are ever kept.
#[derive(Debug, Default)]
pub struct History {
    snapshots: Vec<Snapshot>,
    /// Index one past the last committed snapshot the live state derives from.
    pointer: usize,
    /// Maximum snapshots retained; 0 means unlimited.
    limit: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Record the pre-mutation state. Any snapshots ahead of the pointer
    /// (the redo future) are discarded first.
    pub fn commit(&mut self, snapshot: Snapshot) {
        self.snapshots.truncate(self.pointer);
        debug!(label = %snapshot.label, depth = self.snapshots.len() + 1, "history commit");
        self.snapshots.push(snapshot);
        self.pointer = self.snapshots.len();

        if self.limit > 0 && self.snapshots.len() > self.limit {
            let excess = self.snapshots.len() - self.limit;
            self.snapshots.drain(..excess);
            self.pointer -= excess;
        }
    }

    /// Step back one snapshot, returning the state to restore.
    ///
    /// When the pointer sits at the newest position, `live` (the current
    /// un-committed state) is first pushed so a later redo can return to it.
    /// Returns `None` when no undo is available; `live` is then discarded.
    pub fn undo(&mut self, live: Snapshot) -> Option<Snapshot> {
        if self.pointer == 0 {
            return None;
        }
        if self.pointer == self.snapshots.len() {
            self.snapshots.push(live);
        }
        self.pointer -= 1;
        debug!(pointer = self.pointer, "history undo");
        Some(self.snapshots[self.pointer].clone())
    }

    /// Step forward one snapshot, returning the state to restore, or `None`
    /// when already at the newest snapshot.
    pub fn redo(&mut self) -> Option<Snapshot> {
        if self.pointer + 1 >= self.snapshots.len() {
            return None;
        }
        self.pointer += 1;
        debug!(pointer = self.pointer, "history redo");
        Some(self.snapshots[self.pointer].clone())
    }

    /// Drop all history, e.g. on new-document or close.
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.pointer = 0;
    }

    pub fn can_undo(&self) -> bool {
        self.pointer >= 1
    }

    pub fn can_redo(&self) -> bool {
        self.pointer + 1 < self.snapshots.len()
    }

    /// Label of the operation an undo would revert, for menu display.
    pub fn undo_label(&self) -> Option<&str> {
        if !self.can_undo() {
            return None;
        }
        self.snapshots.get(self.pointer - 1).map(|s| s.label.as_str())
    }

    /// Label of the operation a redo would re-apply.
    pub fn redo_label(&self) -> Option<&str> {
        if !self.can_redo() {
            return None;
        }
        self.snapshots.get(self.pointer + 1).map(|s| s.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Dims;

    fn pages(marker: u32) -> Vec<Page> {
        vec![Page::new(1, marker, Dims::new(100.0, 200.0))]
    }

    fn snap(label: &str, marker: u32) -> Snapshot {
        Snapshot::capture(label, &pages(marker), &[], 0.0)
    }

    #[test]
    fn fresh_history_has_nothing_to_undo_or_redo() {
        let mut history = History::new();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo(snap("live", 0)).is_none());
        assert!(history.redo().is_none());
    }

    #[test]
    fn undo_returns_the_pre_mutation_state() {
        let mut history = History::new();
        // State 0 is about to be mutated into state 1.
        history.commit(snap("A", 0));
        let restored = history.undo(snap("live", 1)).expect("undo available");
        assert_eq!(restored.pages[0].source_page, 0);
    }

    #[test]
    fn undo_twice_then_redo_walks_the_stack() {
        let mut history = History::new();
        history.commit(snap("A", 0)); // mutate 0 -> 1
        history.commit(snap("B", 1)); // mutate 1 -> 2

        let first = history.undo(snap("live", 2)).expect("first undo");
        assert_eq!(first.pages[0].source_page, 1);

        let second = history.undo(snap("live", 1)).expect("second undo");
        assert_eq!(second.pages[0].source_page, 0);

        // No further undo.
        assert!(!history.can_undo());

        let redone = history.redo().expect("redo to post-A state");
        assert_eq!(redone.pages[0].source_page, 1);

        let redone = history.redo().expect("redo to live state");
        assert_eq!(redone.pages[0].source_page, 2);

        assert!(!history.can_redo());
    }

    #[test]
    fn commit_after_undo_discards_the_future() {
        let mut history = History::new();
        history.commit(snap("A", 0));
        history.commit(snap("B", 1));

        history.undo(snap("live", 2)).expect("undo");
        assert!(history.can_redo());

        history.commit(snap("C", 1));
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
    }

    #[test]
    fn redo_unavailable_without_prior_undo() {
        let mut history = History::new();
        history.commit(snap("A", 0));
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
    }

    #[test]
    fn labels_track_the_pointer() {
        let mut history = History::new();
        history.commit(snap("Rotate", 0));
        assert_eq!(history.undo_label(), Some("Rotate"));
        assert_eq!(history.redo_label(), None);

        history.undo(snap("live", 1)).expect("undo");
        assert_eq!(history.undo_label(), None);
        assert_eq!(history.redo_label(), Some("live"));
    }

    #[test]
    fn clear_drops_everything() {
        let mut history = History::new();
        history.commit(snap("A", 0));
        history.commit(snap("B", 1));
        history.clear();
        assert!(history.is_empty());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn limit_evicts_oldest_snapshots() {
        let mut history = History::with_limit(2);
        history.commit(snap("A", 0));
        history.commit(snap("B", 1));
        history.commit(snap("C", 2));
        assert_eq!(history.len(), 2);

        // The oldest reachable state is now B's pre-mutation state.
        let first = history.undo(snap("live", 3)).expect("undo");
        assert_eq!(first.pages[0].source_page, 2);
        let second = history.undo(snap("live", 2)).expect("undo");
        assert_eq!(second.pages[0].source_page, 1);
        assert!(!history.can_undo());
    }

    #[test]
    fn snapshots_are_independent_of_the_live_pages() {
        let mut live = pages(7);
        let mut history = History::new();
        history.commit(Snapshot::capture("A", &live, &[0], 0.5));

        live[0].source_page += 100;

        let restored = history.undo(snap("live", 8)).expect("undo");
        assert_eq!(restored.pages[0].source_page, 7);
        assert_eq!(restored.selection, vec![0]);
        assert!((restored.scroll - 0.5).abs() < 1e-12);
    }
}
