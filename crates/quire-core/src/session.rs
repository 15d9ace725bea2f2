// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The caller-owned output sequence and the operations the UI drives on it.
//
// The session never issues notifications of its own; after a mutation the
// caller refreshes previews and window state itself.

use tracing::{debug, info, instrument};

use crate::config::AppConfig;
use crate::error::{QuireError, Result};
use crate::geom::Sides;
use crate::history::{History, Snapshot};
use crate::page::{LayerPage, Page, PageTransform, ScaleSpec};

/// An editing session: the ordered page sequence, view state, and history.
#[derive(Debug, Default)]
pub struct Session {
    pages: Vec<Page>,
    selection: Vec<usize>,
    scroll: f64,
    history: History,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &AppConfig) -> Self {
        Self {
            history: History::with_limit(config.history_limit),
            ..Self::default()
        }
    }

    // -- View state -----------------------------------------------------------

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, index: usize) -> Result<&Page> {
        self.pages
            .get(index)
            .ok_or(QuireError::PageOutOfRange {
                index,
                len: self.pages.len(),
            })
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Vec<usize>) {
        self.selection = selection;
    }

    pub fn scroll(&self) -> f64 {
        self.scroll
    }

    pub fn set_scroll(&mut self, scroll: f64) {
        self.scroll = scroll;
    }

    /// Store a freshly rendered thumbnail on a page. Out-of-range indices are
    /// ignored: the sequence may have changed since the render was scheduled.
    pub fn set_thumbnail(&mut self, index: usize, bitmap: std::sync::Arc<crate::Bitmap>) {
        if let Some(page) = self.pages.get_mut(index) {
            page.thumbnail = Some(bitmap);
        }
    }

    // -- History --------------------------------------------------------------

    /// Record the current state; called immediately before every mutation.
    #[instrument(skip(self))]
    pub fn commit(&mut self, label: &str) {
        let snapshot = Snapshot::capture(label, &self.pages, &self.selection, self.scroll);
        self.history.commit(snapshot);
    }

    /// Restore the previous snapshot. Returns whether anything was restored.
    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            return false;
        }
        let live = Snapshot::capture("Current", &self.pages, &self.selection, self.scroll);
        match self.history.undo(live) {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Re-apply the next snapshot. Returns whether anything was restored.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.history.redo_label()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.pages = snapshot.pages;
        self.selection = snapshot.selection;
        self.scroll = snapshot.scroll;
        debug!(pages = self.pages.len(), "session state restored");
    }

    // -- Sequence mutation ----------------------------------------------------

    /// Insert a page at `index` (which may equal the current length).
    pub fn insert(&mut self, index: usize, page: Page) -> Result<()> {
        if index > self.pages.len() {
            return Err(QuireError::PageOutOfRange {
                index,
                len: self.pages.len(),
            });
        }
        self.pages.insert(index, page);
        Ok(())
    }

    pub fn push(&mut self, page: Page) {
        self.pages.push(page);
    }

    pub fn remove(&mut self, index: usize) -> Result<Page> {
        self.check_index(index)?;
        Ok(self.pages.remove(index))
    }

    /// Move the pages at `from` (any order, no duplicates) so they sit,
    /// in their current relative order, before the page currently at `to`.
    /// `to` counts positions in the sequence as it is now; `to == len` moves
    /// to the end.
    #[instrument(skip(self))]
    pub fn move_pages(&mut self, from: &[usize], to: usize) -> Result<()> {
        for &index in from {
            self.check_index(index)?;
        }
        if to > self.pages.len() {
            return Err(QuireError::PageOutOfRange {
                index: to,
                len: self.pages.len(),
            });
        }

        let mut sorted: Vec<usize> = from.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        // Pull the moved pages out back-to-front so indices stay valid,
        // tracking how many removals happen before the insertion point.
        let mut moved: Vec<Page> = Vec::with_capacity(sorted.len());
        let mut shift = 0;
        for &index in sorted.iter().rev() {
            moved.push(self.pages.remove(index));
            if index < to {
                shift += 1;
            }
        }
        moved.reverse();

        let target = to - shift;
        for (offset, page) in moved.into_iter().enumerate() {
            self.pages.insert(target + offset, page);
        }
        info!(count = sorted.len(), target, "pages moved");
        Ok(())
    }

    /// Reverse the order of pages in `[start, end)`.
    pub fn reverse_range(&mut self, start: usize, end: usize) -> Result<()> {
        if start > end || end > self.pages.len() {
            return Err(QuireError::PageOutOfRange {
                index: end,
                len: self.pages.len(),
            });
        }
        self.pages[start..end].reverse();
        Ok(())
    }

    /// Insert a copy of the page at `index` directly after it. The copy keeps
    /// the cached thumbnail: its geometry is identical.
    pub fn duplicate_at(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let copy = self.pages[index].duplicate(true);
        self.pages.insert(index + 1, copy);
        Ok(())
    }

    /// Split the page at `index` into left and right halves; the right half
    /// is inserted directly after the left.
    pub fn split_at(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let right = self.pages[index].split();
        self.pages.insert(index + 1, right);
        Ok(())
    }

    /// Rotate the given pages by `delta` degrees. Returns whether any page
    /// actually changed.
    pub fn rotate_pages(&mut self, indices: &[usize], delta: i32) -> Result<bool> {
        for &index in indices {
            self.check_index(index)?;
        }
        let mut changed = false;
        for &index in indices {
            changed |= self.pages[index].rotate(delta);
        }
        Ok(changed)
    }

    /// Apply a validated crop to the given pages.
    pub fn crop_pages(&mut self, indices: &[usize], crop: Sides) -> Result<()> {
        for &index in indices {
            self.check_index(index)?;
        }
        for &index in indices {
            let page = &mut self.pages[index];
            page.crop = crop;
            page.thumbnail = None;
        }
        Ok(())
    }

    /// Re-scale the given pages. Returns whether any page changed.
    pub fn scale_pages(&mut self, indices: &[usize], spec: ScaleSpec) -> Result<bool> {
        for &index in indices {
            self.check_index(index)?;
        }
        let mut changed = false;
        for &index in indices {
            changed |= self.pages[index].scale_to(spec);
        }
        Ok(changed)
    }

    pub fn attach_layer(&mut self, index: usize, layer: LayerPage) -> Result<()> {
        self.check_index(index)?;
        let page = &mut self.pages[index];
        page.layers.push(layer);
        page.thumbnail = None;
        Ok(())
    }

    pub fn detach_layer(&mut self, index: usize, layer_index: usize) -> Result<LayerPage> {
        self.check_index(index)?;
        let page = &mut self.pages[index];
        if layer_index >= page.layers.len() {
            return Err(QuireError::PageOutOfRange {
                index: layer_index,
                len: page.layers.len(),
            });
        }
        page.thumbnail = None;
        Ok(page.layers.remove(layer_index))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.pages.len() {
            return Err(QuireError::PageOutOfRange {
                index,
                len: self.pages.len(),
            });
        }
        Ok(())
    }
}
