//! Selection set and bulk-mode flag.
//!
//! All mutations are synchronous and bump [`SelectionStore::version`], so any
//! view derived from the selection can tell whether it is stale by comparing
//! the token it was built from.
use crate::topic::TopicId;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    selected: HashSet<TopicId>,
    bulk_mode: bool,
    version: u64,
}

impl SelectionStore {
    /// Empty selection, bulk mode off.
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Monotonic token, incremented on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn bulk_mode(&self) -> bool {
        self.bulk_mode
    }

    /// Set the bulk-mode flag. Turning it off empties the selection in the
    /// same step.
    pub fn set_bulk_mode(&mut self, enabled: bool) {
        if self.bulk_mode && !enabled {
            tracing::debug!(cleared = self.selected.len(), "Bulk mode disabled, clearing selection");
            self.selected.clear();
        }
        self.bulk_mode = enabled;
        self.bump();
    }

    /// Flip membership of `id`. Ignored while bulk mode is off.
    ///
    /// Returns the new membership.
    pub fn toggle(&mut self, id: TopicId) -> bool {
        if !self.bulk_mode {
            tracing::debug!(topic_id = id, "Ignoring selection toggle outside bulk mode");
            return false;
        }
        let now_selected = if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        };
        self.bump();
        now_selected
    }

    /// Add `id` without toggling. Ignored while bulk mode is off.
    ///
    /// Returns whether `id` was newly added.
    pub fn select(&mut self, id: TopicId) -> bool {
        if !self.bulk_mode {
            tracing::debug!(topic_id = id, "Ignoring select outside bulk mode");
            return false;
        }
        let added = self.selected.insert(id);
        if added {
            self.bump();
        }
        added
    }

    /// Replace the selection with `ids`. Ignored while bulk mode is off.
    pub fn select_all<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = TopicId>,
    {
        if !self.bulk_mode {
            tracing::debug!("Ignoring select-all outside bulk mode");
            return;
        }
        self.selected = ids.into_iter().collect();
        self.bump();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.bump();
    }

    /// Drop ids that are no longer in the collection.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&TopicId) -> bool,
    {
        self.selected.retain(keep);
        self.bump();
    }

    pub fn is_selected(&self, id: TopicId) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected_ids(&self) -> &HashSet<TopicId> {
        &self.selected
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
