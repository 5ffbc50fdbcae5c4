//! Orchestration of the followed-topics grid.
//!
//! [`GridController`] owns the topic collection handed over by the host, the
//! selection store, one gesture machine per tag strip, and the mutator. Hosts
//! render from [`GridController::items`], route user input to the action
//! methods, and drain [`GridEvent`]s for navigation, errors and reloads.
use crate::bulk_mode::{BulkModeSignal, BulkModeSubscription};
use crate::config::Settings;
use crate::event::{EventSink, GridEvent};
use crate::gesture::{ClickOutcome, ClickTarget, GestureDisambiguator, MoveOutcome};
use crate::mutator::{BatchOutcome, ConfirmGate, OptimisticMutator};
use crate::projector::{self, DisplayItem, ProjectionContext};
use crate::remote::{BatchOperation, ForumApi, RemoteError};
use crate::selection::SelectionStore;
use crate::topic::{Topic, TopicId, TopicStatus};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// Failure of a single-topic action.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("Topic {0} is not in the grid")]
    UnknownTopic(TopicId),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Selected ids cached against the state they were derived from.
#[derive(Debug, Clone)]
struct SelectedCache {
    selection_version: u64,
    topics_generation: u64,
    ids: Vec<TopicId>,
}

pub struct GridController<A, G> {
    settings: Settings,
    origin: Url,
    topics: Vec<Topic>,
    /// Bumped whenever the collection or any topic in it changes.
    topics_generation: u64,
    selection: SelectionStore,
    bulk_mode: BulkModeSubscription,
    gestures: HashMap<TopicId, GestureDisambiguator>,
    mutator: OptimisticMutator<A>,
    gate: G,
    events: EventSink,
    selected_cache: Option<SelectedCache>,
}

impl<A: ForumApi, G: ConfirmGate> GridController<A, G> {
    /// Mount the grid. Bulk mode starts at the signal's current value.
    pub fn new<S: BulkModeSignal>(
        settings: Settings,
        origin: Url,
        api: A,
        gate: G,
        signal: &S,
        events: EventSink,
    ) -> Self {
        let mut selection = SelectionStore::new();
        selection.set_bulk_mode(signal.current());
        Self {
            settings,
            origin,
            topics: Vec::new(),
            topics_generation: 0,
            selection,
            bulk_mode: signal.subscribe(),
            gestures: HashMap::new(),
            mutator: OptimisticMutator::new(api, events.clone()),
            gate,
            events,
            selected_cache: None,
        }
    }

    // ========================================================================
    // Host Data
    // ========================================================================

    /// Replace the collection, e.g. after a reload. Selection entries and
    /// gesture machines for vanished topics are dropped.
    pub fn replace_topics(&mut self, topics: Vec<Topic>) {
        self.topics = topics;
        self.touch_topics();
        let present: std::collections::HashSet<TopicId> =
            self.topics.iter().map(|t| t.id).collect();
        self.selection.retain(|id| present.contains(id));
        self.gestures.retain(|id, _| present.contains(id));
        self.mirror_selection();
        tracing::debug!(count = self.topics.len(), "Topic collection replaced");
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn into_topics(self) -> Vec<Topic> {
        self.topics
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn api(&self) -> &A {
        self.mutator.api()
    }

    fn touch_topics(&mut self) {
        self.topics_generation = self.topics_generation.wrapping_add(1);
    }

    fn topic_index(&self, id: TopicId) -> Option<usize> {
        self.topics.iter().position(|t| t.id == id)
    }

    fn contains(&self, id: TopicId) -> bool {
        self.topic_index(id).is_some()
    }

    // ========================================================================
    // Bulk Mode
    // ========================================================================

    /// Apply a pending bulk-mode notification, if one arrived.
    pub fn sync_bulk_mode(&mut self) {
        if let Some(enabled) = self.bulk_mode.take_change() {
            tracing::debug!(enabled, "Bulk mode changed");
            self.selection.set_bulk_mode(enabled);
            self.mirror_selection();
        }
    }

    /// Wait for the next bulk-mode change and apply it. Returns `false` once
    /// the signal is gone.
    pub async fn await_bulk_mode_change(&mut self) -> bool {
        match self.bulk_mode.changed().await {
            Some(enabled) => {
                self.selection.set_bulk_mode(enabled);
                self.mirror_selection();
                true
            }
            None => false,
        }
    }

    pub fn bulk_mode(&self) -> bool {
        self.selection.bulk_mode()
    }

    /// Copy selection membership onto each topic's `selected` flag.
    fn mirror_selection(&mut self) {
        for topic in &mut self.topics {
            let selected = self.selection.is_selected(topic.id);
            topic.set_selected(selected);
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Project every topic with current selection and bulk-mode state.
    pub fn items(&mut self) -> Vec<DisplayItem> {
        self.sync_bulk_mode();
        let ctx = ProjectionContext {
            origin: &self.origin,
            settings: &self.settings,
            bulk_mode: self.selection.bulk_mode(),
        };
        let selection = &self.selection;
        projector::project_all(&self.topics, &ctx, |id| selection.is_selected(id))
    }

    /// Ids of selected topics in collection order. Rebuilt whenever the
    /// selection version or the collection changed since the last call.
    pub fn selected_topic_ids(&mut self) -> &[TopicId] {
        self.sync_bulk_mode();
        let fresh = matches!(
            &self.selected_cache,
            Some(c) if c.selection_version == self.selection.version()
                && c.topics_generation == self.topics_generation
        );
        if !fresh {
            let ids = self
                .topics
                .iter()
                .map(|t| t.id)
                .filter(|id| self.selection.is_selected(*id))
                .collect();
            self.selected_cache = Some(SelectedCache {
                selection_version: self.selection.version(),
                topics_generation: self.topics_generation,
                ids,
            });
        }
        self.selected_cache
            .as_ref()
            .map(|c| c.ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn selection_count(&self) -> usize {
        self.selection.count()
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Navigate to a topic.
    pub fn visit(&mut self, id: TopicId) {
        match self.topic_index(id) {
            Some(idx) => self.events.navigate(projector::topic_url(&self.topics[idx])),
            None => tracing::debug!(topic_id = id, "Visit requested for unknown topic"),
        }
    }

    /// Flip the vote on one topic, optimistically. Returns the new voted
    /// state.
    pub async fn toggle_vote(&mut self, id: TopicId) -> Result<bool, GridError> {
        self.sync_bulk_mode();
        let Some(idx) = self.topic_index(id) else {
            tracing::debug!(topic_id = id, "Vote requested for unknown topic");
            return Err(GridError::UnknownTopic(id));
        };
        self.touch_topics();
        let result = self.mutator.toggle_vote(&mut self.topics[idx]).await;
        self.touch_topics();
        Ok(result?)
    }

    /// Flip selection of one topic. Ids outside the collection are ignored.
    pub fn toggle_selection(&mut self, id: TopicId) -> bool {
        self.sync_bulk_mode();
        if !self.contains(id) {
            tracing::debug!(topic_id = id, "Selection toggle for unknown topic");
            return false;
        }
        let selected = self.selection.toggle(id);
        self.mirror_selection();
        selected
    }

    /// Add each id to the selection without toggling. Returns the ids that
    /// are not in the collection.
    pub fn select_ids<I>(&mut self, ids: I) -> Vec<TopicId>
    where
        I: IntoIterator<Item = TopicId>,
    {
        self.sync_bulk_mode();
        let mut unknown = Vec::new();
        for id in ids {
            if self.contains(id) {
                self.selection.select(id);
            } else if !unknown.contains(&id) {
                unknown.push(id);
            }
        }
        self.mirror_selection();
        unknown
    }

    pub fn select_all(&mut self) {
        self.sync_bulk_mode();
        let ids: Vec<TopicId> = self.topics.iter().map(|t| t.id).collect();
        self.selection.select_all(ids);
        self.mirror_selection();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.mirror_selection();
    }

    /// Run `operation` over the current selection.
    pub async fn bulk_apply(&mut self, operation: BatchOperation) -> BatchOutcome {
        self.sync_bulk_mode();
        self.touch_topics();
        let outcome = self
            .mutator
            .apply_batch(&mut self.topics, &mut self.selection, operation, &self.gate)
            .await;
        self.touch_topics();
        self.mirror_selection();

        if outcome.reload_required {
            self.events.emit(GridEvent::ReloadRequested);
        }
        if !outcome.is_noop() && !outcome.aborted {
            self.events.notice(format!(
                "{}: {} succeeded, {} failed, {} unchanged",
                operation,
                outcome.succeeded.len(),
                outcome.failed.len(),
                outcome.skipped.len()
            ));
        }
        outcome
    }

    pub async fn bulk_follow(&mut self) -> BatchOutcome {
        self.bulk_apply(BatchOperation::Follow).await
    }

    pub async fn bulk_unfollow(&mut self) -> BatchOutcome {
        self.bulk_apply(BatchOperation::Unfollow).await
    }

    pub async fn bulk_close(&mut self) -> BatchOutcome {
        self.bulk_apply(BatchOperation::Close).await
    }

    pub async fn bulk_archive(&mut self) -> BatchOutcome {
        self.bulk_apply(BatchOperation::Archive).await
    }

    pub async fn bulk_unlist(&mut self) -> BatchOutcome {
        self.bulk_apply(BatchOperation::Unlist).await
    }

    pub async fn bulk_delete(&mut self) -> BatchOutcome {
        self.bulk_apply(BatchOperation::Delete).await
    }

    pub async fn bulk_reset_bump_date(&mut self) -> BatchOutcome {
        self.bulk_apply(BatchOperation::ResetBumpDate).await
    }

    /// Change one status flag on one topic through the single-topic endpoint.
    pub async fn set_topic_status(
        &mut self,
        id: TopicId,
        status: TopicStatus,
        enabled: bool,
    ) -> Result<(), GridError> {
        let Some(idx) = self.topic_index(id) else {
            return Err(GridError::UnknownTopic(id));
        };
        self.touch_topics();
        let result = self
            .mutator
            .set_status(&mut self.topics[idx], status, enabled)
            .await;
        self.touch_topics();
        Ok(result?)
    }

    /// Delete one topic through the single-topic endpoint. Returns `false`
    /// when the user declined.
    pub async fn delete_topic(&mut self, id: TopicId) -> Result<bool, GridError> {
        if !self.contains(id) {
            return Err(GridError::UnknownTopic(id));
        }
        let deleted = self.mutator.delete_one(id, &self.gate).await?;
        if deleted {
            self.events.emit(GridEvent::ReloadRequested);
        }
        Ok(deleted)
    }

    // ========================================================================
    // Tag Strip Gestures
    // ========================================================================

    fn gesture(&mut self, id: TopicId) -> &mut GestureDisambiguator {
        self.gestures.entry(id).or_default()
    }

    pub fn strip_pointer_down(&mut self, id: TopicId, x: f64, scroll_offset: f64) {
        self.gesture(id).pointer_down(x, scroll_offset);
    }

    pub fn strip_pointer_move(&mut self, id: TopicId, x: f64) -> MoveOutcome {
        match self.gestures.get_mut(&id) {
            Some(g) => g.pointer_move(x),
            None => MoveOutcome::default(),
        }
    }

    pub fn strip_pointer_up(&mut self, id: TopicId) {
        if let Some(g) = self.gestures.get_mut(&id) {
            g.pointer_up();
        }
    }

    pub fn strip_pointer_leave(&mut self, id: TopicId) {
        if let Some(g) = self.gestures.get_mut(&id) {
            g.pointer_leave();
        }
    }

    /// Evaluate a click on a strip. Tag navigation is emitted here; a
    /// `Propagate` outcome leaves card navigation to the host (via `visit`).
    pub fn strip_click(&mut self, id: TopicId, target: &ClickTarget) -> ClickOutcome {
        let outcome = self.gesture(id).click(target);
        if let ClickOutcome::NavigateTag(url) = &outcome {
            self.events.navigate(url.clone());
        }
        outcome
    }
}
