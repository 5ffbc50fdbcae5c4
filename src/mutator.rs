//! Optimistic mutations: apply locally, call the forum, reconcile.
//!
//! Batch follow/unfollow runs one request per topic, strictly in order. The
//! vote ledger is read-modify-write on the server, so concurrent requests for
//! topics in the same batch would race; do not turn the loop into a fan-out.
use crate::event::EventSink;
use crate::remote::{BatchOperation, ForumApi, RemoteError};
use crate::selection::SelectionStore;
use crate::topic::{Topic, TopicId, TopicStatus};

/// Yes/no gate in front of destructive operations.
#[allow(async_fn_in_trait)]
pub trait ConfirmGate {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Gate with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl ConfirmGate for AutoConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// What a batch run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub operation: BatchOperation,
    /// Topics the batch targeted.
    pub targets: Vec<TopicId>,
    pub succeeded: Vec<TopicId>,
    pub failed: Vec<TopicId>,
    /// Already in the desired state (follow/unfollow only).
    pub skipped: Vec<TopicId>,
    /// The collection must be reloaded from the host.
    pub reload_required: bool,
    /// The user declined confirmation; nothing was sent.
    pub aborted: bool,
}

impl BatchOutcome {
    fn new(operation: BatchOperation, targets: Vec<TopicId>) -> Self {
        Self {
            operation,
            targets,
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            reload_required: false,
            aborted: false,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.targets.is_empty()
    }

    /// At least one target's remote call failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct OptimisticMutator<A> {
    api: A,
    events: EventSink,
}

impl<A: ForumApi> OptimisticMutator<A> {
    pub fn new(api: A, events: EventSink) -> Self {
        Self { api, events }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    // ========================================================================
    // Single Vote
    // ========================================================================

    /// Flip the user's vote on `topic`.
    ///
    /// The flag and count change before the request goes out. On failure both
    /// are restored to their exact prior values and the error is reported.
    /// Returns the new voted state.
    pub async fn toggle_vote(&self, topic: &mut Topic) -> Result<bool, RemoteError> {
        let topic_id = topic.id;
        let prior_voted = topic.user_voted;
        let prior_count = topic.vote_count;
        let target = !prior_voted;

        if target {
            topic.record_vote();
        } else {
            topic.record_unvote();
        }

        let result = if target {
            self.api.vote(topic_id).await
        } else {
            self.api.unvote(topic_id).await
        };

        match result {
            Ok(()) => {
                tracing::debug!(topic_id, voted = target, count = topic.vote_count, "Vote saved");
                Ok(target)
            }
            Err(e) => {
                tracing::warn!(
                    topic_id,
                    error = %e,
                    prior_voted,
                    prior_count,
                    "Vote toggle failed, rolling back"
                );
                topic.set_voted(prior_voted);
                topic.set_vote_count(prior_count);
                let action = if target { "follow" } else { "unfollow" };
                self.events
                    .error(&format!("Failed to {} topic {}", action, topic_id), &e);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Batch Operations
    // ========================================================================

    /// Apply `operation` to every selected topic.
    ///
    /// Targets are taken in collection order. Delete asks `gate` first; a
    /// decline sends nothing and keeps the selection. Otherwise the selection
    /// is cleared at the end whatever the outcome.
    pub async fn apply_batch<G: ConfirmGate>(
        &self,
        topics: &mut [Topic],
        selection: &mut SelectionStore,
        operation: BatchOperation,
        gate: &G,
    ) -> BatchOutcome {
        let targets: Vec<TopicId> = topics
            .iter()
            .map(|t| t.id)
            .filter(|id| selection.is_selected(*id))
            .collect();
        let mut outcome = BatchOutcome::new(operation, targets);

        if outcome.targets.is_empty() {
            tracing::debug!(%operation, "Batch requested with empty selection");
            return outcome;
        }

        if operation == BatchOperation::Delete {
            let prompt = format!(
                "Delete {} selected topic{}?",
                outcome.targets.len(),
                if outcome.targets.len() == 1 { "" } else { "s" }
            );
            if !gate.confirm(&prompt).await {
                tracing::info!(count = outcome.targets.len(), "Batch delete declined");
                outcome.aborted = true;
                return outcome;
            }
        }

        tracing::info!(%operation, count = outcome.targets.len(), "Applying batch operation");

        match operation {
            BatchOperation::Follow => self.vote_each(topics, true, &mut outcome).await,
            BatchOperation::Unfollow => self.vote_each(topics, false, &mut outcome).await,
            _ => self.bulk_update(topics, &mut outcome).await,
        }

        selection.clear();

        if !outcome.failed.is_empty() {
            tracing::warn!(
                %operation,
                succeeded = outcome.succeeded.len(),
                failed = outcome.failed.len(),
                "Batch operation finished with failures"
            );
        }
        outcome
    }

    /// Sequential per-topic vote calls. A failure is reported and the loop
    /// moves on to the next topic.
    async fn vote_each(&self, topics: &mut [Topic], follow: bool, outcome: &mut BatchOutcome) {
        let targets = outcome.targets.clone();
        for topic_id in targets {
            let Some(topic) = topics.iter_mut().find(|t| t.id == topic_id) else {
                continue;
            };
            if topic.user_voted == follow {
                outcome.skipped.push(topic_id);
                continue;
            }

            let result = if follow {
                self.api.vote(topic_id).await
            } else {
                self.api.unvote(topic_id).await
            };

            match result {
                Ok(()) => {
                    if follow {
                        topic.record_vote();
                    } else {
                        topic.record_unvote();
                    }
                    outcome.succeeded.push(topic_id);
                }
                Err(e) => {
                    tracing::warn!(topic_id, error = %e, follow, "Batch vote call failed");
                    let action = if follow { "follow" } else { "unfollow" };
                    self.events
                        .error(&format!("Failed to {} topic {}", action, topic_id), &e);
                    outcome.failed.push(topic_id);
                }
            }
        }
    }

    /// One bulk request for the whole target list, then local flags.
    async fn bulk_update(&self, topics: &mut [Topic], outcome: &mut BatchOutcome) {
        let Some(kind) = outcome.operation.bulk_type() else {
            return;
        };

        match self.api.bulk(&outcome.targets, kind).await {
            Ok(()) => {
                for topic in topics.iter_mut() {
                    if !outcome.targets.contains(&topic.id) {
                        continue;
                    }
                    match outcome.operation {
                        BatchOperation::Close => topic.set_closed(true),
                        BatchOperation::Archive => topic.set_archived(true),
                        BatchOperation::Unlist => topic.set_visible(false),
                        _ => {}
                    }
                }
                outcome.succeeded = outcome.targets.clone();
                outcome.reload_required = outcome.operation == BatchOperation::Delete;
            }
            Err(e) => {
                self.events.error(
                    &format!(
                        "Failed to {} {} topics",
                        outcome.operation,
                        outcome.targets.len()
                    ),
                    &e,
                );
                outcome.failed = outcome.targets.clone();
            }
        }
    }

    // ========================================================================
    // Single-Topic Status and Delete
    // ========================================================================

    /// Set one status flag on one topic, optimistically.
    pub async fn set_status(
        &self,
        topic: &mut Topic,
        status: TopicStatus,
        enabled: bool,
    ) -> Result<(), RemoteError> {
        let prior = topic.status(status);
        topic.apply_status(status, enabled);

        if let Err(e) = self.api.set_status(topic.id, status, enabled).await {
            tracing::warn!(
                topic_id = topic.id,
                status = status.as_str(),
                error = %e,
                "Status change failed, rolling back"
            );
            topic.apply_status(status, prior);
            self.events.error(
                &format!("Failed to update {} on topic {}", status.as_str(), topic.id),
                &e,
            );
            return Err(e);
        }
        Ok(())
    }

    /// Delete one topic after confirmation.
    ///
    /// Returns `Ok(true)` when deleted (the collection then needs a reload),
    /// `Ok(false)` when the user declined.
    pub async fn delete_one<G: ConfirmGate>(
        &self,
        topic_id: TopicId,
        gate: &G,
    ) -> Result<bool, RemoteError> {
        if !gate.confirm(&format!("Delete topic {}?", topic_id)).await {
            return Ok(false);
        }
        match self.api.delete_topic(topic_id).await {
            Ok(()) => Ok(true),
            Err(e) => {
                self.events
                    .error(&format!("Failed to delete topic {}", topic_id), &e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::GridEvent;
    use crate::remote::fake::{Call, FakeApi};
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn mutator(api: FakeApi) -> (OptimisticMutator<FakeApi>, UnboundedReceiver<GridEvent>) {
        let (sink, rx) = EventSink::channel();
        (OptimisticMutator::new(api, sink), rx)
    }

    fn topic(id: TopicId, voted: bool, count: u32) -> Topic {
        Topic {
            id,
            user_voted: voted,
            vote_count: count,
            ..Default::default()
        }
    }

    fn selected(ids: &[TopicId]) -> SelectionStore {
        let mut store = SelectionStore::new();
        store.set_bulk_mode(true);
        store.select_all(ids.iter().copied());
        store
    }

    fn drain(rx: &mut UnboundedReceiver<GridEvent>) -> Vec<GridEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[tokio::test]
    async fn test_toggle_vote_success_follows() {
        let (m, _rx) = mutator(FakeApi::default());
        let mut t = topic(1, false, 5);
        assert!(m.toggle_vote(&mut t).await.unwrap());
        assert!(t.user_voted);
        assert_eq!(t.vote_count, 6);
        assert_eq!(m.api().calls(), vec![Call::Vote(1)]);
    }

    #[tokio::test]
    async fn test_toggle_vote_unfollow_uses_unvote() {
        let (m, _rx) = mutator(FakeApi::default());
        let mut t = topic(1, true, 1);
        assert!(!m.toggle_vote(&mut t).await.unwrap());
        assert_eq!(t.vote_count, 0);
        assert_eq!(m.api().calls(), vec![Call::Unvote(1)]);
    }

    #[tokio::test]
    async fn test_toggle_vote_failure_restores_flag_and_count() {
        let (m, mut rx) = mutator(FakeApi::failing_for(&[1]));
        let mut t = topic(1, false, 5);
        assert!(m.toggle_vote(&mut t).await.is_err());
        assert!(!t.user_voted);
        assert_eq!(t.vote_count, 5);
        assert!(matches!(drain(&mut rx).as_slice(), [GridEvent::Error { .. }]));
    }

    #[tokio::test]
    async fn test_toggle_vote_failure_restores_zero_floor() {
        let (m, _rx) = mutator(FakeApi::failing_for(&[1]));
        // Inconsistent remote data: voted but count 0.
        let mut t = topic(1, true, 0);
        assert!(m.toggle_vote(&mut t).await.is_err());
        assert!(t.user_voted);
        assert_eq!(t.vote_count, 0);
    }

    #[tokio::test]
    async fn test_batch_follow_continues_past_failure() {
        let (m, mut rx) = mutator(FakeApi::failing_for(&[2]));
        let mut topics = vec![topic(1, false, 0), topic(2, false, 4), topic(3, false, 9)];
        let mut sel = selected(&[1, 2, 3]);

        let out = m
            .apply_batch(&mut topics, &mut sel, BatchOperation::Follow, &AutoConfirm(true))
            .await;

        assert_eq!(out.succeeded, vec![1, 3]);
        assert_eq!(out.failed, vec![2]);
        assert!(out.has_failures());
        assert_eq!((topics[0].user_voted, topics[0].vote_count), (true, 1));
        assert_eq!((topics[1].user_voted, topics[1].vote_count), (false, 4));
        assert_eq!((topics[2].user_voted, topics[2].vote_count), (true, 10));
        assert!(sel.is_empty());
        assert_eq!(
            m.api().calls(),
            vec![Call::Vote(1), Call::Vote(2), Call::Vote(3)]
        );
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_batch_unfollow_skips_topics_already_unfollowed() {
        let (m, _rx) = mutator(FakeApi::default());
        let mut topics = vec![topic(1, true, 3), topic(2, false, 0)];
        let mut sel = selected(&[1, 2]);

        let out = m
            .apply_batch(&mut topics, &mut sel, BatchOperation::Unfollow, &AutoConfirm(true))
            .await;

        assert_eq!(out.succeeded, vec![1]);
        assert_eq!(out.skipped, vec![2]);
        assert_eq!(m.api().calls(), vec![Call::Unvote(1)]);
        assert_eq!(topics[0].vote_count, 2);
    }

    #[tokio::test]
    async fn test_empty_selection_is_noop() {
        let (m, _rx) = mutator(FakeApi::default());
        let mut topics = vec![topic(1, false, 0)];
        let mut sel = selected(&[]);

        let out = m
            .apply_batch(&mut topics, &mut sel, BatchOperation::Close, &AutoConfirm(true))
            .await;

        assert!(out.is_noop());
        assert!(m.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_close_sets_flags_in_one_call() {
        let (m, _rx) = mutator(FakeApi::default());
        let mut topics = vec![topic(1, false, 0), topic(2, false, 0), topic(3, false, 0)];
        let mut sel = selected(&[1, 3]);

        let out = m
            .apply_batch(&mut topics, &mut sel, BatchOperation::Close, &AutoConfirm(true))
            .await;

        assert_eq!(out.succeeded, vec![1, 3]);
        assert!(!out.has_failures());
        assert!(topics[0].closed && !topics[1].closed && topics[2].closed);
        assert_eq!(m.api().calls(), vec![Call::Bulk(vec![1, 3], "close".into())]);
        assert!(sel.is_empty());
    }

    #[tokio::test]
    async fn test_batch_unlist_and_archive_flags() {
        let (m, _rx) = mutator(FakeApi::default());
        let mut topics = vec![topic(1, false, 0)];

        let mut sel = selected(&[1]);
        m.apply_batch(&mut topics, &mut sel, BatchOperation::Unlist, &AutoConfirm(true))
            .await;
        assert!(!topics[0].visible);

        let mut sel = selected(&[1]);
        m.apply_batch(&mut topics, &mut sel, BatchOperation::Archive, &AutoConfirm(true))
            .await;
        assert!(topics[0].archived);
    }

    #[tokio::test]
    async fn test_batch_bulk_failure_reports_and_clears() {
        let api = FakeApi {
            fail_bulk: true,
            ..Default::default()
        };
        let (m, mut rx) = mutator(api);
        let mut topics = vec![topic(1, false, 0)];
        let mut sel = selected(&[1]);

        let out = m
            .apply_batch(&mut topics, &mut sel, BatchOperation::Archive, &AutoConfirm(true))
            .await;

        assert_eq!(out.failed, vec![1]);
        assert!(out.has_failures());
        assert!(!topics[0].archived);
        assert!(sel.is_empty());
        assert!(matches!(drain(&mut rx).as_slice(), [GridEvent::Error { .. }]));
    }

    #[tokio::test]
    async fn test_delete_declined_sends_nothing() {
        let (m, _rx) = mutator(FakeApi::default());
        let mut topics = vec![topic(1, false, 0), topic(2, false, 0)];
        let before = topics.clone();
        let mut sel = selected(&[1, 2]);

        let out = m
            .apply_batch(&mut topics, &mut sel, BatchOperation::Delete, &AutoConfirm(false))
            .await;

        assert!(out.aborted);
        assert!(m.api().calls().is_empty());
        assert_eq!(topics, before);
        assert_eq!(sel.count(), 2);
    }

    #[tokio::test]
    async fn test_delete_confirmed_requires_reload() {
        let (m, _rx) = mutator(FakeApi::default());
        let mut topics = vec![topic(1, false, 0)];
        let mut sel = selected(&[1]);

        let out = m
            .apply_batch(&mut topics, &mut sel, BatchOperation::Delete, &AutoConfirm(true))
            .await;

        assert!(out.reload_required);
        assert_eq!(m.api().calls(), vec![Call::Bulk(vec![1], "delete".into())]);
    }

    #[tokio::test]
    async fn test_reset_bump_date_has_no_local_flag() {
        let (m, _rx) = mutator(FakeApi::default());
        let mut topics = vec![topic(1, false, 0)];
        let before = topics.clone();
        let mut sel = selected(&[1]);

        let out = m
            .apply_batch(&mut topics, &mut sel, BatchOperation::ResetBumpDate, &AutoConfirm(true))
            .await;

        assert_eq!(out.succeeded, vec![1]);
        assert!(!out.reload_required);
        assert_eq!(topics, before);
        assert_eq!(
            m.api().calls(),
            vec![Call::Bulk(vec![1], "reset_bump_dates".into())]
        );
    }

    #[tokio::test]
    async fn test_set_status_rolls_back_on_failure() {
        let (m, _rx) = mutator(FakeApi::failing_for(&[4]));
        let mut t = topic(4, false, 0);
        assert!(m.set_status(&mut t, TopicStatus::Closed, true).await.is_err());
        assert!(!t.closed);
    }

    #[tokio::test]
    async fn test_set_status_success() {
        let (m, _rx) = mutator(FakeApi::default());
        let mut t = topic(4, false, 0);
        m.set_status(&mut t, TopicStatus::Visible, false).await.unwrap();
        assert!(!t.visible);
        assert_eq!(
            m.api().calls(),
            vec![Call::Status(4, TopicStatus::Visible, false)]
        );
    }

    #[tokio::test]
    async fn test_delete_one_respects_gate() {
        let (m, _rx) = mutator(FakeApi::default());
        assert!(!m.delete_one(7, &AutoConfirm(false)).await.unwrap());
        assert!(m.api().calls().is_empty());
        assert!(m.delete_one(7, &AutoConfirm(true)).await.unwrap());
        assert_eq!(m.api().calls(), vec![Call::Delete(7)]);
    }
}
