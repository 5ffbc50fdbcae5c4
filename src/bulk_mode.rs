//! The single channel through which the host reports bulk selection mode.
//!
//! Hosts expose bulk mode in different ways (a toggle service, a page class,
//! an event). The integration layer adapts whichever one exists to
//! [`BulkModeSignal`]; the grid only ever talks to this trait and never polls.
use tokio::sync::watch;

/// Host capability reporting whether bulk selection mode is active.
pub trait BulkModeSignal {
    /// Value at the time of the call.
    fn current(&self) -> bool;

    /// Register for change notifications. Dropping the returned handle
    /// unsubscribes.
    fn subscribe(&self) -> BulkModeSubscription;
}

/// Change feed for bulk mode. Dropping it ends the subscription.
#[derive(Debug)]
pub struct BulkModeSubscription {
    rx: Option<watch::Receiver<bool>>,
}

impl BulkModeSubscription {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A subscription that never reports a change.
    pub fn inert() -> Self {
        Self { rx: None }
    }

    /// Latest value if a change arrived since the last observation.
    ///
    /// Never blocks.
    pub fn take_change(&mut self) -> Option<bool> {
        let rx = self.rx.as_mut()?;
        match rx.has_changed() {
            Ok(true) => Some(*rx.borrow_and_update()),
            Ok(false) => None,
            Err(_) => {
                tracing::debug!("Bulk mode signal closed, dropping subscription");
                self.rx = None;
                None
            }
        }
    }

    /// Wait for the next change. Returns `None` once the host side is gone.
    pub async fn changed(&mut self) -> Option<bool> {
        let rx = self.rx.as_mut()?;
        match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => {
                self.rx = None;
                None
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }
}

/// Adapter backed by a watch channel the integration layer toggles.
#[derive(Debug, Clone)]
pub struct WatchBulkMode {
    tx: watch::Sender<bool>,
}

impl WatchBulkMode {
    pub fn new(initial: bool) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new value; subscribers are notified only on actual change.
    pub fn set(&self, enabled: bool) {
        self.tx.send_if_modified(|current| {
            if *current == enabled {
                false
            } else {
                *current = enabled;
                true
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl BulkModeSignal for WatchBulkMode {
    fn current(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> BulkModeSubscription {
        BulkModeSubscription::new(self.tx.subscribe())
    }
}

/// Fixed value, for hosts without a bulk selection feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticBulkMode(pub bool);

impl BulkModeSignal for StaticBulkMode {
    fn current(&self) -> bool {
        self.0
    }

    fn subscribe(&self) -> BulkModeSubscription {
        BulkModeSubscription::inert()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_change_only_reports_changes() {
        let signal = WatchBulkMode::new(false);
        let mut sub = signal.subscribe();
        assert_eq!(sub.take_change(), None);

        signal.set(true);
        assert_eq!(sub.take_change(), Some(true));
        assert_eq!(sub.take_change(), None);
    }

    #[test]
    fn test_setting_same_value_does_not_notify() {
        let signal = WatchBulkMode::new(true);
        let mut sub = signal.subscribe();
        signal.set(true);
        assert_eq!(sub.take_change(), None);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let signal = WatchBulkMode::new(false);
        let sub = signal.subscribe();
        assert_eq!(signal.subscriber_count(), 1);
        drop(sub);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn test_closed_signal_deactivates() {
        let signal = WatchBulkMode::new(false);
        let mut sub = signal.subscribe();
        drop(signal);
        assert_eq!(sub.take_change(), None);
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn test_changed_waits_for_update() {
        let signal = WatchBulkMode::new(false);
        let mut sub = signal.subscribe();
        let setter = signal.clone();
        tokio::spawn(async move {
            setter.set(true);
        });
        assert_eq!(sub.changed().await, Some(true));
    }

    #[test]
    fn test_static_signal() {
        let signal = StaticBulkMode(true);
        assert!(signal.current());
        assert!(!signal.subscribe().is_active());
    }
}
