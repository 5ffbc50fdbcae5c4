//! Notifications from the grid to its host.
//!
//! The grid never presents errors or navigates by itself; it emits a
//! [`GridEvent`] and the host decides how to show it. All remote failures go
//! through [`EventSink::error`] so the user sees them in one consistent place.
use std::fmt::Display;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridEvent {
    /// Route the host to `url`.
    Navigate { url: String },
    /// A remote call failed; show `message` in the host's error channel.
    Error { message: String },
    /// The topic collection must be fetched again (after deletions).
    ReloadRequested,
    /// Informational status line.
    Notice { message: String },
}

/// Sending half of the host notification channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<GridEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<GridEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiver the host drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GridEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: GridEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(event = ?e.0, "Channel send failed (receiver dropped)");
        }
    }

    /// Report a failed action to the user.
    pub fn error(&self, action: &str, err: &impl Display) {
        self.emit(GridEvent::Error {
            message: format!("{}: {}", action, err),
        });
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.emit(GridEvent::Notice {
            message: message.into(),
        });
    }

    pub fn navigate(&self, url: impl Into<String>) {
        self.emit(GridEvent::Navigate { url: url.into() });
    }
}
