//! View-state and optimistic-update engine for a grid of followed forum topics.
//!
//! - [`projector`] turns raw [`topic::Topic`] records into display cards
//! - [`selection`] holds the bulk-selection set and its version token
//! - [`bulk_mode`] is the one channel through which the host reports bulk mode
//! - [`gesture`] tells a drag on a tag strip apart from a tap
//! - [`mutator`] applies vote and batch changes optimistically against [`remote`]
//! - [`controller`] wires them together for the host

pub mod bulk_mode;
pub mod config;
pub mod controller;
pub mod event;
pub mod gesture;
pub mod mutator;
pub mod projector;
pub mod remote;
pub mod selection;
pub mod topic;
pub mod util;

pub use controller::{GridController, GridError};
pub use event::{EventSink, GridEvent};
pub use remote::{BatchOperation, ForumApi, HttpForumApi, RemoteError};
pub use topic::{Topic, TopicId};
