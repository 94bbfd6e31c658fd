//! Change notifications
//!
//! Registries publish on a broadcast channel after every local mutation, so
//! views can re-render from the mirror. Sends never fail: an event with no
//! subscribers is dropped.

use std::fmt;
use ticketboard_model::{EntityKind, StepId, StoreError};
use tokio::sync::broadcast;

/// Something observers should react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// Ticket mirror changed
    TicketsChanged,
    /// Step mirror changed (added, removed, reordered or reloaded)
    StepsChanged,
    /// Step label changed; ticket rows showing it should re-render
    StepRenamed { id: StepId, name: String },
    /// A write to the store failed
    PersistFailed {
        entity: EntityKind,
        id: String,
        message: String,
    },
}

impl BoardEvent {
    /// Failure event for one entity
    #[must_use]
    pub fn persist_failed(entity: EntityKind, id: impl fmt::Display, error: &StoreError) -> Self {
        Self::PersistFailed {
            entity,
            id: id.to_string(),
            message: error.to_string(),
        }
    }
}

/// Broadcast hub shared by the registries
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BoardEvent>,
}

impl EventBus {
    /// Create a hub buffering `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event
    pub fn emit(&self, event: BoardEvent) {
        tracing::trace!(?event, "board event");
        let _ = self.sender.send(event);
    }

    /// Listen for future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.sender.subscribe()
    }
}
