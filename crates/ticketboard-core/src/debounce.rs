//! Per-ticket notes debouncing
//!
//! Each keystroke in a notes field reschedules a single save for that ticket.
//! Only when the field has been quiet for the configured period is the latest
//! text written. Rescheduling aborts the previous task, whether it is still
//! waiting or already in flight, so an older write can never land after a
//! newer one is issued.

use crate::events::{BoardEvent, EventBus};
use crate::persist::{run_batch, BatchOutcome};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use ticketboard_model::{BoardError, EntityKind, StoreError, TicketId, TicketPatch};
use ticketboard_store::BoardGateway;
use tokio::task::JoinHandle;

#[derive(Debug)]
struct PendingSave {
    generation: u64,
    notes: String,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
struct Inner {
    gateway: Arc<dyn BoardGateway>,
    quiet: Duration,
    pending: DashMap<TicketId, PendingSave>,
    generation: AtomicU64,
    events: EventBus,
}

impl Inner {
    async fn save(&self, id: TicketId, notes: String) -> Result<(), StoreError> {
        match self
            .gateway
            .update_ticket(id, TicketPatch::new().with_notes(notes))
            .await
        {
            Ok(_) => {
                tracing::debug!(ticket = %id, "notes saved");
                Ok(())
            }
            Err(error) => {
                tracing::error!(ticket = %id, %error, "notes save failed");
                self.events
                    .emit(BoardEvent::persist_failed(EntityKind::Ticket, id, &error));
                Err(error)
            }
        }
    }
}

/// Debounced notes writer
#[derive(Debug, Clone)]
pub struct NotesDebouncer {
    inner: Arc<Inner>,
}

impl NotesDebouncer {
    /// Create a debouncer writing through `gateway`
    #[must_use]
    pub fn new(gateway: Arc<dyn BoardGateway>, quiet: Duration, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                quiet,
                pending: DashMap::new(),
                generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// Quiet period before a save fires
    #[inline]
    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet
    }

    /// (Re)schedule a save of `notes` for one ticket
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, id: TicketId, notes: String) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);

        // Holding the entry keeps the new task from clearing its slot before
        // the slot exists.
        let previous = match self.inner.pending.entry(id) {
            Entry::Occupied(mut slot) => {
                let handle = self.spawn_save(id, notes.clone(), generation);
                Some(slot.insert(PendingSave {
                    generation,
                    notes,
                    handle,
                }))
            }
            Entry::Vacant(slot) => {
                let handle = self.spawn_save(id, notes.clone(), generation);
                slot.insert(PendingSave {
                    generation,
                    notes,
                    handle,
                });
                None
            }
        };

        if let Some(previous) = previous {
            previous.handle.abort();
            tracing::trace!(ticket = %id, "notes save rescheduled");
        }
    }

    fn spawn_save(&self, id: TicketId, notes: String, generation: u64) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.quiet).await;
            let _ = inner.save(id, notes).await;
            inner
                .pending
                .remove_if(&id, |_, pending| pending.generation == generation);
        })
    }

    /// Drop any pending save for a ticket
    ///
    /// Returns whether one was pending.
    pub fn cancel(&self, id: TicketId) -> bool {
        match self.inner.pending.remove(&id) {
            Some((_, pending)) => {
                pending.handle.abort();
                tracing::debug!(ticket = %id, "pending notes save cancelled");
                true
            }
            None => false,
        }
    }

    /// Drop every pending save
    pub fn cancel_all(&self) {
        let ids: Vec<TicketId> = self.inner.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.cancel(id);
        }
    }

    /// Number of tickets with a save pending or in flight
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.pending.len()
    }

    /// Latest text waiting to be saved for a ticket
    #[must_use]
    pub fn pending_notes(&self, id: TicketId) -> Option<String> {
        self.inner.pending.get(&id).map(|p| p.notes.clone())
    }

    /// Write every pending save now instead of waiting out the quiet period
    ///
    /// # Errors
    /// - `BoardError::Persistence` / `BoardError::PartialPersistence` for
    ///   failed writes
    pub async fn flush(&self) -> Result<(), BoardError> {
        let ids: Vec<TicketId> = self.inner.pending.iter().map(|e| *e.key()).collect();
        let drained: Vec<(TicketId, String)> = ids
            .into_iter()
            .filter_map(|id| self.inner.pending.remove(&id))
            .map(|(id, pending)| {
                pending.handle.abort();
                (id, pending.notes)
            })
            .collect();

        if drained.is_empty() {
            return Ok(());
        }

        tracing::debug!(count = drained.len(), "flushing pending notes");
        let outcome: BatchOutcome = run_batch(
            drained
                .into_iter()
                .map(|(id, notes)| self.inner.save(id, notes)),
        )
        .await;
        outcome.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketboard_model::{NewTicket, TicketColor};
    use ticketboard_store::{GatewayCall, GatewayOp, MemoryGateway};

    async fn setup(quiet_ms: u64) -> (Arc<MemoryGateway>, NotesDebouncer, TicketId) {
        let gateway = Arc::new(MemoryGateway::new());
        let ticket = gateway
            .create_ticket(NewTicket {
                ticket_number: 10,
                color: TicketColor::default(),
                notes: String::new(),
                current_step_id: None,
                order_index: None,
            })
            .await
            .unwrap();
        gateway.clear_journal();
        let debouncer = NotesDebouncer::new(
            gateway.clone(),
            Duration::from_millis(quiet_ms),
            EventBus::new(16),
        );
        (gateway, debouncer, ticket.id)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_writes_last_text_once() {
        let (gateway, debouncer, id) = setup(400).await;

        for text in ["a", "ab", "abc"] {
            debouncer.schedule(id, text.to_string());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(gateway.count(GatewayOp::UpdateTicket), 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            gateway.journal(),
            vec![GatewayCall::UpdateTicket(id, TicketPatch::new().with_notes("abc"))]
        );
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_write() {
        let (gateway, debouncer, id) = setup(400).await;
        debouncer.schedule(id, "gone".to_string());
        assert!(debouncer.cancel(id));
        assert!(!debouncer.cancel(id));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(gateway.count(GatewayOp::UpdateTicket), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_immediately() {
        let (gateway, debouncer, id) = setup(400).await;
        debouncer.schedule(id, "now".to_string());
        assert_eq!(debouncer.pending_notes(id).as_deref(), Some("now"));

        debouncer.flush().await.unwrap();
        assert_eq!(gateway.count(GatewayOp::UpdateTicket), 1);
        assert_eq!(gateway.state().tickets[0].notes, "now");

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(gateway.count(GatewayOp::UpdateTicket), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_is_reported() {
        let (gateway, debouncer, id) = setup(10).await;
        let mut events = debouncer.inner.events.subscribe();
        gateway.fail_ticket(id);

        debouncer.schedule(id, "lost".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(
            events.recv().await.unwrap(),
            BoardEvent::PersistFailed { entity: EntityKind::Ticket, .. }
        ));
        assert_eq!(debouncer.pending(), 0);
    }
}
