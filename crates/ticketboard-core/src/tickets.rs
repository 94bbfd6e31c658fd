//! Ticket registry
//!
//! Owns the ordered local mirror of tickets and the numbering policy. Every
//! mutation follows the same pattern:
//! 1. Validate against the mirror (nothing changes on failure)
//! 2. Apply the change locally and publish [`BoardEvent::TicketsChanged`]
//! 3. Persist through the gateway, joining batches of calls
//!
//! Creation is the exception: the gateway assigns ids, so the record is
//! persisted first and enters the mirror only once the store has accepted it.
//!
//! When a persistence call fails, the mirror keeps the optimistic value unless
//! the configured [`WritePolicy`] asks for a rollback. Index renumbering,
//! bulk operations and step cascades never roll back.

use crate::config::{BoardConfig, WritePolicy};
use crate::debounce::NotesDebouncer;
use crate::events::{BoardEvent, EventBus};
use crate::persist::{run_batch, BatchOutcome};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use ticketboard_model::order::{self, Axis, IndexChange, Point, Rect};
use ticketboard_model::{
    BoardError, Direction, EntityKind, NewTicket, NumberingMode, NumberingPolicy, StepId,
    StoreError, Ticket, TicketColor, TicketId, TicketPatch, ValidationError,
};
use ticketboard_store::{BoardGateway, Deletion};

/// Registry of tickets
#[derive(Debug)]
pub struct TicketRegistry {
    gateway: Arc<dyn BoardGateway>,
    tickets: Mutex<Vec<Ticket>>,
    numbering: Mutex<NumberingPolicy>,
    debouncer: NotesDebouncer,
    events: EventBus,
    policy: WritePolicy,
}

impl TicketRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new(gateway: Arc<dyn BoardGateway>, config: &BoardConfig, events: EventBus) -> Self {
        let mut numbering = NumberingPolicy::new(NumberingMode::default())
            .with_max_attempts(config.max_random_attempts);
        if let Some(seed) = config.seed {
            numbering = numbering.with_seed(seed);
        }

        Self {
            debouncer: NotesDebouncer::new(
                Arc::clone(&gateway),
                config.notes_quiet_period(),
                events.clone(),
            ),
            gateway,
            tickets: Mutex::new(Vec::new()),
            numbering: Mutex::new(numbering),
            events,
            policy: config.write_policy,
        }
    }

    /// Replace the mirror with the store's tickets
    ///
    /// Loaded numbers join the used set; numbers already there are kept.
    /// Gaps or duplicates in the stored `order_index` values are closed up
    /// and the corrected indices are written back.
    ///
    /// # Errors
    /// - `BoardError::Persistence` if listing fails (the mirror is untouched)
    /// - `BoardError::PartialPersistence` if writing corrected indices fails
    pub async fn load(&self) -> Result<(), BoardError> {
        let mut loaded = self.gateway.list_tickets().await?;
        loaded.sort_by_key(|t| t.order_index);
        let changes = order::reindex(&mut loaded);

        self.numbering
            .lock()
            .seed_used(loaded.iter().map(|t| t.ticket_number));
        let count = loaded.len();
        *self.tickets.lock() = loaded;

        tracing::debug!(count, repaired = changes.len(), "tickets loaded");
        self.events.emit(BoardEvent::TicketsChanged);
        self.persist_indices(changes).await.into_result()
    }

    /// Tickets in display order
    #[must_use]
    pub fn list(&self) -> Vec<Ticket> {
        self.tickets.lock().clone()
    }

    /// Ticket ids in display order
    #[must_use]
    pub fn ids(&self) -> Vec<TicketId> {
        self.tickets.lock().iter().map(|t| t.id).collect()
    }

    /// Look up one ticket
    #[must_use]
    pub fn get(&self, id: TicketId) -> Option<Ticket> {
        self.tickets.lock().iter().find(|t| t.id == id).cloned()
    }

    /// Number of tickets
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.lock().len()
    }

    /// Check if the board has no tickets
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.lock().is_empty()
    }

    /// Current numbering mode
    #[must_use]
    pub fn numbering_mode(&self) -> NumberingMode {
        self.numbering.lock().mode()
    }

    /// Switch numbering mode locally
    pub fn set_numbering_mode(&self, mode: NumberingMode) {
        self.numbering.lock().set_mode(mode);
    }

    /// Every number issued so far, including those of deleted tickets
    #[must_use]
    pub fn used_numbers(&self) -> BTreeSet<u32> {
        self.numbering.lock().used().collect()
    }

    /// Forget every issued number; the next load reseeds from the store
    pub fn reset_numbers(&self) {
        self.numbering.lock().clear();
    }

    /// Create a ticket
    ///
    /// Without an explicit `number` the numbering policy issues one. The
    /// ticket goes at `index` (clamped), or at the end.
    ///
    /// # Errors
    /// - `ValidationError::InvalidNumber` / `DuplicateNumber` for a bad number
    /// - `BoardError::Persistence` if the store rejects the create; the
    ///   mirror and the used set are left as they were
    /// - `BoardError::PartialPersistence` if shifting neighbours fails; the
    ///   ticket itself exists
    pub async fn create(
        &self,
        number: Option<u32>,
        color: TicketColor,
        notes: impl Into<String>,
        step: Option<StepId>,
        index: Option<usize>,
    ) -> Result<Ticket, BoardError> {
        let number = {
            let mut numbering = self.numbering.lock();
            match number {
                Some(n) => {
                    numbering.claim(n)?;
                    n
                }
                None => numbering.next_number(),
            }
        };
        let len = self.len();
        let position = index.map_or(len, |i| i.min(len));

        let fields = NewTicket {
            ticket_number: number,
            color,
            notes: notes.into(),
            current_step_id: step,
            order_index: Some(order::to_index(position)),
        };
        let created = match self.gateway.create_ticket(fields).await {
            Ok(ticket) => ticket,
            Err(error) => {
                self.numbering.lock().release(number);
                tracing::error!(number, %error, "ticket create failed");
                return Err(error.into());
            }
        };

        let (ticket, changes) = {
            let mut tickets = self.tickets.lock();
            let position = position.min(tickets.len());
            let changes = order::insert_at(&mut *tickets, created, position);
            (tickets[position].clone(), changes)
        };

        tracing::info!(ticket = %ticket.id, number = ticket.ticket_number, "ticket created");
        self.events.emit(BoardEvent::TicketsChanged);
        self.persist_indices(changes).await.into_result()?;
        Ok(ticket)
    }

    /// Apply a partial update and persist it
    ///
    /// A number change is validated against the used set first. Notes in the
    /// patch replace any pending debounced save for the ticket. Position is
    /// owned by [`TicketRegistry::move_to`]; an `order_index` in the patch is
    /// ignored. Step references are not checked here; use
    /// [`TicketRegistry::set_step`] for that.
    ///
    /// # Errors
    /// - `BoardError::NotFound` if the ticket is not in the mirror
    /// - `ValidationError::InvalidNumber` / `DuplicateNumber` for a bad number
    /// - `BoardError::Persistence` if the store rejects the write
    pub async fn update(&self, id: TicketId, mut patch: TicketPatch) -> Result<Ticket, BoardError> {
        if patch.order_index.take().is_some() {
            tracing::warn!(ticket = %id, "ignoring order_index in ticket update");
        }

        let (updated, undo) = {
            let mut numbering = self.numbering.lock();
            let mut tickets = self.tickets.lock();
            let ticket = tickets
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| BoardError::ticket_not_found(id))?;
            if let Some(number) = patch.ticket_number {
                numbering.replace(ticket.ticket_number, number)?;
            }
            let undo = ticket.apply(&patch);
            (ticket.clone(), undo)
        };
        if patch.notes.is_some() {
            // A pending debounced save holds older text.
            self.debouncer.cancel(id);
        }
        self.events.emit(BoardEvent::TicketsChanged);

        if let Err(error) = self.persist(id, patch).await {
            if self.policy.rolls_back() {
                self.revert(id, undo);
            }
            return Err(error.into());
        }
        Ok(updated)
    }

    fn revert(&self, id: TicketId, mut undo: TicketPatch) {
        let mut numbering = self.numbering.lock();
        let mut tickets = self.tickets.lock();
        let Some(ticket) = tickets.iter_mut().find(|t| t.id == id) else {
            return;
        };
        if let Some(previous) = undo.ticket_number {
            // The previous number was released by the update; reclaim it.
            if let Err(error) = numbering.replace(ticket.ticket_number, previous) {
                tracing::warn!(ticket = %id, previous, %error, "could not reclaim ticket number");
                undo.ticket_number = None;
            }
        }
        ticket.apply(&undo);
        drop(tickets);
        drop(numbering);

        tracing::debug!(ticket = %id, "ticket update rolled back");
        self.events.emit(BoardEvent::TicketsChanged);
    }

    /// Change a ticket's color
    ///
    /// # Errors
    /// Same as [`TicketRegistry::update`].
    pub async fn set_color(&self, id: TicketId, color: TicketColor) -> Result<Ticket, BoardError> {
        self.update(id, TicketPatch::new().with_color(color)).await
    }

    /// Change a ticket's number
    ///
    /// # Errors
    /// Same as [`TicketRegistry::update`].
    pub async fn set_number(&self, id: TicketId, number: u32) -> Result<Ticket, BoardError> {
        self.update(id, TicketPatch::new().with_number(number)).await
    }

    /// Assign a ticket to one of `steps`, or unassign it
    ///
    /// # Errors
    /// - `ValidationError::UnknownStep` if `step` is not in `steps`
    /// - otherwise as [`TicketRegistry::update`]
    pub async fn set_step(
        &self,
        id: TicketId,
        step: Option<StepId>,
        steps: &[StepId],
    ) -> Result<Ticket, BoardError> {
        if let Some(step) = step {
            if !steps.contains(&step) {
                return Err(ValidationError::UnknownStep(step).into());
            }
        }
        self.update(id, TicketPatch::new().with_step(step)).await
    }

    /// Move a ticket one step left or right through `steps`
    ///
    /// An unassigned ticket enters at the first step going right and at the
    /// last step going left. At either end the ticket stays put and nothing
    /// is persisted. Returns the step the ticket ends on.
    ///
    /// # Errors
    /// Same as [`TicketRegistry::update`].
    pub async fn advance(
        &self,
        id: TicketId,
        direction: Direction,
        steps: &[StepId],
    ) -> Result<Option<StepId>, BoardError> {
        let current = self
            .get(id)
            .ok_or_else(|| BoardError::ticket_not_found(id))?
            .current_step_id;
        let (Some(&first), Some(&last)) = (steps.first(), steps.last()) else {
            return Ok(current);
        };

        let position = current.and_then(|s| steps.iter().position(|x| *x == s));
        let target = match (position, direction) {
            (None, Direction::Right) => first,
            (None, Direction::Left) => last,
            (Some(p), Direction::Left) => steps[p.saturating_sub(1)],
            (Some(p), Direction::Right) => steps[(p + 1).min(steps.len() - 1)],
        };

        if current == Some(target) {
            return Ok(current);
        }
        self.update(id, TicketPatch::new().with_step(Some(target)))
            .await?;
        Ok(Some(target))
    }

    /// Update notes locally and schedule a debounced save
    ///
    /// # Errors
    /// - `BoardError::NotFound` if the ticket is not in the mirror
    pub fn update_notes_debounced(&self, id: TicketId, text: impl Into<String>) -> Result<(), BoardError> {
        let text = text.into();
        {
            let mut tickets = self.tickets.lock();
            let ticket = tickets
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| BoardError::ticket_not_found(id))?;
            ticket.notes.clone_from(&text);
        }
        self.events.emit(BoardEvent::TicketsChanged);
        self.debouncer.schedule(id, text);
        Ok(())
    }

    /// Write every pending notes save now
    ///
    /// # Errors
    /// - `BoardError::Persistence` / `PartialPersistence` for failed writes
    pub async fn flush_notes(&self) -> Result<(), BoardError> {
        self.debouncer.flush().await
    }

    /// Tickets whose notes are waiting to be saved
    #[must_use]
    pub fn pending_notes(&self) -> usize {
        self.debouncer.pending()
    }

    /// Drop every pending notes save without writing it
    pub fn cancel_pending_notes(&self) {
        self.debouncer.cancel_all();
    }

    /// Delete a ticket and close up the order
    ///
    /// Any pending notes save for the ticket is dropped. Its number stays in
    /// the used set.
    ///
    /// # Errors
    /// - `BoardError::NotFound` if the ticket is not in the mirror
    /// - `BoardError::Persistence` / `PartialPersistence` if the delete or
    ///   the renumbering fails
    pub async fn delete(&self, id: TicketId) -> Result<Ticket, BoardError> {
        let (removed, position, changes) = {
            let mut tickets = self.tickets.lock();
            let position =
                order::position_of(&*tickets, id).ok_or_else(|| BoardError::ticket_not_found(id))?;
            let (removed, changes) = order::remove_dense(&mut *tickets, id)
                .ok_or_else(|| BoardError::ticket_not_found(id))?;
            (removed, position, changes)
        };
        self.debouncer.cancel(id);
        tracing::info!(ticket = %id, number = removed.ticket_number, "ticket deleted");
        self.events.emit(BoardEvent::TicketsChanged);

        let deletion = self.gateway.delete_ticket(id).await;
        match &deletion {
            Ok(Deletion::Deleted) => {}
            Ok(Deletion::NotFound) => {
                tracing::warn!(ticket = %id, "ticket already absent from store");
            }
            Err(error) => {
                self.report(id, error);
                if self.policy.rolls_back() {
                    order::insert_at(&mut *self.tickets.lock(), removed.clone(), position);
                    self.events.emit(BoardEvent::TicketsChanged);
                    return Err(BoardError::Persistence(error.clone()));
                }
            }
        }

        let mut outcome = BatchOutcome::single(deletion);
        outcome.merge(self.persist_indices(changes).await);
        outcome.into_result()?;
        Ok(removed)
    }

    /// Delete several tickets, renumbering once
    ///
    /// Unknown ids are skipped. Returns how many tickets were removed.
    ///
    /// # Errors
    /// - `BoardError::PartialPersistence` if any delete or index write fails;
    ///   the mirror keeps the removal
    pub async fn delete_many(&self, ids: &[TicketId]) -> Result<usize, BoardError> {
        let (removed, changes) = {
            let mut tickets = self.tickets.lock();
            let removed: Vec<TicketId> = tickets
                .iter()
                .filter(|t| ids.contains(&t.id))
                .map(|t| t.id)
                .collect();
            tickets.retain(|t| !removed.contains(&t.id));
            (removed, order::reindex(&mut *tickets))
        };
        if removed.is_empty() {
            return Ok(0);
        }

        for id in &removed {
            self.debouncer.cancel(*id);
        }
        tracing::info!(count = removed.len(), "tickets deleted");
        self.events.emit(BoardEvent::TicketsChanged);

        let mut outcome = run_batch(removed.iter().map(|id| self.persist_delete(*id))).await;
        outcome.merge(self.persist_indices(changes).await);
        outcome.into_result()?;
        Ok(removed.len())
    }

    /// Delete every ticket
    ///
    /// # Errors
    /// Same as [`TicketRegistry::delete_many`].
    pub async fn delete_all(&self) -> Result<usize, BoardError> {
        let ids = self.ids();
        self.delete_many(&ids).await
    }

    /// Give several tickets the same color
    ///
    /// Unknown ids are skipped. Returns how many tickets were recolored.
    ///
    /// # Errors
    /// - `BoardError::PartialPersistence` if any write fails
    pub async fn recolor_many(&self, ids: &[TicketId], color: TicketColor) -> Result<usize, BoardError> {
        let changed: Vec<TicketId> = {
            let mut tickets = self.tickets.lock();
            tickets
                .iter_mut()
                .filter(|t| ids.contains(&t.id))
                .map(|t| {
                    t.color = color;
                    t.id
                })
                .collect()
        };
        if changed.is_empty() {
            return Ok(0);
        }
        self.events.emit(BoardEvent::TicketsChanged);

        let patch = TicketPatch::new().with_color(color);
        run_batch(changed.iter().map(|id| self.persist(*id, patch.clone())))
            .await
            .into_result()?;
        Ok(changed.len())
    }

    /// Move a ticket to position `to` (clamped)
    ///
    /// # Errors
    /// - `BoardError::NotFound` if the ticket is not in the mirror
    /// - `BoardError::PartialPersistence` if writing indices fails
    pub async fn move_to(&self, id: TicketId, to: usize) -> Result<(), BoardError> {
        let changes = {
            let mut tickets = self.tickets.lock();
            let from =
                order::position_of(&*tickets, id).ok_or_else(|| BoardError::ticket_not_found(id))?;
            order::move_item(&mut *tickets, from, to)?
        };
        if changes.is_empty() {
            return Ok(());
        }

        tracing::debug!(ticket = %id, to, "ticket moved");
        self.events.emit(BoardEvent::TicketsChanged);
        self.persist_indices(changes).await.into_result()
    }

    /// Resolve a horizontal drag of `id` dropped at `point` over `target`
    ///
    /// # Errors
    /// Same as [`TicketRegistry::move_to`], plus `NotFound` for the target.
    pub async fn drop_onto(
        &self,
        id: TicketId,
        target: TicketId,
        point: Point,
        target_rect: Rect,
    ) -> Result<(), BoardError> {
        if id == target {
            return Ok(());
        }
        let (from, over) = {
            let tickets = self.tickets.lock();
            (
                order::position_of(&*tickets, id).ok_or_else(|| BoardError::ticket_not_found(id))?,
                order::position_of(&*tickets, target)
                    .ok_or_else(|| BoardError::ticket_not_found(target))?,
            )
        };
        let side = order::drop_side(Axis::Horizontal, point, target_rect);
        self.move_to(id, order::drop_destination(from, over, side))
            .await
    }

    /// Unassign tickets whose step is not in `steps`
    ///
    /// The mirror is cleared regardless of the write outcome.
    pub(crate) async fn clear_dangling(&self, steps: &[StepId]) -> (Vec<TicketId>, BatchOutcome) {
        let cleared = self.unassign_where(|s| !steps.contains(&s));
        let outcome = self.persist_unassigned(&cleared).await;
        (cleared, outcome)
    }

    /// Unassign every ticket whose step matches, in the mirror only
    ///
    /// Callers removing a step run this inside the same critical section as
    /// the removal so no ticket is ever seen on a missing step.
    pub(crate) fn unassign_where(&self, matches: impl Fn(StepId) -> bool) -> Vec<TicketId> {
        let cleared: Vec<TicketId> = {
            let mut tickets = self.tickets.lock();
            tickets
                .iter_mut()
                .filter(|t| t.current_step_id.is_some_and(&matches))
                .map(|t| {
                    t.current_step_id = None;
                    t.id
                })
                .collect()
        };
        if !cleared.is_empty() {
            tracing::info!(count = cleared.len(), "unassigning tickets from removed step");
            self.events.emit(BoardEvent::TicketsChanged);
        }
        cleared
    }

    /// Write the unassignment of `cleared` through to the store
    pub(crate) async fn persist_unassigned(&self, cleared: &[TicketId]) -> BatchOutcome {
        if cleared.is_empty() {
            return BatchOutcome::default();
        }
        let patch = TicketPatch::new().with_step(None);
        run_batch(cleared.iter().map(|id| self.persist(*id, patch.clone()))).await
    }

    /// Put tickets that are still unassigned back on `step`, in the mirror only
    pub(crate) fn reattach(&self, ids: &[TicketId], step: StepId) -> Vec<TicketId> {
        let restored: Vec<TicketId> = {
            let mut tickets = self.tickets.lock();
            tickets
                .iter_mut()
                .filter(|t| ids.contains(&t.id) && t.current_step_id.is_none())
                .map(|t| {
                    t.current_step_id = Some(step);
                    t.id
                })
                .collect()
        };
        if !restored.is_empty() {
            self.events.emit(BoardEvent::TicketsChanged);
        }
        restored
    }

    /// Put tickets that are still unassigned back on `step` and persist
    pub(crate) async fn reassign(&self, ids: &[TicketId], step: StepId) -> BatchOutcome {
        let restored = self.reattach(ids, step);
        if restored.is_empty() {
            return BatchOutcome::default();
        }
        let patch = TicketPatch::new().with_step(Some(step));
        run_batch(restored.iter().map(|id| self.persist(*id, patch.clone()))).await
    }

    async fn persist_indices(&self, changes: Vec<IndexChange<TicketId>>) -> BatchOutcome {
        if changes.is_empty() {
            return BatchOutcome::default();
        }
        tracing::debug!(count = changes.len(), "persisting ticket order");
        run_batch(
            changes
                .into_iter()
                .map(|c| self.persist(c.id, TicketPatch::new().with_order_index(c.to))),
        )
        .await
    }

    async fn persist(&self, id: TicketId, patch: TicketPatch) -> Result<(), StoreError> {
        match self.gateway.update_ticket(id, patch).await {
            Ok(_) => Ok(()),
            Err(error) => {
                self.report(id, &error);
                Err(error)
            }
        }
    }

    async fn persist_delete(&self, id: TicketId) -> Result<(), StoreError> {
        match self.gateway.delete_ticket(id).await {
            Ok(_) => Ok(()),
            Err(error) => {
                self.report(id, &error);
                Err(error)
            }
        }
    }

    fn report(&self, id: TicketId, error: &StoreError) {
        tracing::error!(ticket = %id, %error, "ticket persistence failed");
        self.events
            .emit(BoardEvent::persist_failed(EntityKind::Ticket, id, error));
    }
}
