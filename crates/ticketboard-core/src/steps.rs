//! Step registry
//!
//! Owns the ordered mirror of workflow steps and the settings-session
//! [`ChangeLedger`]. Structural edits made while a session is open are
//! logged so a dirty session can be confirmed before it is thrown away.
//!
//! Deleting a step cascades: every ticket on it is unassigned, locally in the
//! same critical section that removes the step and in the store through a
//! joined batch.

use crate::config::{BoardConfig, WritePolicy};
use crate::events::{BoardEvent, EventBus};
use crate::persist::{run_batch, BatchOutcome};
use crate::tickets::TicketRegistry;
use parking_lot::Mutex;
use std::sync::Arc;
use ticketboard_model::order::{self, Axis, IndexChange, Point, Rect};
use ticketboard_model::{
    BoardError, ChangeLedger, CloseDecision, DiscardDirective, EntityKind, LedgerEntry, NewStep,
    Step, StepId, StepPatch, StoreError, TicketId,
};
use ticketboard_store::{BoardGateway, Deletion};

/// A removed step, kept so the delete can be undone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedStep {
    /// Step as it was before removal
    pub step: Step,
    /// Position it held
    pub position: usize,
    /// Tickets that were on it
    pub cleared_tickets: Vec<TicketId>,
}

/// Registry of steps
#[derive(Debug)]
pub struct StepRegistry {
    gateway: Arc<dyn BoardGateway>,
    steps: Mutex<Vec<Step>>,
    tickets: Arc<TicketRegistry>,
    ledger: Mutex<ChangeLedger>,
    events: EventBus,
    policy: WritePolicy,
}

impl StepRegistry {
    /// Create an empty registry cascading into `tickets`
    #[must_use]
    pub fn new(
        gateway: Arc<dyn BoardGateway>,
        tickets: Arc<TicketRegistry>,
        config: &BoardConfig,
        events: EventBus,
    ) -> Self {
        Self {
            gateway,
            steps: Mutex::new(Vec::new()),
            tickets,
            ledger: Mutex::new(ChangeLedger::new()),
            events,
            policy: config.write_policy,
        }
    }

    /// Replace the mirror with the store's steps, repairing the order
    ///
    /// # Errors
    /// - `BoardError::Persistence` if listing fails (the mirror is untouched)
    /// - `BoardError::PartialPersistence` if writing corrected indices fails
    pub async fn load(&self) -> Result<(), BoardError> {
        let mut loaded = self.gateway.list_steps().await?;
        loaded.sort_by_key(|s| s.order_index);
        let changes = order::reindex(&mut loaded);
        let count = loaded.len();
        *self.steps.lock() = loaded;

        tracing::debug!(count, repaired = changes.len(), "steps loaded");
        self.events.emit(BoardEvent::StepsChanged);
        self.persist_indices(changes).await.into_result()
    }

    /// Steps in display order
    #[must_use]
    pub fn list(&self) -> Vec<Step> {
        self.steps.lock().clone()
    }

    /// Step ids in display order
    #[must_use]
    pub fn ids(&self) -> Vec<StepId> {
        self.steps.lock().iter().map(|s| s.id).collect()
    }

    /// Look up one step
    #[must_use]
    pub fn get(&self, id: StepId) -> Option<Step> {
        self.steps.lock().iter().find(|s| s.id == id).cloned()
    }

    /// Check if a step is on the board
    #[must_use]
    pub fn contains(&self, id: StepId) -> bool {
        self.steps.lock().iter().any(|s| s.id == id)
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.lock().len()
    }

    /// Check if the board has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.lock().is_empty()
    }

    /// Append a step
    ///
    /// # Errors
    /// - `BoardError::Persistence` if the store rejects the create
    pub async fn create(&self, name: impl Into<String>) -> Result<Step, BoardError> {
        self.create_at(name.into(), None).await
    }

    /// Insert a step at `position` (clamped)
    ///
    /// # Errors
    /// - `BoardError::Persistence` if the store rejects the create
    /// - `BoardError::PartialPersistence` if shifting neighbours fails
    pub async fn insert(&self, name: impl Into<String>, position: usize) -> Result<Step, BoardError> {
        self.create_at(name.into(), Some(position)).await
    }

    async fn create_at(&self, name: String, position: Option<usize>) -> Result<Step, BoardError> {
        let len = self.len();
        let position = position.map_or(len, |p| p.min(len));
        let fields = NewStep {
            name,
            order_index: Some(order::to_index(position)),
        };
        let created = self.gateway.create_step(fields).await.map_err(|error| {
            tracing::error!(%error, "step create failed");
            BoardError::from(error)
        })?;

        let (step, changes) = {
            let mut steps = self.steps.lock();
            let position = position.min(steps.len());
            let changes = order::insert_at(&mut *steps, created, position);
            (steps[position].clone(), changes)
        };

        self.ledger.lock().record(LedgerEntry::StepAdded {
            name: step.display_name(),
        });
        tracing::info!(step = %step.id, name = %step.display_name(), "step created");
        self.events.emit(BoardEvent::StepsChanged);
        self.persist_indices(changes).await.into_result()?;
        Ok(step)
    }

    /// Rename a step and persist immediately
    ///
    /// Renames are not logged individually; they only mark the session dirty.
    ///
    /// # Errors
    /// - `BoardError::NotFound` if the step is not in the mirror
    /// - `BoardError::Persistence` if the store rejects the write
    pub async fn rename(&self, id: StepId, name: impl Into<String>) -> Result<Step, BoardError> {
        let patch = StepPatch::rename(name);
        let (renamed, undo) = {
            let mut steps = self.steps.lock();
            let step = steps
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| BoardError::step_not_found(id))?;
            let undo = step.apply(&patch);
            (step.clone(), undo)
        };
        self.ledger.lock().mark_dirty();
        self.events.emit(BoardEvent::StepRenamed {
            id,
            name: renamed.display_name(),
        });

        if let Err(error) = self.persist(id, patch).await {
            if self.policy.rolls_back() {
                let restored = {
                    let mut steps = self.steps.lock();
                    steps.iter_mut().find(|s| s.id == id).map(|step| {
                        step.apply(&undo);
                        step.display_name()
                    })
                };
                if let Some(name) = restored {
                    tracing::debug!(step = %id, "step rename rolled back");
                    self.events.emit(BoardEvent::StepRenamed { id, name });
                }
            }
            return Err(error.into());
        }
        Ok(renamed)
    }

    /// Delete a step, close up the order and unassign its tickets
    ///
    /// Returns what is needed to undo the delete with
    /// [`StepRegistry::restore`].
    ///
    /// # Errors
    /// - `BoardError::NotFound` if the step is not in the mirror
    /// - `BoardError::Persistence` if the store rejects the delete under a
    ///   rollback policy; the step and its tickets are back in place
    /// - `BoardError::PartialPersistence` if any call of the delete,
    ///   renumbering or cascade fails otherwise; the mirror keeps the removal
    pub async fn delete(&self, id: StepId) -> Result<DeletedStep, BoardError> {
        let (step, position, changes, cleared_tickets) = {
            let mut steps = self.steps.lock();
            let position =
                order::position_of(&*steps, id).ok_or_else(|| BoardError::step_not_found(id))?;
            let (step, changes) =
                order::remove_dense(&mut *steps, id).ok_or_else(|| BoardError::step_not_found(id))?;
            // Lock order: steps, then tickets.
            let cleared = self.tickets.unassign_where(|s| s == id);
            (step, position, changes, cleared)
        };
        tracing::info!(step = %id, name = %step.display_name(), "step deleted");
        self.events.emit(BoardEvent::StepsChanged);

        let deletion = self.gateway.delete_step(id).await;
        match &deletion {
            Ok(Deletion::Deleted) => {}
            Ok(Deletion::NotFound) => {
                tracing::warn!(step = %id, "step already absent from store");
            }
            Err(error) => {
                self.report(id, error);
                if self.policy.rolls_back() {
                    {
                        let mut steps = self.steps.lock();
                        order::insert_at(&mut *steps, step.clone(), position);
                        self.tickets.reattach(&cleared_tickets, id);
                    }
                    tracing::debug!(step = %id, "step delete rolled back");
                    self.events.emit(BoardEvent::StepsChanged);
                    return Err(BoardError::Persistence(error.clone()));
                }
            }
        }
        self.ledger.lock().record(LedgerEntry::StepDeleted {
            name: step.display_name(),
        });

        let mut outcome = BatchOutcome::single(deletion);
        outcome.merge(self.persist_indices(changes).await);
        outcome.merge(self.tickets.persist_unassigned(&cleared_tickets).await);
        outcome.into_result()?;

        Ok(DeletedStep {
            step,
            position,
            cleared_tickets,
        })
    }

    /// Undo a delete: recreate the step at its old position and put its
    /// tickets back on it
    ///
    /// The recreated step gets a new id. Tickets reassigned elsewhere since
    /// the delete are left alone.
    ///
    /// # Errors
    /// - `BoardError::Persistence` if the store rejects the create
    /// - `BoardError::PartialPersistence` if reassigning tickets fails
    pub async fn restore(&self, deleted: DeletedStep) -> Result<Step, BoardError> {
        let step = self
            .create_at(deleted.step.name, Some(deleted.position))
            .await?;
        tracing::info!(step = %step.id, tickets = deleted.cleared_tickets.len(), "step delete undone");
        self.tickets
            .reassign(&deleted.cleared_tickets, step.id)
            .await
            .into_result()?;
        Ok(step)
    }

    /// Move a step to position `to` (clamped)
    ///
    /// # Errors
    /// - `BoardError::NotFound` if the step is not in the mirror
    /// - `BoardError::PartialPersistence` if writing indices fails
    pub async fn move_to(&self, id: StepId, to: usize) -> Result<(), BoardError> {
        let (name, from, to, changes) = {
            let mut steps = self.steps.lock();
            let from = order::position_of(&*steps, id).ok_or_else(|| BoardError::step_not_found(id))?;
            let changes = order::move_item(&mut *steps, from, to)?;
            let to = to.min(steps.len() - 1);
            (steps[to].display_name(), from, to, changes)
        };
        if changes.is_empty() {
            return Ok(());
        }

        self.ledger
            .lock()
            .record(LedgerEntry::StepMoved { name, from, to });
        tracing::debug!(step = %id, from, to, "step moved");
        self.events.emit(BoardEvent::StepsChanged);
        self.persist_indices(changes).await.into_result()
    }

    /// Move a step by `delta` positions
    ///
    /// Returns `false` without touching anything when the move would leave
    /// the sequence.
    ///
    /// # Errors
    /// Same as [`StepRegistry::move_to`].
    pub async fn move_by(&self, id: StepId, delta: isize) -> Result<bool, BoardError> {
        let target = {
            let steps = self.steps.lock();
            let position = order::position_of(&*steps, id).ok_or_else(|| BoardError::step_not_found(id))?;
            order::step_target(position, steps.len(), delta)
        };
        match target {
            Some(to) => {
                self.move_to(id, to).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Resolve a vertical drag of `id` dropped at `point` over `target`
    ///
    /// # Errors
    /// Same as [`StepRegistry::move_to`], plus `NotFound` for the target.
    pub async fn drop_onto(
        &self,
        id: StepId,
        target: StepId,
        point: Point,
        target_rect: Rect,
    ) -> Result<(), BoardError> {
        if id == target {
            return Ok(());
        }
        let (from, over) = {
            let steps = self.steps.lock();
            (
                order::position_of(&*steps, id).ok_or_else(|| BoardError::step_not_found(id))?,
                order::position_of(&*steps, target)
                    .ok_or_else(|| BoardError::step_not_found(target))?,
            )
        };
        let side = order::drop_side(Axis::Vertical, point, target_rect);
        self.move_to(id, order::drop_destination(from, over, side))
            .await
    }

    /// Start a settings session
    pub fn open_session(&self) {
        let snapshot = self.list();
        self.ledger.lock().open(snapshot);
        tracing::debug!("settings session opened");
    }

    /// Check if a settings session is running
    #[must_use]
    pub fn session_open(&self) -> bool {
        self.ledger.lock().is_open()
    }

    /// Check if the session holds unsaved edits
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.ledger.lock().is_dirty()
    }

    /// Structural edits logged in this session
    #[must_use]
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.ledger.lock().entries().to_vec()
    }

    /// Accept the session's edits
    pub fn commit_session(&self) {
        let steps = self.list();
        self.ledger.lock().commit(steps);
        tracing::debug!("settings session committed");
    }

    /// Abandon the session's edits; the caller must reload from the store
    pub fn discard_session(&self) -> DiscardDirective {
        let directive = self.ledger.lock().discard();
        tracing::debug!("settings session discarded");
        directive
    }

    /// Try to end the session
    pub fn close_session(&self) -> CloseDecision {
        self.ledger.lock().close()
    }

    async fn persist_indices(&self, changes: Vec<IndexChange<StepId>>) -> BatchOutcome {
        if changes.is_empty() {
            return BatchOutcome::default();
        }
        tracing::debug!(count = changes.len(), "persisting step order");
        run_batch(
            changes
                .into_iter()
                .map(|c| self.persist(c.id, StepPatch::reorder(c.to))),
        )
        .await
    }

    async fn persist(&self, id: StepId, patch: StepPatch) -> Result<(), StoreError> {
        match self.gateway.update_step(id, patch).await {
            Ok(_) => Ok(()),
            Err(error) => {
                self.report(id, &error);
                Err(error)
            }
        }
    }

    fn report(&self, id: StepId, error: &StoreError) {
        tracing::error!(step = %id, %error, "step persistence failed");
        self.events
            .emit(BoardEvent::persist_failed(EntityKind::Step, id, error));
    }
}
