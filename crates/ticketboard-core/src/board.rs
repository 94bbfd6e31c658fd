//! Board facade
//!
//! Ties the two registries to one gateway and handles operations that span
//! both of them:
//! - Loading and reloading the mirrors (repairing order and dangling steps)
//! - Ticket creation with a default step, step validation for tickets
//! - Numbering mode, persisted as a board setting
//! - The settings session (open, save, discard, close)
//! - Snapshot export and import
//! - Invariant checks over the mirror

use crate::config::BoardConfig;
use crate::events::{BoardEvent, EventBus};
use crate::invariants::{check_board, InvariantViolation};
use crate::snapshot::{BoardSnapshot, ImportPlan};
use crate::steps::{DeletedStep, StepRegistry};
use crate::tickets::TicketRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use ticketboard_model::order;
use ticketboard_model::{
    BoardError, BoardSettings, CloseDecision, DiscardDirective, Direction, EntityKind, NewStep,
    NewTicket, NumberingMode, Step, StepId, Ticket, TicketColor, TicketId, TicketPatch,
    ValidationError,
};
use ticketboard_store::BoardGateway;
use tokio::sync::broadcast;

/// Which step a new ticket starts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepAssignment {
    /// First step of the board, or none if there are no steps
    #[default]
    FirstStep,
    /// No step
    Unassigned,
    /// A specific step, which must exist
    Step(StepId),
}

/// Fields for a ticket created through the board
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketDraft {
    /// Explicit number; issued by the numbering policy when `None`
    pub number: Option<u32>,
    /// Starting color
    pub color: TicketColor,
    /// Starting notes
    pub notes: String,
    /// Which step the ticket starts on
    pub step: StepAssignment,
    /// Position in the ticket order; appended when `None`
    pub index: Option<usize>,
}

impl TicketDraft {
    /// Draft with default color, no notes, on the first step
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_number(mut self, number: u32) -> Self {
        self.number = Some(number);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_color(mut self, color: TicketColor) -> Self {
        self.color = color;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_step(mut self, step: StepAssignment) -> Self {
        self.step = step;
        self
    }

    #[inline]
    #[must_use]
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// What an import wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Steps written
    pub steps: usize,
    /// Tickets written
    pub tickets: usize,
    /// Tickets imported unassigned because their step was missing
    pub unassigned: usize,
}

/// One board: settings, steps and tickets over a single store
#[derive(Debug)]
pub struct Board {
    config: BoardConfig,
    gateway: Arc<dyn BoardGateway>,
    tickets: Arc<TicketRegistry>,
    steps: StepRegistry,
    events: EventBus,
}

impl Board {
    /// Open a board and load it from the store
    ///
    /// # Errors
    /// - `BoardError::Persistence` if the store cannot be read
    /// - `BoardError::PartialPersistence` if repairs cannot be written back
    pub async fn open(gateway: Arc<dyn BoardGateway>, config: BoardConfig) -> Result<Self, BoardError> {
        let events = EventBus::new(config.event_capacity);
        let tickets = Arc::new(TicketRegistry::new(
            Arc::clone(&gateway),
            &config,
            events.clone(),
        ));
        let steps = StepRegistry::new(
            Arc::clone(&gateway),
            Arc::clone(&tickets),
            &config,
            events.clone(),
        );

        let board = Self {
            config,
            gateway,
            tickets,
            steps,
            events,
        };
        board.load().await?;
        tracing::info!(
            steps = board.steps.len(),
            tickets = board.tickets.len(),
            mode = ?board.numbering_mode(),
            "board opened"
        );
        Ok(board)
    }

    async fn load(&self) -> Result<(), BoardError> {
        let settings = self.gateway.load_settings().await?;
        self.tickets.set_numbering_mode(settings.numbering_mode());
        self.steps.load().await?;
        self.tickets.load().await?;

        let (cleared, outcome) = self.tickets.clear_dangling(&self.steps.ids()).await;
        if !cleared.is_empty() {
            tracing::warn!(count = cleared.len(), "unassigned tickets on missing steps");
        }
        outcome.into_result()
    }

    /// Flush pending notes, then reload both mirrors from the store
    ///
    /// # Errors
    /// Same as [`Board::open`].
    pub async fn reload(&self) -> Result<(), BoardError> {
        if let Err(error) = self.tickets.flush_notes().await {
            tracing::warn!(%error, "pending notes could not be saved before reload");
        }
        self.load().await
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Ticket registry
    #[inline]
    #[must_use]
    pub fn tickets(&self) -> &TicketRegistry {
        &self.tickets
    }

    /// Step registry
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &StepRegistry {
        &self.steps
    }

    /// Listen for change notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Create a ticket, resolving its starting step
    ///
    /// # Errors
    /// - `ValidationError::UnknownStep` for a step not on the board
    /// - otherwise as [`TicketRegistry::create`]
    pub async fn create_ticket(&self, draft: TicketDraft) -> Result<Ticket, BoardError> {
        let step = self.resolve_step(draft.step)?;
        self.tickets
            .create(draft.number, draft.color, draft.notes, step, draft.index)
            .await
    }

    /// Create `count` tickets from one draft
    ///
    /// Numbers always come from the numbering policy; an explicit number in
    /// the draft is ignored. Stops at the first failure.
    ///
    /// # Errors
    /// Same as [`Board::create_ticket`].
    pub async fn create_tickets(&self, count: usize, draft: &TicketDraft) -> Result<Vec<Ticket>, BoardError> {
        let step = self.resolve_step(draft.step)?;
        let mut created = Vec::with_capacity(count);
        for offset in 0..count {
            let index = draft.index.map(|i| i + offset);
            let ticket = self
                .tickets
                .create(None, draft.color, draft.notes.clone(), step, index)
                .await?;
            created.push(ticket);
        }
        tracing::info!(count, "tickets created");
        Ok(created)
    }

    fn resolve_step(&self, assignment: StepAssignment) -> Result<Option<StepId>, ValidationError> {
        match assignment {
            StepAssignment::FirstStep => Ok(self.steps.ids().first().copied()),
            StepAssignment::Unassigned => Ok(None),
            StepAssignment::Step(id) if self.steps.contains(id) => Ok(Some(id)),
            StepAssignment::Step(id) => Err(ValidationError::UnknownStep(id)),
        }
    }

    /// Apply a partial update, checking any step reference
    ///
    /// # Errors
    /// - `ValidationError::UnknownStep` for a step not on the board
    /// - otherwise as [`TicketRegistry::update`]
    pub async fn update_ticket(&self, id: TicketId, patch: TicketPatch) -> Result<Ticket, BoardError> {
        if let Some(Some(step)) = patch.current_step_id {
            if !self.steps.contains(step) {
                return Err(ValidationError::UnknownStep(step).into());
            }
        }
        self.tickets.update(id, patch).await
    }

    /// Assign a ticket to a step, or unassign it
    ///
    /// # Errors
    /// Same as [`TicketRegistry::set_step`].
    pub async fn set_ticket_step(&self, id: TicketId, step: Option<StepId>) -> Result<Ticket, BoardError> {
        self.tickets.set_step(id, step, &self.steps.ids()).await
    }

    /// Move a ticket one step left or right
    ///
    /// # Errors
    /// Same as [`TicketRegistry::advance`].
    pub async fn advance_ticket(&self, id: TicketId, direction: Direction) -> Result<Option<StepId>, BoardError> {
        self.tickets.advance(id, direction, &self.steps.ids()).await
    }

    /// Delete a step and unassign its tickets
    ///
    /// # Errors
    /// Same as [`StepRegistry::delete`].
    pub async fn delete_step(&self, id: StepId) -> Result<DeletedStep, BoardError> {
        self.steps.delete(id).await
    }

    /// Undo a step delete
    ///
    /// # Errors
    /// Same as [`StepRegistry::restore`].
    pub async fn undo_step_delete(&self, deleted: DeletedStep) -> Result<Step, BoardError> {
        self.steps.restore(deleted).await
    }

    /// Current numbering mode
    #[must_use]
    pub fn numbering_mode(&self) -> NumberingMode {
        self.tickets.numbering_mode()
    }

    /// Settings as they stand locally
    #[must_use]
    pub fn settings(&self) -> BoardSettings {
        BoardSettings {
            sequential_numbering: self.numbering_mode() == NumberingMode::Sequential,
        }
    }

    /// Switch numbering mode and persist it
    ///
    /// # Errors
    /// - `BoardError::Persistence` if the settings cannot be saved
    pub async fn set_numbering_mode(&self, mode: NumberingMode) -> Result<(), BoardError> {
        let previous = self.numbering_mode();
        self.tickets.set_numbering_mode(mode);
        tracing::info!(?mode, "numbering mode changed");

        if let Err(error) = self.gateway.save_settings(self.settings()).await {
            tracing::error!(%error, "saving board settings failed");
            self.events
                .emit(BoardEvent::persist_failed(EntityKind::Settings, "board", &error));
            if self.config.write_policy.rolls_back() {
                self.tickets.set_numbering_mode(previous);
            }
            return Err(error.into());
        }
        Ok(())
    }

    /// Start a settings session
    pub fn open_settings(&self) {
        self.steps.open_session();
    }

    /// Check if the settings session holds unsaved edits
    #[must_use]
    pub fn settings_dirty(&self) -> bool {
        self.steps.is_dirty()
    }

    /// Accept the session's edits
    pub fn save_settings(&self) {
        self.steps.commit_session();
    }

    /// Abandon the session and reload from the store
    ///
    /// # Errors
    /// Same as [`Board::reload`].
    pub async fn discard_settings(&self) -> Result<(), BoardError> {
        match self.steps.discard_session() {
            DiscardDirective::ReloadFromStore => self.reload().await,
        }
    }

    /// Try to close the settings session
    ///
    /// A dirty session stays open and returns the edits to confirm.
    #[must_use]
    pub fn close_settings(&self) -> CloseDecision {
        self.steps.close_session()
    }

    /// Write pending notes now
    ///
    /// # Errors
    /// Same as [`TicketRegistry::flush_notes`].
    pub async fn flush_notes(&self) -> Result<(), BoardError> {
        self.tickets.flush_notes().await
    }

    /// Check the mirror against the board invariants
    #[must_use]
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        check_board(
            &self.tickets.list(),
            &self.steps.list(),
            &self.tickets.used_numbers(),
        )
    }

    /// Capture the board, saving pending notes first
    pub async fn export(&self) -> BoardSnapshot {
        if let Err(error) = self.tickets.flush_notes().await {
            tracing::warn!(%error, "exporting with unsaved notes");
        }
        BoardSnapshot::new(self.settings(), self.steps.list(), self.tickets.list())
    }

    /// Replace the whole board with a snapshot
    ///
    /// The snapshot is validated before anything is touched. Existing steps
    /// and tickets are then deleted from the store, the snapshot's records
    /// are created in order with fresh ids, and both mirrors are reloaded.
    /// Tickets on steps missing from the snapshot are imported unassigned.
    /// Pending notes saves are dropped.
    ///
    /// # Errors
    /// - `BoardError::Validation` for an invalid snapshot (nothing changed)
    /// - `BoardError::Persistence` if the store fails part way; the board is
    ///   reloaded from whatever the store holds
    pub async fn import(&self, snapshot: &BoardSnapshot) -> Result<ImportSummary, BoardError> {
        let plan = snapshot.plan()?;
        self.tickets.cancel_pending_notes();

        let written = self.replace_contents(&plan).await;
        self.tickets.reset_numbers();
        let reloaded = self.load().await;
        written?;
        reloaded?;

        let summary = ImportSummary {
            steps: plan.steps.len(),
            tickets: plan.tickets.len(),
            unassigned: plan.dangling,
        };
        tracing::info!(?summary, "board imported");
        Ok(summary)
    }

    async fn replace_contents(&self, plan: &ImportPlan) -> Result<(), BoardError> {
        for ticket in self.gateway.list_tickets().await? {
            self.gateway.delete_ticket(ticket.id).await?;
        }
        for step in self.gateway.list_steps().await? {
            self.gateway.delete_step(step.id).await?;
        }

        let mut step_ids: HashMap<StepId, StepId> = HashMap::new();
        for (position, step) in plan.steps.iter().enumerate() {
            let created = self
                .gateway
                .create_step(NewStep {
                    name: step.name.clone(),
                    order_index: Some(order::to_index(position)),
                })
                .await?;
            step_ids.insert(step.id, created.id);
        }

        for (position, ticket) in plan.tickets.iter().enumerate() {
            self.gateway
                .create_ticket(NewTicket {
                    ticket_number: ticket.ticket_number,
                    color: ticket.color,
                    notes: ticket.notes.clone(),
                    current_step_id: ticket
                        .current_step_id
                        .and_then(|s| step_ids.get(&s).copied()),
                    order_index: Some(order::to_index(position)),
                })
                .await?;
        }

        self.gateway.save_settings(plan.settings).await?;
        Ok(())
    }
}
