//! In-memory gateway
//!
//! Holds records in a [`StoreState`] behind a mutex and journals every call
//! it receives unless built with [`MemoryGateway::without_journal`]. Faults
//! can be injected per operation or per ticket, and an artificial latency
//! makes in-flight windows observable in tests.

use crate::gateway::{BoardGateway, Deletion, GatewayCall, GatewayOp, StoreState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use ticketboard_model::{
    BoardSettings, NewStep, NewTicket, Step, StepId, StepPatch, StoreError, Ticket, TicketId,
    TicketPatch,
};

#[derive(Debug, Default)]
struct Faults {
    offline: bool,
    fail_next: HashMap<GatewayOp, usize>,
    failing_tickets: HashSet<TicketId>,
}

impl Faults {
    fn check(&mut self, call: &GatewayCall) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        if let Some(id) = call.ticket_id() {
            if self.failing_tickets.contains(&id) {
                return Err(StoreError::Unavailable(format!("ticket {id} rejected")));
            }
        }
        if let Some(remaining) = self.fail_next.get_mut(&call.op()) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!("{:?} failed", call.op())));
            }
        }
        Ok(())
    }
}

/// Ephemeral gateway
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<StoreState>,
    journal: Mutex<Vec<GatewayCall>>,
    faults: Mutex<Faults>,
    latency: Option<Duration>,
    untracked: bool,
}

impl MemoryGateway {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store holding existing records
    #[must_use]
    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Delay every call
    #[inline]
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Stop journaling calls
    ///
    /// For long-lived stores, where the journal would only grow.
    #[inline]
    #[must_use]
    pub fn without_journal(mut self) -> Self {
        self.untracked = true;
        self
    }

    /// Copy of the records
    #[must_use]
    pub fn state(&self) -> StoreState {
        self.state.lock().clone()
    }

    /// Calls received so far, including failed ones
    #[must_use]
    pub fn journal(&self) -> Vec<GatewayCall> {
        self.journal.lock().clone()
    }

    /// Number of received calls of one kind
    #[must_use]
    pub fn count(&self, op: GatewayOp) -> usize {
        self.journal.lock().iter().filter(|c| c.op() == op).count()
    }

    /// Forget journaled calls
    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }

    /// Fail every call while set
    pub fn set_offline(&self, offline: bool) {
        self.faults.lock().offline = offline;
    }

    /// Fail the next `times` calls of one kind
    pub fn fail_next(&self, op: GatewayOp, times: usize) {
        *self.faults.lock().fail_next.entry(op).or_default() += times;
    }

    /// Fail every update or delete aimed at this ticket
    pub fn fail_ticket(&self, id: TicketId) {
        self.faults.lock().failing_tickets.insert(id);
    }

    /// Stop failing calls for this ticket
    pub fn heal_ticket(&self, id: TicketId) {
        self.faults.lock().failing_tickets.remove(&id);
    }

    /// Journal a call and run it against the records
    async fn call<R>(
        &self,
        call: GatewayCall,
        apply: impl FnOnce(&mut StoreState) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = self.faults.lock().check(&call);
        if !self.untracked {
            self.journal.lock().push(call);
        }
        outcome?;

        apply(&mut *self.state.lock())
    }
}

#[async_trait]
impl BoardGateway for MemoryGateway {
    async fn list_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        self.call(GatewayCall::ListTickets, |s| Ok(s.sorted_tickets())).await
    }

    async fn create_ticket(&self, fields: NewTicket) -> Result<Ticket, StoreError> {
        self.call(GatewayCall::CreateTicket(fields.clone()), |s| {
            Ok(s.create_ticket(fields))
        })
        .await
    }

    async fn update_ticket(&self, id: TicketId, patch: TicketPatch) -> Result<Ticket, StoreError> {
        self.call(GatewayCall::UpdateTicket(id, patch.clone()), |s| {
            s.update_ticket(id, &patch)
        })
        .await
    }

    async fn delete_ticket(&self, id: TicketId) -> Result<Deletion, StoreError> {
        self.call(GatewayCall::DeleteTicket(id), |s| Ok(s.delete_ticket(id)))
            .await
    }

    async fn list_steps(&self) -> Result<Vec<Step>, StoreError> {
        self.call(GatewayCall::ListSteps, |s| Ok(s.sorted_steps())).await
    }

    async fn create_step(&self, fields: NewStep) -> Result<Step, StoreError> {
        self.call(GatewayCall::CreateStep(fields.clone()), |s| {
            Ok(s.create_step(fields))
        })
        .await
    }

    async fn update_step(&self, id: StepId, patch: StepPatch) -> Result<Step, StoreError> {
        self.call(GatewayCall::UpdateStep(id, patch.clone()), |s| {
            s.update_step(id, &patch)
        })
        .await
    }

    async fn delete_step(&self, id: StepId) -> Result<Deletion, StoreError> {
        self.call(GatewayCall::DeleteStep(id), |s| Ok(s.delete_step(id)))
            .await
    }

    async fn load_settings(&self) -> Result<BoardSettings, StoreError> {
        self.call(GatewayCall::LoadSettings, |s| Ok(s.settings)).await
    }

    async fn save_settings(&self, settings: BoardSettings) -> Result<(), StoreError> {
        self.call(GatewayCall::SaveSettings(settings), |s| {
            s.settings = settings;
            Ok(())
        })
        .await
    }
}
