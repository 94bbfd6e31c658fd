//! Gateway contract and the record state shared by the shipped stores

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use ticketboard_model::{
    BoardSettings, NewStep, NewTicket, Step, StepId, StepPatch, StoreError, Ticket, TicketId,
    TicketPatch,
};

/// Current on-disk layout of [`StoreState`]
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Result of a delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// Record removed
    Deleted,
    /// No such record
    NotFound,
}

/// Durable store for tickets, steps and board settings
///
/// Implementations assign ids on creation. When a create omits
/// `order_index`, the record is placed after the current maximum.
/// List calls return records sorted by `order_index`.
#[async_trait]
pub trait BoardGateway: Send + Sync + fmt::Debug {
    /// All tickets
    async fn list_tickets(&self) -> Result<Vec<Ticket>, StoreError>;

    /// Create a ticket
    async fn create_ticket(&self, fields: NewTicket) -> Result<Ticket, StoreError>;

    /// Apply a partial update
    async fn update_ticket(&self, id: TicketId, patch: TicketPatch) -> Result<Ticket, StoreError>;

    /// Delete a ticket
    async fn delete_ticket(&self, id: TicketId) -> Result<Deletion, StoreError>;

    /// All steps
    async fn list_steps(&self) -> Result<Vec<Step>, StoreError>;

    /// Create a step
    async fn create_step(&self, fields: NewStep) -> Result<Step, StoreError>;

    /// Apply a partial update
    async fn update_step(&self, id: StepId, patch: StepPatch) -> Result<Step, StoreError>;

    /// Delete a step
    async fn delete_step(&self, id: StepId) -> Result<Deletion, StoreError>;

    /// Board settings
    async fn load_settings(&self) -> Result<BoardSettings, StoreError>;

    /// Replace board settings
    async fn save_settings(&self, settings: BoardSettings) -> Result<(), StoreError>;
}

/// Gateway operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    ListTickets,
    CreateTicket,
    UpdateTicket,
    DeleteTicket,
    ListSteps,
    CreateStep,
    UpdateStep,
    DeleteStep,
    LoadSettings,
    SaveSettings,
}

/// A call as received by a store, with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    ListTickets,
    CreateTicket(NewTicket),
    UpdateTicket(TicketId, TicketPatch),
    DeleteTicket(TicketId),
    ListSteps,
    CreateStep(NewStep),
    UpdateStep(StepId, StepPatch),
    DeleteStep(StepId),
    LoadSettings,
    SaveSettings(BoardSettings),
}

impl GatewayCall {
    /// Operation kind
    #[must_use]
    pub fn op(&self) -> GatewayOp {
        match self {
            GatewayCall::ListTickets => GatewayOp::ListTickets,
            GatewayCall::CreateTicket(_) => GatewayOp::CreateTicket,
            GatewayCall::UpdateTicket(..) => GatewayOp::UpdateTicket,
            GatewayCall::DeleteTicket(_) => GatewayOp::DeleteTicket,
            GatewayCall::ListSteps => GatewayOp::ListSteps,
            GatewayCall::CreateStep(_) => GatewayOp::CreateStep,
            GatewayCall::UpdateStep(..) => GatewayOp::UpdateStep,
            GatewayCall::DeleteStep(_) => GatewayOp::DeleteStep,
            GatewayCall::LoadSettings => GatewayOp::LoadSettings,
            GatewayCall::SaveSettings(_) => GatewayOp::SaveSettings,
        }
    }

    /// Ticket the call targets, if any
    #[must_use]
    pub fn ticket_id(&self) -> Option<TicketId> {
        match self {
            GatewayCall::UpdateTicket(id, _) | GatewayCall::DeleteTicket(id) => Some(*id),
            _ => None,
        }
    }
}

/// Records held by a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    pub format_version: u32,
    #[serde(default)]
    pub settings: BoardSettings,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            format_version: STORE_FORMAT_VERSION,
            settings: BoardSettings::default(),
            steps: Vec::new(),
            tickets: Vec::new(),
        }
    }
}

fn next_index(indices: impl Iterator<Item = u32>) -> u32 {
    indices.max().map_or(0, |max| max.saturating_add(1))
}

impl StoreState {
    /// Tickets sorted by `order_index`
    #[must_use]
    pub fn sorted_tickets(&self) -> Vec<Ticket> {
        let mut tickets = self.tickets.clone();
        tickets.sort_by_key(|t| t.order_index);
        tickets
    }

    /// Steps sorted by `order_index`
    #[must_use]
    pub fn sorted_steps(&self) -> Vec<Step> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.order_index);
        steps
    }

    pub(crate) fn create_ticket(&mut self, fields: NewTicket) -> Ticket {
        let order_index = fields
            .order_index
            .unwrap_or_else(|| next_index(self.tickets.iter().map(|t| t.order_index)));
        let ticket = Ticket {
            id: TicketId::new(),
            ticket_number: fields.ticket_number,
            color: fields.color,
            notes: fields.notes,
            current_step_id: fields.current_step_id,
            order_index,
        };
        self.tickets.push(ticket.clone());
        ticket
    }

    pub(crate) fn update_ticket(&mut self, id: TicketId, patch: &TicketPatch) -> Result<Ticket, StoreError> {
        let ticket = self
            .tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::ticket_not_found(id))?;
        ticket.apply(patch);
        Ok(ticket.clone())
    }

    pub(crate) fn delete_ticket(&mut self, id: TicketId) -> Deletion {
        let before = self.tickets.len();
        self.tickets.retain(|t| t.id != id);
        if self.tickets.len() < before {
            Deletion::Deleted
        } else {
            Deletion::NotFound
        }
    }

    pub(crate) fn create_step(&mut self, fields: NewStep) -> Step {
        let order_index = fields
            .order_index
            .unwrap_or_else(|| next_index(self.steps.iter().map(|s| s.order_index)));
        let step = Step {
            id: StepId::new(),
            name: fields.name,
            order_index,
        };
        self.steps.push(step.clone());
        step
    }

    pub(crate) fn update_step(&mut self, id: StepId, patch: &StepPatch) -> Result<Step, StoreError> {
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::step_not_found(id))?;
        step.apply(patch);
        Ok(step.clone())
    }

    pub(crate) fn delete_step(&mut self, id: StepId) -> Deletion {
        let before = self.steps.len();
        self.steps.retain(|s| s.id != id);
        if self.steps.len() < before {
            Deletion::Deleted
        } else {
            Deletion::NotFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketboard_model::TicketColor;

    fn new_ticket(number: u32, order_index: Option<u32>) -> NewTicket {
        NewTicket {
            ticket_number: number,
            color: TicketColor::default(),
            notes: String::new(),
            current_step_id: None,
            order_index,
        }
    }

    #[test]
    fn create_appends_after_max_index() {
        let mut state = StoreState::default();
        assert_eq!(state.create_ticket(new_ticket(1, None)).order_index, 0);
        assert_eq!(state.create_ticket(new_ticket(2, Some(7))).order_index, 7);
        assert_eq!(state.create_ticket(new_ticket(3, None)).order_index, 8);
    }

    #[test]
    fn delete_reports_missing_records() {
        let mut state = StoreState::default();
        let step = state.create_step(NewStep::default());
        assert_eq!(state.delete_step(step.id), Deletion::Deleted);
        assert_eq!(state.delete_step(step.id), Deletion::NotFound);
    }

    #[test]
    fn update_missing_ticket_fails() {
        let mut state = StoreState::default();
        let id = TicketId::new();
        let err = state.update_ticket(id, &TicketPatch::new().with_notes("x")).unwrap_err();
        assert_eq!(err, StoreError::ticket_not_found(id));
    }

    #[test]
    fn sorted_views_follow_order_index() {
        let mut state = StoreState::default();
        state.create_step(NewStep {
            name: "b".to_string(),
            order_index: Some(1),
        });
        state.create_step(NewStep {
            name: "a".to_string(),
            order_index: Some(0),
        });
        let names: Vec<_> = state.sorted_steps().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
