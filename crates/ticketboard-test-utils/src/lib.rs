//! Testing utilities for the ticketboard workspace
//!
//! Shared fixtures: record builders and pre-seeded in-memory stores.

#![allow(missing_docs)]

use std::sync::Arc;
use ticketboard_model::{
    order, BoardSettings, PaletteColor, Step, StepId, Ticket, TicketColor, TicketId,
};
use ticketboard_store::{MemoryGateway, StoreState};

pub fn step(name: &str, order_index: u32) -> Step {
    Step {
        id: StepId::new(),
        name: name.to_string(),
        order_index,
    }
}

pub fn ticket(number: u32, order_index: u32) -> Ticket {
    Ticket {
        id: TicketId::new(),
        ticket_number: number,
        color: TicketColor::Palette(PaletteColor::default()),
        notes: String::new(),
        current_step_id: None,
        order_index,
    }
}

pub fn ticket_on(number: u32, order_index: u32, step: StepId) -> Ticket {
    Ticket {
        current_step_id: Some(step),
        ..ticket(number, order_index)
    }
}

/// Dense steps named in order
pub fn steps(names: &[&str]) -> Vec<Step> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| step(name, order::to_index(i)))
        .collect()
}

/// Dense tickets with the given numbers, all unassigned
pub fn tickets(numbers: &[u32]) -> Vec<Ticket> {
    numbers
        .iter()
        .enumerate()
        .map(|(i, n)| ticket(*n, order::to_index(i)))
        .collect()
}

pub fn state(steps: Vec<Step>, tickets: Vec<Ticket>) -> StoreState {
    StoreState {
        steps,
        tickets,
        ..StoreState::default()
    }
}

pub fn sequential_state(steps: Vec<Step>, tickets: Vec<Ticket>) -> StoreState {
    StoreState {
        settings: BoardSettings {
            sequential_numbering: true,
        },
        ..state(steps, tickets)
    }
}

pub fn gateway(state: StoreState) -> Arc<MemoryGateway> {
    Arc::new(MemoryGateway::from_state(state))
}

/// "Todo", "Doing", "Done" with three tickets on "Todo"
pub fn kanban_gateway() -> (Arc<MemoryGateway>, Vec<Step>, Vec<Ticket>) {
    let steps = steps(&["Todo", "Doing", "Done"]);
    let tickets: Vec<Ticket> = [11, 22, 33]
        .iter()
        .enumerate()
        .map(|(i, n)| ticket_on(*n, order::to_index(i), steps[0].id))
        .collect();
    let gateway = gateway(state(steps.clone(), tickets.clone()));
    (gateway, steps, tickets)
}

/// Ticket numbers in listing order
pub fn numbers(tickets: &[Ticket]) -> Vec<u32> {
    tickets.iter().map(|t| t.ticket_number).collect()
}

pub fn names(steps: &[Step]) -> Vec<String> {
    steps.iter().map(|s| s.name.clone()).collect()
}
