//! Board invariant checks
//!
//! Run against the local mirror after any sequence of operations, including
//! ones with failed persistence calls. Used by the simulator and the `check`
//! command.

use std::collections::{BTreeSet, HashMap, HashSet};
use ticketboard_model::{Step, StepId, Ticket, TicketId};

/// A broken board invariant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("ticket number {number} is held by {count} tickets")]
    DuplicateNumber { number: u32, count: usize },

    #[error("ticket {ticket} has invalid number 0")]
    ZeroNumber { ticket: TicketId },

    #[error("ticket number {number} is not in the used set")]
    UnreservedNumber { number: u32 },

    #[error("ticket {ticket} at position {position} has order_index {order_index}")]
    TicketOrder {
        ticket: TicketId,
        position: usize,
        order_index: u32,
    },

    #[error("step {step} at position {position} has order_index {order_index}")]
    StepOrder {
        step: StepId,
        position: usize,
        order_index: u32,
    },

    #[error("ticket {ticket} references missing step {step}")]
    DanglingStep { ticket: TicketId, step: StepId },
}

/// Check tickets and steps (in display order) against the used-number set
#[must_use]
pub fn check_board(tickets: &[Ticket], steps: &[Step], used: &BTreeSet<u32>) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    let mut holders: HashMap<u32, usize> = HashMap::new();
    for ticket in tickets {
        *holders.entry(ticket.ticket_number).or_default() += 1;
        if ticket.ticket_number == 0 {
            violations.push(InvariantViolation::ZeroNumber { ticket: ticket.id });
        }
    }
    let mut numbers: Vec<_> = holders.into_iter().collect();
    numbers.sort_unstable();
    for (number, count) in numbers {
        if count > 1 {
            violations.push(InvariantViolation::DuplicateNumber { number, count });
        }
        if !used.contains(&number) {
            violations.push(InvariantViolation::UnreservedNumber { number });
        }
    }

    for (position, ticket) in tickets.iter().enumerate() {
        if usize::try_from(ticket.order_index).ok() != Some(position) {
            violations.push(InvariantViolation::TicketOrder {
                ticket: ticket.id,
                position,
                order_index: ticket.order_index,
            });
        }
    }
    for (position, step) in steps.iter().enumerate() {
        if usize::try_from(step.order_index).ok() != Some(position) {
            violations.push(InvariantViolation::StepOrder {
                step: step.id,
                position,
                order_index: step.order_index,
            });
        }
    }

    let step_ids: HashSet<StepId> = steps.iter().map(|s| s.id).collect();
    for ticket in tickets {
        if let Some(step) = ticket.current_step_id {
            if !step_ids.contains(&step) {
                violations.push(InvariantViolation::DanglingStep {
                    ticket: ticket.id,
                    step,
                });
            }
        }
    }

    violations
}
