//! Ticketboard core
//!
//! Registries and the board facade on top of a [`BoardGateway`]:
//! - [`TicketRegistry`]: tickets, numbering, debounced notes, bulk edits
//! - [`StepRegistry`]: steps, cascading deletes, the settings session
//! - [`Board`]: both registries over one store, plus settings, snapshot
//!   import/export and invariant checks
//!
//! Every mutation is applied to an in-memory mirror first and then written
//! through to the store. A failed write never leaves the mirror in an
//! inconsistent order; whether the mirror keeps the change is decided by the
//! configured [`WritePolicy`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ticketboard_core::prelude::*;
//! use ticketboard_store::MemoryGateway;
//!
//! let board = Board::open(Arc::new(MemoryGateway::new()), BoardConfig::default()).await?;
//! let intake = board.steps().create("Intake").await?;
//! let ticket = board.create_ticket(TicketDraft::new()).await?;
//! assert_eq!(ticket.current_step_id, Some(intake.id));
//! ```
//!
//! [`BoardGateway`]: ticketboard_store::BoardGateway

pub mod board;
pub mod config;
pub mod debounce;
pub mod events;
pub mod invariants;
mod persist;
pub mod snapshot;
pub mod steps;
pub mod tickets;

// Test harness
pub mod test_harness;

// Re-exports
pub use board::{Board, ImportSummary, StepAssignment, TicketDraft};
pub use config::{BoardConfig, ConfigError, WritePolicy};
pub use debounce::NotesDebouncer;
pub use events::{BoardEvent, EventBus};
pub use invariants::{check_board, InvariantViolation};
pub use snapshot::{BoardSnapshot, ImportPlan, SNAPSHOT_FORMAT_VERSION};
pub use steps::{DeletedStep, StepRegistry};
pub use tickets::TicketRegistry;

/// Re-export the types most callers need
pub mod prelude {
    pub use crate::board::{Board, ImportSummary, StepAssignment, TicketDraft};
    pub use crate::config::{BoardConfig, WritePolicy};
    pub use crate::events::BoardEvent;
    pub use crate::snapshot::BoardSnapshot;
    pub use crate::steps::DeletedStep;
    pub use std::sync::Arc;
    pub use ticketboard_model::{
        BoardError, CloseDecision, Direction, NumberingMode, PaletteColor, Step, StepId, Ticket,
        TicketColor, TicketId, TicketPatch,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
