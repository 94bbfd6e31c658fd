//! Ticketboard model
//!
//! Plain data and pure bookkeeping for a single-board ticket tracker:
//! - Ticket and step entities with their partial-update shapes
//! - Palette and custom hex colors
//! - Dense `order_index` maintenance shared by tickets and steps
//! - Ticket numbering (random two-digit or sequential)
//! - The settings-session change ledger
//!
//! Nothing in this crate performs I/O. Persistence lives behind the gateway
//! trait in `ticketboard-store`, and the registries that tie the two together
//! live in `ticketboard-core`.
//!
//! # Example
//!
//! ```rust
//! use ticketboard_model::order;
//! use ticketboard_model::{NumberingMode, NumberingPolicy};
//!
//! let mut numbers = NumberingPolicy::new(NumberingMode::Sequential);
//! numbers.seed_used([5, 7, 12]);
//! assert_eq!(numbers.next_number(), 13);
//!
//! let side = order::drop_side(
//!     order::Axis::Horizontal,
//!     order::Point { x: 10.0, y: 0.0 },
//!     order::Rect { x: 0.0, y: 0.0, width: 40.0, height: 20.0 },
//! );
//! assert_eq!(side, order::DropSide::Before);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod color;
pub mod error;
pub mod ledger;
pub mod numbering;
pub mod order;
pub mod types;

pub use color::{HexColor, PaletteColor, TicketColor};
pub use error::{BoardError, EntityKind, StoreError, ValidationError};
pub use ledger::{ChangeLedger, CloseDecision, DiscardDirective, LedgerEntry};
pub use numbering::{NumberingMode, NumberingPolicy};
pub use order::{IndexChange, Ordered};
pub use types::{
    BoardSettings, Direction, NewStep, NewTicket, Step, StepId, StepPatch, Ticket, TicketId,
    TicketPatch,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
