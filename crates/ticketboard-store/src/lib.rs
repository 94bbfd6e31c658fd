//! Ticketboard persistence gateway
//!
//! The board only needs create/read/update/delete by id and bulk reads for
//! its two entity collections, plus one settings record. [`BoardGateway`]
//! captures that contract; two implementations ship here:
//!
//! - [`MemoryGateway`]: ephemeral, with a call journal and fault injection
//!   for tests and simulation
//! - [`FileGateway`]: durable JSON file, rewritten atomically after every
//!   mutation
//!
//! # Example
//!
//! ```rust,ignore
//! use ticketboard_store::{BoardGateway, MemoryGateway};
//! use ticketboard_model::NewStep;
//!
//! let gateway = MemoryGateway::new();
//! let step = gateway.create_step(NewStep { name: "Intake".into(), order_index: None }).await?;
//! assert_eq!(step.order_index, 0);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod file;
pub mod gateway;
pub mod memory;

pub use file::FileGateway;
pub use gateway::{BoardGateway, Deletion, GatewayCall, GatewayOp, StoreState, STORE_FORMAT_VERSION};
pub use memory::MemoryGateway;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
