//! Error types for the board
//!
//! Three layers, matching where a failure can originate:
//! - [`ValidationError`]: rejected before any state changes
//! - [`StoreError`]: raised by a persistence gateway
//! - [`BoardError`]: what registry operations return to callers

use crate::types::{StepId, TicketId};
use std::fmt;

/// Entity collections held by the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A ticket card
    Ticket,
    /// A workflow step
    Step,
    /// Board-wide settings
    Settings,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Ticket => f.write_str("ticket"),
            EntityKind::Step => f.write_str("step"),
            EntityKind::Settings => f.write_str("settings"),
        }
    }
}

/// Input rejected before touching the mirror or the store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Ticket numbers are positive integers
    #[error("ticket number must be a positive integer, got {0}")]
    InvalidNumber(u32),

    /// Number already issued to another ticket
    #[error("ticket number {0} is already in use")]
    DuplicateNumber(u32),

    /// Step reference that is not on the board
    #[error("unknown step: {0}")]
    UnknownStep(StepId),

    /// Not a palette token and not a `#rrggbb` triplet
    #[error("invalid color {0:?}: expected a palette token or #rrggbb")]
    InvalidColor(String),

    /// Position outside the sequence
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Imported snapshot is inconsistent
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Failure reported by a persistence gateway
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Record does not exist in the store
    #[error("{entity} {id} not found in store")]
    NotFound { entity: EntityKind, id: String },

    /// Store could not be reached or refused the request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the backing medium failed
    #[error("store i/o failed: {0}")]
    Io(String),

    /// Backing data could not be decoded
    #[error("store data corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Missing ticket record
    #[inline]
    #[must_use]
    pub fn ticket_not_found(id: TicketId) -> Self {
        Self::NotFound {
            entity: EntityKind::Ticket,
            id: id.to_string(),
        }
    }

    /// Missing step record
    #[inline]
    #[must_use]
    pub fn step_not_found(id: StepId) -> Self {
        Self::NotFound {
            entity: EntityKind::Step,
            id: id.to_string(),
        }
    }
}

/// Error returned by board operations
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// Input rejected; nothing changed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A single persistence call failed
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// Entity is not in the local mirror
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },

    /// Some calls of a batch failed; the rest went through
    #[error("{} of {total} persistence calls failed", errors.len())]
    PartialPersistence {
        /// Calls issued
        total: usize,
        /// One entry per failed call
        errors: Vec<StoreError>,
    },
}

impl BoardError {
    /// Ticket missing from the mirror
    #[inline]
    #[must_use]
    pub fn ticket_not_found(id: TicketId) -> Self {
        Self::NotFound {
            entity: EntityKind::Ticket,
            id: id.to_string(),
        }
    }

    /// Step missing from the mirror
    #[inline]
    #[must_use]
    pub fn step_not_found(id: StepId) -> Self {
        Self::NotFound {
            entity: EntityKind::Step,
            id: id.to_string(),
        }
    }

    /// Check if the error was raised before any mutation
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound { .. })
    }

    /// Check if repeating the operation could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Persistence(StoreError::Unavailable(_) | StoreError::Io(_))
                | Self::PartialPersistence { .. }
        )
    }

    /// Fold the outcome of a joined batch into a single result
    ///
    /// `total` is the number of calls issued; the batch fails only when at
    /// least one of them failed.
    pub fn from_batch(total: usize, errors: Vec<StoreError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::PartialPersistence { total, errors })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = ValidationError::DuplicateNumber(42);
        assert_eq!(err.to_string(), "ticket number 42 is already in use");
    }

    #[test]
    fn board_error_classification() {
        let err = BoardError::from(ValidationError::InvalidNumber(0));
        assert!(err.is_validation());
        assert!(!err.is_retryable());

        let err = BoardError::from(StoreError::Unavailable("down".to_string()));
        assert!(!err.is_validation());
        assert!(err.is_retryable());

        let err = BoardError::ticket_not_found(TicketId::new());
        assert!(err.is_validation());
    }

    #[test]
    fn batch_outcome() {
        assert!(BoardError::from_batch(3, vec![]).is_ok());

        let err = BoardError::from_batch(3, vec![StoreError::Io("disk".to_string())]).unwrap_err();
        assert_eq!(err.to_string(), "1 of 3 persistence calls failed");
    }
}
