//! Settings-session change ledger
//!
//! While the settings panel is open, every structural step edit is logged
//! with a human-readable description. Renames only flip the dirty flag. On
//! close, a dirty session must be confirmed before its edits are discarded.

use crate::types::Step;
use std::fmt;

/// One structural step edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    /// Step appended
    StepAdded {
        /// Display name at the time of the edit
        name: String,
    },
    /// Step removed
    StepDeleted {
        /// Display name at the time of the edit
        name: String,
    },
    /// Step moved; positions are zero-based
    StepMoved {
        /// Display name at the time of the edit
        name: String,
        /// Position before the move
        from: usize,
        /// Position after the move
        to: usize,
    },
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEntry::StepAdded { name } => write!(f, "Added step \"{name}\""),
            LedgerEntry::StepDeleted { name } => write!(f, "Deleted step \"{name}\""),
            LedgerEntry::StepMoved { name, from, to } => write!(
                f,
                "Moved step \"{name}\" from position {} to {}",
                from + 1,
                to + 1
            ),
        }
    }
}

/// What the caller must do after a discard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardDirective {
    /// Reload steps and tickets from the store
    ReloadFromStore,
}

/// Outcome of asking to close the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseDecision {
    /// Nothing pending; the session is closed
    Closed,
    /// Edits pending; show these descriptions and ask before discarding
    ConfirmDiscard(Vec<String>),
}

/// Change ledger for one settings-editing session
#[derive(Debug, Clone, Default)]
pub struct ChangeLedger {
    open: bool,
    entries: Vec<LedgerEntry>,
    dirty: bool,
    snapshot: Vec<Step>,
}

impl ChangeLedger {
    /// Create a closed ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session, capturing the steps as they are now
    pub fn open(&mut self, steps: Vec<Step>) {
        self.open = true;
        self.entries.clear();
        self.dirty = false;
        self.snapshot = steps;
    }

    /// Check if a session is running
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Log a structural edit; ignored outside a session
    pub fn record(&mut self, entry: LedgerEntry) {
        if self.open {
            self.dirty = true;
            self.entries.push(entry);
        }
    }

    /// Flag an in-place edit; ignored outside a session
    #[inline]
    pub fn mark_dirty(&mut self) {
        if self.open {
            self.dirty = true;
        }
    }

    /// Check if the session holds unsaved edits
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.entries.is_empty() || self.dirty
    }

    /// Logged entries, oldest first
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Entries rendered for a confirmation prompt
    #[must_use]
    pub fn descriptions(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    /// Steps as they were at open or last commit
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> &[Step] {
        &self.snapshot
    }

    /// Accept the edits after an explicit save
    pub fn commit(&mut self, steps: Vec<Step>) {
        self.entries.clear();
        self.dirty = false;
        self.snapshot = steps;
    }

    /// Abandon the edits and end the session
    pub fn discard(&mut self) -> DiscardDirective {
        self.entries.clear();
        self.dirty = false;
        self.open = false;
        DiscardDirective::ReloadFromStore
    }

    /// Try to end the session
    ///
    /// A dirty session stays open until the caller either commits or
    /// discards.
    pub fn close(&mut self) -> CloseDecision {
        if self.is_dirty() {
            let mut descriptions = self.descriptions();
            if descriptions.is_empty() {
                descriptions.push("Renamed steps".to_string());
            }
            return CloseDecision::ConfirmDiscard(descriptions);
        }
        self.open = false;
        self.snapshot.clear();
        CloseDecision::Closed
    }
}
