//! Core entity types
//!
//! Defines the two entity collections of a board and their update shapes:
//! - Tickets and steps as mirrored locally and stored remotely
//! - Creation field sets (`NewTicket`, `NewStep`)
//! - Partial update field sets (`TicketPatch`, `StepPatch`)
//! - Persisted board settings

use crate::color::TicketColor;
use crate::numbering::NumberingMode;
use crate::order::Ordered;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Ticket identifier, assigned by the store on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(pub Ulid);

impl TicketId {
    /// Generate new ticket ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Step identifier, assigned by the store on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepId(pub Ulid);

impl StepId {
    /// Generate new step ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StepId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// A ticket card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Store-assigned identifier
    pub id: TicketId,
    /// Human-facing number, unique across the board
    pub ticket_number: u32,
    /// Card color
    pub color: TicketColor,
    /// Free text
    #[serde(default)]
    pub notes: String,
    /// Workflow step, `None` when unassigned
    #[serde(default)]
    pub current_step_id: Option<StepId>,
    /// Position in the board order
    pub order_index: u32,
}

impl Ticket {
    /// Number as shown on the card, zero-padded to two digits
    #[inline]
    #[must_use]
    pub fn display_number(&self) -> String {
        format!("{:02}", self.ticket_number)
    }

    /// Apply a partial update, returning the patch that undoes it
    pub fn apply(&mut self, patch: &TicketPatch) -> TicketPatch {
        let mut undo = TicketPatch::default();
        if let Some(n) = patch.ticket_number {
            undo.ticket_number = Some(std::mem::replace(&mut self.ticket_number, n));
        }
        if let Some(c) = patch.color {
            undo.color = Some(std::mem::replace(&mut self.color, c));
        }
        if let Some(notes) = &patch.notes {
            undo.notes = Some(std::mem::replace(&mut self.notes, notes.clone()));
        }
        if let Some(step) = patch.current_step_id {
            undo.current_step_id = Some(std::mem::replace(&mut self.current_step_id, step));
        }
        if let Some(i) = patch.order_index {
            undo.order_index = Some(std::mem::replace(&mut self.order_index, i));
        }
        undo
    }
}

impl Ordered for Ticket {
    type Id = TicketId;

    fn id(&self) -> TicketId {
        self.id
    }

    fn order_index(&self) -> u32 {
        self.order_index
    }

    fn set_order_index(&mut self, index: u32) {
        self.order_index = index;
    }
}

/// Fields for creating a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    /// Number already validated by the caller
    pub ticket_number: u32,
    /// Card color
    pub color: TicketColor,
    /// Free text
    #[serde(default)]
    pub notes: String,
    /// Starting step
    #[serde(default)]
    pub current_step_id: Option<StepId>,
    /// Appended after the current maximum when omitted
    #[serde(default)]
    pub order_index: Option<u32>,
}

/// Partial ticket update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketPatch {
    /// New number
    pub ticket_number: Option<u32>,
    /// New color
    pub color: Option<TicketColor>,
    /// Replacement notes
    pub notes: Option<String>,
    /// `Some(None)` clears the step
    pub current_step_id: Option<Option<StepId>>,
    /// New position
    pub order_index: Option<u32>,
}

impl TicketPatch {
    /// Empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_number(mut self, number: u32) -> Self {
        self.ticket_number = Some(number);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_color(mut self, color: TicketColor) -> Self {
        self.color = Some(color);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_step(mut self, step: Option<StepId>) -> Self {
        self.current_step_id = Some(step);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_order_index(mut self, index: u32) -> Self {
        self.order_index = Some(index);
        self
    }

    /// Check if the patch changes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A workflow step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Store-assigned identifier
    pub id: StepId,
    /// Name as entered; may be blank
    #[serde(default)]
    pub name: String,
    /// Position in the workflow
    pub order_index: u32,
}

impl Step {
    /// Label shown to users; blank names render as "Step N"
    #[must_use]
    pub fn display_name(&self) -> String {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            format!("Step {}", self.order_index + 1)
        } else {
            trimmed.to_string()
        }
    }

    /// Apply a partial update, returning the patch that undoes it
    pub fn apply(&mut self, patch: &StepPatch) -> StepPatch {
        let mut undo = StepPatch::default();
        if let Some(name) = &patch.name {
            undo.name = Some(std::mem::replace(&mut self.name, name.clone()));
        }
        if let Some(i) = patch.order_index {
            undo.order_index = Some(std::mem::replace(&mut self.order_index, i));
        }
        undo
    }
}

impl Ordered for Step {
    type Id = StepId;

    fn id(&self) -> StepId {
        self.id
    }

    fn order_index(&self) -> u32 {
        self.order_index
    }

    fn set_order_index(&mut self, index: u32) {
        self.order_index = index;
    }
}

/// Fields for creating a step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStep {
    /// Name as entered
    #[serde(default)]
    pub name: String,
    /// Appended after the current maximum when omitted
    #[serde(default)]
    pub order_index: Option<u32>,
}

/// Partial step update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepPatch {
    /// New name
    pub name: Option<String>,
    /// New position
    pub order_index: Option<u32>,
}

impl StepPatch {
    #[inline]
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            order_index: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn reorder(index: u32) -> Self {
        Self {
            name: None,
            order_index: Some(index),
        }
    }
}

/// Settings persisted alongside the entities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSettings {
    /// Sequential numbering when set, random two-digit otherwise
    #[serde(default)]
    pub sequential_numbering: bool,
}

impl BoardSettings {
    /// Numbering mode selected by the flag
    #[inline]
    #[must_use]
    pub fn numbering_mode(&self) -> NumberingMode {
        if self.sequential_numbering {
            NumberingMode::Sequential
        } else {
            NumberingMode::Random
        }
    }
}

/// Direction of step navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards the first step
    Left,
    /// Towards the last step
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PaletteColor;

    fn ticket(number: u32) -> Ticket {
        Ticket {
            id: TicketId::new(),
            ticket_number: number,
            color: TicketColor::Palette(PaletteColor::Blue),
            notes: String::new(),
            current_step_id: None,
            order_index: 0,
        }
    }

    #[test]
    fn display_number_is_zero_padded() {
        assert_eq!(ticket(7).display_number(), "07");
        assert_eq!(ticket(42).display_number(), "42");
        assert_eq!(ticket(120).display_number(), "120");
    }

    #[test]
    fn apply_returns_inverse() {
        let mut t = ticket(3);
        let step = StepId::new();
        let original = t.clone();

        let undo = t.apply(&TicketPatch::new().with_notes("hello").with_step(Some(step)));
        assert_eq!(t.notes, "hello");
        assert_eq!(t.current_step_id, Some(step));

        t.apply(&undo);
        assert_eq!(t, original);
    }

    #[test]
    fn blank_step_name_renders_placeholder() {
        let step = Step {
            id: StepId::new(),
            name: "   ".to_string(),
            order_index: 2,
        };
        assert_eq!(step.display_name(), "Step 3");
    }

    #[test]
    fn ids_roundtrip_through_strings() {
        let id = StepId::new();
        assert_eq!(id.to_string().parse::<StepId>().unwrap(), id);
        assert!("not-a-ulid".parse::<TicketId>().is_err());
    }

    #[test]
    fn settings_flag_selects_mode() {
        assert_eq!(BoardSettings::default().numbering_mode(), NumberingMode::Random);
        let settings = BoardSettings {
            sequential_numbering: true,
        };
        assert_eq!(settings.numbering_mode(), NumberingMode::Sequential);
    }
}
