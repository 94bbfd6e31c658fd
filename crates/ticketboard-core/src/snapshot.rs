//! Board snapshots
//!
//! A snapshot is a self-contained JSON document holding the settings, the
//! steps and the tickets of one board. Importing validates the document and
//! produces an [`ImportPlan`] with both sequences sorted and dangling step
//! references counted; the board then replays the plan into its store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use ticketboard_model::{BoardSettings, Step, StepId, Ticket, ValidationError};

/// Current snapshot layout
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Exported board contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub settings: BoardSettings,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

/// Validated snapshot contents, ready to be written to a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    pub settings: BoardSettings,
    /// Steps sorted by `order_index`
    pub steps: Vec<Step>,
    /// Tickets sorted by `order_index`
    pub tickets: Vec<Ticket>,
    /// Tickets whose step is not in the snapshot; imported unassigned
    pub dangling: usize,
}

impl BoardSnapshot {
    /// Capture a board as it is now
    #[must_use]
    pub fn new(settings: BoardSettings, steps: Vec<Step>, tickets: Vec<Ticket>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            exported_at: Utc::now(),
            settings,
            steps,
            tickets,
        }
    }

    /// Render as pretty-printed JSON
    ///
    /// # Errors
    /// - `serde_json::Error` if serialization fails
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a JSON document
    ///
    /// # Errors
    /// - `ValidationError::InvalidSnapshot` for malformed JSON or invalid
    ///   colors
    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(text).map_err(|e| ValidationError::InvalidSnapshot(e.to_string()))
    }

    /// Validate and sort the contents
    ///
    /// # Errors
    /// - `ValidationError::InvalidSnapshot` for an unknown version or
    ///   repeated step ids
    /// - `ValidationError::InvalidNumber` for a zero ticket number
    /// - `ValidationError::DuplicateNumber` for a number held twice
    pub fn plan(&self) -> Result<ImportPlan, ValidationError> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(ValidationError::InvalidSnapshot(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }

        let mut step_ids: HashSet<StepId> = HashSet::new();
        for step in &self.steps {
            if !step_ids.insert(step.id) {
                return Err(ValidationError::InvalidSnapshot(format!(
                    "step {} appears twice",
                    step.id
                )));
            }
        }

        let mut numbers = BTreeSet::new();
        for ticket in &self.tickets {
            if ticket.ticket_number == 0 {
                return Err(ValidationError::InvalidNumber(0));
            }
            if !numbers.insert(ticket.ticket_number) {
                return Err(ValidationError::DuplicateNumber(ticket.ticket_number));
            }
        }

        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.order_index);
        let mut tickets = self.tickets.clone();
        tickets.sort_by_key(|t| t.order_index);
        let dangling = tickets
            .iter()
            .filter(|t| t.current_step_id.is_some_and(|s| !step_ids.contains(&s)))
            .count();

        Ok(ImportPlan {
            settings: self.settings,
            steps,
            tickets,
            dangling,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ticketboard_model::{TicketColor, TicketId};

    fn ticket(number: u32, index: u32, step: Option<StepId>) -> Ticket {
        Ticket {
            id: TicketId::new(),
            ticket_number: number,
            color: TicketColor::default(),
            notes: String::new(),
            current_step_id: step,
            order_index: index,
        }
    }

    #[test]
    fn json_roundtrip_preserves_contents() {
        let step = Step {
            id: StepId::new(),
            name: "Intake".to_string(),
            order_index: 0,
        };
        let snapshot = BoardSnapshot::new(
            BoardSettings {
                sequential_numbering: true,
            },
            vec![step.clone()],
            vec![ticket(12, 0, Some(step.id))],
        );

        let parsed = BoardSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn plan_sorts_and_counts_dangling_steps() {
        let snapshot = BoardSnapshot::new(
            BoardSettings::default(),
            vec![],
            vec![ticket(2, 5, Some(StepId::new())), ticket(1, 1, None)],
        );
        let plan = snapshot.plan().unwrap();

        let numbers: Vec<u32> = plan.tickets.iter().map(|t| t.ticket_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(plan.dangling, 1);
    }

    #[test]
    fn plan_rejects_duplicate_numbers() {
        let snapshot = BoardSnapshot::new(
            BoardSettings::default(),
            vec![],
            vec![ticket(7, 0, None), ticket(7, 1, None)],
        );
        assert_eq!(snapshot.plan(), Err(ValidationError::DuplicateNumber(7)));
    }

    #[test]
    fn bad_color_is_an_invalid_snapshot() {
        let text = r##"{
            "format_version": 1,
            "exported_at": "2024-01-01T00:00:00Z",
            "tickets": [{
                "id": "01HZ0000000000000000000000",
                "ticket_number": 3,
                "color": "#12345",
                "order_index": 0
            }]
        }"##;
        assert!(matches!(
            BoardSnapshot::from_json(text),
            Err(ValidationError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut snapshot = BoardSnapshot::new(BoardSettings::default(), vec![], vec![]);
        snapshot.format_version = 2;
        assert!(matches!(snapshot.plan(), Err(ValidationError::InvalidSnapshot(_))));
    }
}
