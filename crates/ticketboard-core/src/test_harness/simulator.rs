//! Board simulator
//!
//! Drives a [`Board`] over a [`MemoryGateway`] with a seeded stream of random
//! operations, optionally taking the store offline for some of them, and
//! checks the board invariants after every step.
//!
//! Invariants checked:
//! - Unique, positive, reserved ticket numbers
//! - Dense `order_index` for tickets and steps
//! - No ticket on a missing step
//! - With no injected faults: the store ends identical to the mirror

use crate::board::{Board, StepAssignment, TicketDraft};
use crate::config::BoardConfig;
use crate::invariants::InvariantViolation;
use crate::steps::DeletedStep;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use ticketboard_model::{BoardError, Direction, HexColor, NumberingMode, PaletteColor, TicketColor};
use ticketboard_store::{BoardGateway, MemoryGateway};

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Operations to run
    pub operations: u64,
    /// Probability that the store is offline for an operation
    pub fault_rate: f64,
    /// Stop at the first violation
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            operations: 500,
            fault_rate: 0.0,
            stop_on_first_violation: true,
        }
    }
}

/// Operation drawn by the simulator
///
/// Targets are positions into the current ticket or step list, taken modulo
/// its length when the operation runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulatedOperation {
    CreateTicket { number: Option<u32>, at: Option<usize> },
    DeleteTicket(usize),
    MoveTicket { from: usize, to: usize },
    AdvanceTicket(usize, Direction),
    SetNumber(usize, u32),
    SetColor(usize, TicketColor),
    EditNotes(usize, String),
    BulkDelete(Vec<usize>),
    CreateStep(String),
    RenameStep(usize, String),
    DeleteStep(usize),
    UndoStepDelete,
    MoveStep { from: usize, delta: isize },
    ToggleNumbering,
}

/// A violation detected during simulation
#[derive(Debug, Clone)]
pub enum Violation {
    /// Mirror broke an invariant after an operation
    Invariant {
        step: u64,
        operation: SimulatedOperation,
        violation: InvariantViolation,
    },
    /// Store and mirror disagree at the end of a fault-free run
    StoreDiverged { detail: String },
}

/// Statistics for simulation
#[derive(Debug, Clone, Default)]
pub struct SimulatorStats {
    pub operations_run: u64,
    pub succeeded: u64,
    pub rejected: u64,
    pub persistence_failed: u64,
    pub faults_injected: u64,
    pub final_tickets: usize,
    pub final_steps: usize,
}

/// Final report from simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        let _ = writeln!(report, "=== Ticketboard Simulator Report ===\n");
        let _ = writeln!(report, "Seed: {}", self.config.seed);
        let _ = writeln!(report, "Fault Rate: {:.2}", self.config.fault_rate);
        let _ = writeln!(report, "Operations Run: {}", self.stats.operations_run);
        let _ = writeln!(report, "Succeeded: {}", self.stats.succeeded);
        let _ = writeln!(report, "Rejected: {}", self.stats.rejected);
        let _ = writeln!(report, "Persistence Failed: {}", self.stats.persistence_failed);
        let _ = writeln!(report, "Faults Injected: {}", self.stats.faults_injected);
        let _ = writeln!(report, "Final Tickets: {}", self.stats.final_tickets);
        let _ = writeln!(report, "Final Steps: {}", self.stats.final_steps);
        let _ = writeln!(report, "Violations: {}", self.violations.len());

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(report, "{}. {v:?}", i + 1);
            }
        }

        let _ = writeln!(
            report,
            "\n=== Result: {} ===",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        report
    }
}

/// Run the simulator
///
/// # Errors
/// - `BoardError` if the board cannot be opened or the final flush fails
pub async fn run_simulator(config: SimulatorConfig) -> Result<SimulatorReport, BoardError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let gateway = Arc::new(MemoryGateway::new());
    let board_config = BoardConfig::new()
        .with_seed(config.seed)
        .with_quiet_period(Duration::ZERO);
    let board = Board::open(gateway.clone(), board_config).await?;

    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();
    let mut undo: Option<DeletedStep> = None;
    let fault_rate = config.fault_rate.clamp(0.0, 1.0);

    for step in 0..config.operations {
        let operation = generate_operation(&mut rng);
        let fault = fault_rate > 0.0 && rng.random_bool(fault_rate);
        if fault {
            stats.faults_injected += 1;
            gateway.set_offline(true);
        }

        stats.operations_run += 1;
        match execute_operation(&board, &operation, &mut undo).await {
            Ok(()) => stats.succeeded += 1,
            Err(e) if e.is_validation() => stats.rejected += 1,
            Err(_) => stats.persistence_failed += 1,
        }
        gateway.set_offline(false);

        let found = board.check_invariants();
        let stop = config.stop_on_first_violation && !found.is_empty();
        violations.extend(found.into_iter().map(|violation| Violation::Invariant {
            step,
            operation: operation.clone(),
            violation,
        }));
        if stop {
            break;
        }
    }

    board.flush_notes().await?;
    if stats.faults_injected == 0 {
        violations.extend(compare_with_store(&board, gateway.as_ref()).await?);
    }

    stats.final_tickets = board.tickets().len();
    stats.final_steps = board.steps().len();
    tracing::info!(
        seed = config.seed,
        operations = stats.operations_run,
        violations = violations.len(),
        "simulation finished"
    );

    Ok(SimulatorReport {
        config,
        stats,
        violations,
    })
}

async fn compare_with_store(board: &Board, gateway: &dyn BoardGateway) -> Result<Vec<Violation>, BoardError> {
    let mut violations = Vec::new();
    if gateway.list_steps().await? != board.steps().list() {
        violations.push(Violation::StoreDiverged {
            detail: "steps differ between store and mirror".to_string(),
        });
    }
    if gateway.list_tickets().await? != board.tickets().list() {
        violations.push(Violation::StoreDiverged {
            detail: "tickets differ between store and mirror".to_string(),
        });
    }
    Ok(violations)
}

fn generate_operation(rng: &mut StdRng) -> SimulatedOperation {
    let target = rng.random_range(0..64usize);
    match rng.random_range(0..100u32) {
        0..=21 => SimulatedOperation::CreateTicket {
            number: rng.random_bool(0.2).then(|| rng.random_range(1..=120)),
            at: rng.random_bool(0.3).then(|| rng.random_range(0..10)),
        },
        22..=31 => SimulatedOperation::DeleteTicket(target),
        32..=41 => SimulatedOperation::MoveTicket {
            from: target,
            to: rng.random_range(0..12),
        },
        42..=51 => SimulatedOperation::AdvanceTicket(
            target,
            if rng.random_bool(0.5) {
                Direction::Left
            } else {
                Direction::Right
            },
        ),
        52..=56 => SimulatedOperation::SetNumber(target, rng.random_range(0..=120)),
        57..=61 => SimulatedOperation::SetColor(target, random_color(rng)),
        62..=67 => SimulatedOperation::EditNotes(target, format!("note {}", rng.random_range(0..1000))),
        68..=69 => SimulatedOperation::BulkDelete(
            (0..rng.random_range(1..4)).map(|_| rng.random_range(0..64)).collect(),
        ),
        70..=79 => SimulatedOperation::CreateStep(format!("Step {}", rng.random_range(0..100))),
        80..=83 => SimulatedOperation::RenameStep(target, format!("Renamed {}", rng.random_range(0..100))),
        84..=88 => SimulatedOperation::DeleteStep(target),
        89..=91 => SimulatedOperation::UndoStepDelete,
        92..=97 => SimulatedOperation::MoveStep {
            from: target,
            delta: if rng.random_bool(0.5) { -1 } else { 1 },
        },
        _ => SimulatedOperation::ToggleNumbering,
    }
}

fn random_color(rng: &mut StdRng) -> TicketColor {
    if rng.random_bool(0.7) {
        TicketColor::Palette(PaletteColor::ALL[rng.random_range(0..PaletteColor::ALL.len())])
    } else {
        let [r, g, b]: [u8; 3] = rng.random();
        TicketColor::Custom(HexColor::from_rgb(r, g, b))
    }
}

async fn execute_operation(
    board: &Board,
    operation: &SimulatedOperation,
    undo: &mut Option<DeletedStep>,
) -> Result<(), BoardError> {
    let tickets = board.tickets().ids();
    let steps = board.steps().ids();
    let ticket_at = |i: usize| (!tickets.is_empty()).then(|| tickets[i % tickets.len()]);
    let step_at = |i: usize| (!steps.is_empty()).then(|| steps[i % steps.len()]);

    match operation {
        SimulatedOperation::CreateTicket { number, at } => {
            let mut draft = TicketDraft::new().with_step(StepAssignment::FirstStep);
            draft.number = *number;
            draft.index = *at;
            board.create_ticket(draft).await.map(drop)
        }
        SimulatedOperation::DeleteTicket(i) => match ticket_at(*i) {
            Some(id) => board.tickets().delete(id).await.map(drop),
            None => Ok(()),
        },
        SimulatedOperation::MoveTicket { from, to } => match ticket_at(*from) {
            Some(id) => board.tickets().move_to(id, *to).await,
            None => Ok(()),
        },
        SimulatedOperation::AdvanceTicket(i, direction) => match ticket_at(*i) {
            Some(id) => board.advance_ticket(id, *direction).await.map(drop),
            None => Ok(()),
        },
        SimulatedOperation::SetNumber(i, number) => match ticket_at(*i) {
            Some(id) => board.tickets().set_number(id, *number).await.map(drop),
            None => Ok(()),
        },
        SimulatedOperation::SetColor(i, color) => match ticket_at(*i) {
            Some(id) => board.tickets().set_color(id, *color).await.map(drop),
            None => Ok(()),
        },
        SimulatedOperation::EditNotes(i, text) => match ticket_at(*i) {
            Some(id) => board.tickets().update_notes_debounced(id, text.clone()),
            None => Ok(()),
        },
        SimulatedOperation::BulkDelete(picks) => {
            let ids: Vec<_> = picks.iter().filter_map(|i| ticket_at(*i)).collect();
            board.tickets().delete_many(&ids).await.map(drop)
        }
        SimulatedOperation::CreateStep(name) => board.steps().create(name.clone()).await.map(drop),
        SimulatedOperation::RenameStep(i, name) => match step_at(*i) {
            Some(id) => board.steps().rename(id, name.clone()).await.map(drop),
            None => Ok(()),
        },
        SimulatedOperation::DeleteStep(i) => match step_at(*i) {
            Some(id) => {
                *undo = Some(board.delete_step(id).await?);
                Ok(())
            }
            None => Ok(()),
        },
        SimulatedOperation::UndoStepDelete => match undo.take() {
            Some(deleted) => board.undo_step_delete(deleted).await.map(drop),
            None => Ok(()),
        },
        SimulatedOperation::MoveStep { from, delta } => match step_at(*from) {
            Some(id) => board.steps().move_by(id, *delta).await.map(drop),
            None => Ok(()),
        },
        SimulatedOperation::ToggleNumbering => {
            let next = match board.numbering_mode() {
                NumberingMode::Random => NumberingMode::Sequential,
                NumberingMode::Sequential => NumberingMode::Random,
            };
            board.set_numbering_mode(next).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fault_free_run_passes() {
        let report = run_simulator(SimulatorConfig {
            seed: 7,
            operations: 300,
            ..SimulatorConfig::default()
        })
        .await
        .unwrap();

        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.operations_run, 300);
        assert!(report.stats.succeeded > 0);
    }

    #[tokio::test]
    async fn faulty_store_keeps_mirror_consistent() {
        let report = run_simulator(SimulatorConfig {
            seed: 11,
            operations: 300,
            fault_rate: 0.25,
            stop_on_first_violation: false,
        })
        .await
        .unwrap();

        assert!(report.passed(), "{}", report.generate_text());
        assert!(report.stats.faults_injected > 0);
    }

    #[test]
    fn same_seed_draws_same_operations() {
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(generate_operation(&mut a), generate_operation(&mut b));
        }
    }

    #[test]
    fn report_text_names_outcome() {
        let report = SimulatorReport {
            config: SimulatorConfig::default(),
            stats: SimulatorStats::default(),
            violations: vec![Violation::StoreDiverged {
                detail: "tickets".to_string(),
            }],
        };
        let text = report.generate_text();
        assert!(text.contains("Violations: 1"));
        assert!(text.contains("Result: FAIL"));
    }
}
