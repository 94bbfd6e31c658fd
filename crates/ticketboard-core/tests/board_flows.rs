//! End-to-end board flows over an in-memory store

use pretty_assertions::assert_eq;
use std::sync::Arc;
use ticketboard_core::prelude::*;
use ticketboard_core::InvariantViolation;
use ticketboard_model::{BoardSettings, StepPatch};
use ticketboard_store::{BoardGateway, GatewayOp, MemoryGateway};
use ticketboard_test_utils as fixtures;

async fn open(gateway: &Arc<MemoryGateway>) -> Board {
    Board::open(gateway.clone(), BoardConfig::new().with_seed(9))
        .await
        .unwrap()
}

#[tokio::test]
async fn moving_fourth_ticket_to_front_rewrites_shifted_indices() {
    let gateway = fixtures::gateway(fixtures::state(
        vec![],
        fixtures::tickets(&[10, 20, 30, 40, 50]),
    ));
    let board = open(&gateway).await;
    let fourth = board.tickets().ids()[3];
    gateway.clear_journal();

    board.tickets().move_to(fourth, 0).await.unwrap();

    assert_eq!(fixtures::numbers(&board.tickets().list()), vec![40, 10, 20, 30, 50]);
    // The last ticket keeps its index and is not written.
    assert_eq!(gateway.count(GatewayOp::UpdateTicket), 4);
    let stored = gateway.state().sorted_tickets();
    assert_eq!(fixtures::numbers(&stored), vec![40, 10, 20, 30, 50]);
    let indices: Vec<u32> = stored.iter().map(|t| t.order_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert!(board.check_invariants().is_empty());
}

#[tokio::test]
async fn moving_a_ticket_onto_itself_writes_nothing() {
    let gateway = fixtures::gateway(fixtures::state(vec![], fixtures::tickets(&[10, 20])));
    let board = open(&gateway).await;
    let first = board.tickets().ids()[0];
    gateway.clear_journal();

    board.tickets().move_to(first, 0).await.unwrap();
    assert!(gateway.journal().is_empty());
}

#[tokio::test]
async fn sequential_numbering_continues_after_highest() {
    let gateway = fixtures::gateway(fixtures::sequential_state(
        vec![],
        fixtures::tickets(&[5, 7, 12]),
    ));
    let board = open(&gateway).await;
    assert_eq!(board.numbering_mode(), NumberingMode::Sequential);

    let ticket = board.create_ticket(TicketDraft::new()).await.unwrap();
    assert_eq!(ticket.ticket_number, 13);

    // Deleted numbers stay reserved.
    board.tickets().delete(ticket.id).await.unwrap();
    let next = board.create_ticket(TicketDraft::new()).await.unwrap();
    assert_eq!(next.ticket_number, 14);
}

#[tokio::test]
async fn random_numbers_stay_two_digit_and_unique() {
    let gateway = Arc::new(MemoryGateway::new());
    let board = open(&gateway).await;

    let created = board.create_tickets(40, &TicketDraft::new()).await.unwrap();
    let mut numbers = fixtures::numbers(&created);
    assert!(numbers.iter().all(|n| (10..=99).contains(n)));
    numbers.sort_unstable();
    numbers.dedup();
    assert_eq!(numbers.len(), 40);
}

#[tokio::test]
async fn explicit_duplicate_number_is_rejected_without_store_calls() {
    let gateway = fixtures::gateway(fixtures::state(vec![], fixtures::tickets(&[42])));
    let board = open(&gateway).await;
    gateway.clear_journal();

    let err = board
        .create_ticket(TicketDraft::new().with_number(42))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(gateway.journal().is_empty());
}

#[tokio::test]
async fn deleting_a_step_unassigns_its_tickets_in_store() {
    let (gateway, steps, _) = fixtures::kanban_gateway();
    let board = open(&gateway).await;

    let deleted = board.delete_step(steps[0].id).await.unwrap();
    assert_eq!(deleted.cleared_tickets.len(), 3);
    assert_eq!(fixtures::names(&board.steps().list()), vec!["Doing", "Done"]);

    let stored = gateway.state();
    assert!(stored.tickets.iter().all(|t| t.current_step_id.is_none()));
    let indices: Vec<u32> = stored.sorted_steps().iter().map(|s| s.order_index).collect();
    assert_eq!(indices, vec![0, 1]);
}

#[tokio::test]
async fn undoing_a_step_delete_puts_tickets_back() {
    let (gateway, steps, _) = fixtures::kanban_gateway();
    let board = open(&gateway).await;

    let deleted = board.delete_step(steps[0].id).await.unwrap();
    let moved = board.tickets().ids()[0];
    board
        .set_ticket_step(moved, Some(steps[2].id))
        .await
        .unwrap();

    let restored = board.undo_step_delete(deleted).await.unwrap();
    assert_eq!(board.steps().ids()[0], restored.id);

    let on_restored = board
        .tickets()
        .list()
        .iter()
        .filter(|t| t.current_step_id == Some(restored.id))
        .count();
    assert_eq!(on_restored, 2);
    assert_eq!(board.tickets().get(moved).unwrap().current_step_id, Some(steps[2].id));
}

#[tokio::test]
async fn advancing_walks_the_steps_and_stops_at_the_ends() {
    let (gateway, steps, tickets) = fixtures::kanban_gateway();
    let board = open(&gateway).await;
    let id = tickets[0].id;

    assert_eq!(board.advance_ticket(id, Direction::Right).await.unwrap(), Some(steps[1].id));
    assert_eq!(board.advance_ticket(id, Direction::Right).await.unwrap(), Some(steps[2].id));

    gateway.clear_journal();
    assert_eq!(board.advance_ticket(id, Direction::Right).await.unwrap(), Some(steps[2].id));
    assert!(gateway.journal().is_empty());
}

#[tokio::test]
async fn ticket_walks_to_done_then_loses_its_step() {
    let gateway = Arc::new(MemoryGateway::new());
    let board = open(&gateway).await;
    let intake = board.steps().create("Intake").await.unwrap();
    board.steps().create("Review").await.unwrap();
    let done = board.steps().create("Done").await.unwrap();

    let ticket = board.create_ticket(TicketDraft::new()).await.unwrap();
    assert_eq!(ticket.current_step_id, Some(intake.id));

    board.advance_ticket(ticket.id, Direction::Right).await.unwrap();
    let landed = board.advance_ticket(ticket.id, Direction::Right).await.unwrap();
    assert_eq!(landed, Some(done.id));

    board.delete_step(done.id).await.unwrap();
    assert_eq!(board.tickets().get(ticket.id).unwrap().current_step_id, None);
    let stored = gateway.state().sorted_steps();
    assert_eq!(fixtures::names(&stored), vec!["Intake", "Review"]);
    let indices: Vec<u32> = stored.iter().map(|s| s.order_index).collect();
    assert_eq!(indices, vec![0, 1]);
}

#[tokio::test]
async fn settings_session_asks_before_discarding() {
    let (gateway, _, _) = fixtures::kanban_gateway();
    let board = open(&gateway).await;

    board.open_settings();
    board.steps().create("Review").await.unwrap();
    let done = board.steps().ids()[2];
    board.steps().move_to(done, 0).await.unwrap();

    let CloseDecision::ConfirmDiscard(edits) = board.close_settings() else {
        panic!("dirty session closed without confirmation");
    };
    assert_eq!(
        edits,
        vec![
            "Added step \"Review\"".to_string(),
            "Moved step \"Done\" from position 3 to 1".to_string(),
        ]
    );

    board.save_settings();
    assert_eq!(board.close_settings(), CloseDecision::Closed);
}

#[tokio::test]
async fn renames_alone_still_need_confirmation() {
    let (gateway, steps, _) = fixtures::kanban_gateway();
    let board = open(&gateway).await;

    board.open_settings();
    board.steps().rename(steps[1].id, "In progress").await.unwrap();
    assert!(board.settings_dirty());
    assert_eq!(
        board.close_settings(),
        CloseDecision::ConfirmDiscard(vec!["Renamed steps".to_string()])
    );
}

#[tokio::test]
async fn discarding_settings_reloads_from_store() {
    let (gateway, steps, _) = fixtures::kanban_gateway();
    let board = open(&gateway).await;

    board.open_settings();
    // Store diverges behind the board's back.
    gateway
        .update_step(steps[0].id, StepPatch::rename("Backlog"))
        .await
        .unwrap();
    board.steps().create("Review").await.unwrap();

    board.discard_settings().await.unwrap();
    assert!(!board.steps().session_open());
    assert_eq!(
        fixtures::names(&board.steps().list()),
        vec!["Backlog", "Doing", "Done", "Review"]
    );
}

#[tokio::test]
async fn failed_writes_under_rollback_restore_the_mirror() {
    let (gateway, _, tickets) = fixtures::kanban_gateway();
    let board = Board::open(
        gateway.clone(),
        BoardConfig::new().with_write_policy(WritePolicy::RollbackOnFailure),
    )
    .await
    .unwrap();
    let id = tickets[1].id;
    gateway.fail_ticket(id);

    let err = board
        .tickets()
        .set_color(id, TicketColor::Palette(PaletteColor::Red))
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::Persistence(_)));
    assert_eq!(board.tickets().get(id).unwrap().color, tickets[1].color);

    board.tickets().delete(id).await.unwrap_err();
    assert_eq!(board.tickets().len(), 3);
    assert!(board.check_invariants().is_empty());
}

#[tokio::test]
async fn optimistic_writes_keep_the_mirror_and_report() {
    let (gateway, _, tickets) = fixtures::kanban_gateway();
    let board = open(&gateway).await;
    let mut events = board.subscribe();
    gateway.set_offline(true);

    let err = board.tickets().delete(tickets[0].id).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(board.tickets().len(), 2);
    assert!(board.check_invariants().is_empty());

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        saw_failure |= matches!(event, BoardEvent::PersistFailed { .. });
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn bulk_delete_reports_partial_failure() {
    let gateway = fixtures::gateway(fixtures::state(vec![], fixtures::tickets(&[10, 20, 30])));
    let board = open(&gateway).await;
    let ids = board.tickets().ids();
    gateway.fail_ticket(ids[1]);

    let err = board.tickets().delete_many(&ids[..2]).await.unwrap_err();
    let BoardError::PartialPersistence { total, errors } = err else {
        panic!("expected a partial failure, got {err:?}");
    };
    assert_eq!(errors.len(), 1);
    assert!(total >= 2);
    assert_eq!(fixtures::numbers(&board.tickets().list()), vec![30]);
    assert_eq!(gateway.state().tickets.len(), 2);
}

#[tokio::test]
async fn open_repairs_gapped_order_indices() {
    let mut tickets = fixtures::tickets(&[10, 20, 30]);
    tickets[1].order_index = 5;
    tickets[2].order_index = 9;
    let gateway = fixtures::gateway(fixtures::state(vec![], tickets));

    let board = open(&gateway).await;
    assert!(board.check_invariants().is_empty());
    let stored: Vec<u32> = gateway
        .state()
        .sorted_tickets()
        .iter()
        .map(|t| t.order_index)
        .collect();
    assert_eq!(stored, vec![0, 1, 2]);
}

#[tokio::test]
async fn export_then_import_reproduces_the_board() {
    let (gateway, _, tickets) = fixtures::kanban_gateway();
    let board = open(&gateway).await;
    board.set_numbering_mode(NumberingMode::Sequential).await.unwrap();
    board
        .tickets()
        .update_notes_debounced(tickets[0].id, "exported note")
        .unwrap();

    let snapshot = board.export().await;
    let json = snapshot.to_json().unwrap();

    let target = Arc::new(MemoryGateway::new());
    let other = open(&target).await;
    other.steps().create("Old").await.unwrap();
    let summary = other
        .import(&BoardSnapshot::from_json(&json).unwrap())
        .await
        .unwrap();

    assert_eq!(summary.steps, 3);
    assert_eq!(summary.tickets, 3);
    assert_eq!(summary.unassigned, 0);
    assert_eq!(fixtures::names(&other.steps().list()), vec!["Todo", "Doing", "Done"]);
    assert_eq!(fixtures::numbers(&other.tickets().list()), vec![11, 22, 33]);
    assert_eq!(other.tickets().list()[0].notes, "exported note");
    assert_eq!(other.numbering_mode(), NumberingMode::Sequential);
    assert_eq!(
        target.load_settings().await.unwrap(),
        BoardSettings {
            sequential_numbering: true
        }
    );
    assert!(other.check_invariants().is_empty());
}

#[test]
fn dangling_step_reference_is_reported_by_the_checker() {
    let tickets = vec![fixtures::ticket_on(10, 0, StepId::new())];
    let violations = ticketboard_core::check_board(&tickets, &[], &[10].into());
    assert!(matches!(
        violations.as_slice(),
        [InvariantViolation::DanglingStep { .. }]
    ));
}
