//! Debounced notes saving through the board

use std::time::Duration;
use ticketboard_core::prelude::*;
use ticketboard_store::{GatewayCall, GatewayOp, MemoryGateway};
use ticketboard_test_utils as fixtures;

async fn open(gateway: &Arc<MemoryGateway>) -> Board {
    let config = BoardConfig::new().with_quiet_period(Duration::from_millis(400));
    Board::open(gateway.clone(), config).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn typing_burst_saves_final_text_once() {
    let (gateway, _, tickets) = fixtures::kanban_gateway();
    let board = open(&gateway).await;
    let id = tickets[0].id;
    gateway.clear_journal();

    for text in ["F", "Fi", "Fix", "Fix the", "Fix the door"] {
        board.tickets().update_notes_debounced(id, text).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    // The mirror follows every keystroke.
    assert_eq!(board.tickets().get(id).unwrap().notes, "Fix the door");
    assert_eq!(gateway.count(GatewayOp::UpdateTicket), 0);
    assert_eq!(board.tickets().pending_notes(), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let writes: Vec<GatewayCall> = gateway
        .journal()
        .into_iter()
        .filter(|c| c.op() == GatewayOp::UpdateTicket)
        .collect();
    assert_eq!(
        writes,
        vec![GatewayCall::UpdateTicket(
            id,
            TicketPatch::new().with_notes("Fix the door")
        )]
    );
    assert_eq!(board.tickets().pending_notes(), 0);
}

#[tokio::test(start_paused = true)]
async fn tickets_are_debounced_independently() {
    let (gateway, _, tickets) = fixtures::kanban_gateway();
    let board = open(&gateway).await;
    gateway.clear_journal();

    board.tickets().update_notes_debounced(tickets[0].id, "first").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    board.tickets().update_notes_debounced(tickets[1].id, "second").unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(gateway.count(GatewayOp::UpdateTicket), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(gateway.count(GatewayOp::UpdateTicket), 2);
    let stored = gateway.state().sorted_tickets();
    assert_eq!(stored[0].notes, "first");
    assert_eq!(stored[1].notes, "second");
}

#[tokio::test(start_paused = true)]
async fn deleting_a_ticket_drops_its_pending_save() {
    let (gateway, _, tickets) = fixtures::kanban_gateway();
    let board = open(&gateway).await;
    let id = tickets[2].id;

    board.tickets().update_notes_debounced(id, "never saved").unwrap();
    board.tickets().delete(id).await.unwrap();
    gateway.clear_journal();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(gateway.journal().is_empty());
    assert_eq!(board.tickets().pending_notes(), 0);
}

#[tokio::test(start_paused = true)]
async fn direct_notes_update_supersedes_pending_save() {
    let (gateway, _, tickets) = fixtures::kanban_gateway();
    let board = open(&gateway).await;
    let id = tickets[0].id;

    board.tickets().update_notes_debounced(id, "old draft").unwrap();
    board
        .update_ticket(id, TicketPatch::new().with_notes("final"))
        .await
        .unwrap();
    assert_eq!(board.tickets().pending_notes(), 0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(board.tickets().get(id).unwrap().notes, "final");
    let stored = gateway.state();
    assert!(stored.tickets.iter().any(|t| t.id == id && t.notes == "final"));
}

#[tokio::test(start_paused = true)]
async fn non_notes_update_keeps_pending_save() {
    let (gateway, _, tickets) = fixtures::kanban_gateway();
    let board = open(&gateway).await;
    let id = tickets[0].id;

    board.tickets().update_notes_debounced(id, "draft").unwrap();
    board
        .tickets()
        .set_color(id, TicketColor::Palette(PaletteColor::Red))
        .await
        .unwrap();
    assert_eq!(board.tickets().pending_notes(), 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let stored = gateway.state();
    assert!(stored.tickets.iter().any(|t| t.id == id && t.notes == "draft"));
}

#[tokio::test(start_paused = true)]
async fn flush_writes_before_the_quiet_period_ends() {
    let (gateway, _, tickets) = fixtures::kanban_gateway();
    let board = open(&gateway).await;
    let id = tickets[1].id;

    board.tickets().update_notes_debounced(id, "urgent").unwrap();
    board.flush_notes().await.unwrap();

    let stored = gateway.state();
    assert!(stored.tickets.iter().any(|t| t.id == id && t.notes == "urgent"));
    assert_eq!(board.tickets().pending_notes(), 0);
}

#[tokio::test(start_paused = true)]
async fn notes_for_unknown_ticket_are_rejected() {
    let gateway = Arc::new(MemoryGateway::new());
    let board = open(&gateway).await;
    let err = board
        .tickets()
        .update_notes_debounced(TicketId::new(), "orphan")
        .unwrap_err();
    assert!(err.is_validation());
}
