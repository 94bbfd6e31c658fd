//! Command handlers
//!
//! Tickets are addressed by their number and steps by name or 1-based
//! position, the way they appear on the board. Positions given on the
//! command line are 1-based as well.

use anyhow::{anyhow, bail, Context};
use clap::ArgMatches;
use std::path::PathBuf;
use ticketboard_core::test_harness::{run_simulator, SimulatorConfig};
use ticketboard_core::{Board, BoardSnapshot, StepAssignment, TicketDraft};
use ticketboard_model::{Direction, NumberingMode, Step, StepId, TicketColor, TicketId};

/// Run one board command; returns `false` when the command found problems
pub(crate) async fn run(board: &Board, matches: &ArgMatches) -> anyhow::Result<bool> {
    match matches.subcommand() {
        Some(("step", args)) => step(board, args).await?,
        Some(("ticket", args)) => ticket(board, args).await?,
        Some(("bulk", args)) => bulk(board, args).await?,
        Some(("mode", args)) => mode(board, args).await?,
        Some(("export", args)) => export(board, args).await?,
        Some(("import", args)) => import(board, args).await?,
        Some(("check", _)) => return Ok(check(board)),
        Some((other, _)) => bail!("unknown command {other}"),
        None => bail!("no command given"),
    }
    Ok(true)
}

async fn step(board: &Board, matches: &ArgMatches) -> anyhow::Result<()> {
    let steps = board.steps();
    match matches.subcommand() {
        Some(("add", args)) => {
            let name = required::<String>(args, "name")?;
            let created = match args.get_one::<usize>("at") {
                Some(at) => steps.insert(name.clone(), zero_based(*at)?).await?,
                None => steps.create(name.clone()).await?,
            };
            println!("Added step {} at position {}", created.display_name(), created.order_index + 1);
        }
        Some(("rename", args)) => {
            let id = resolve_step(board, &required::<String>(args, "step")?)?;
            let renamed = steps.rename(id, required::<String>(args, "name")?).await?;
            println!("Renamed step to {}", renamed.display_name());
        }
        Some(("rm", args)) => {
            let id = resolve_step(board, &required::<String>(args, "step")?)?;
            let deleted = board.delete_step(id).await?;
            println!(
                "Deleted step {}; {} ticket(s) unassigned",
                deleted.step.display_name(),
                deleted.cleared_tickets.len()
            );
        }
        Some(("mv", args)) => {
            let id = resolve_step(board, &required::<String>(args, "step")?)?;
            let to = zero_based(*required::<usize>(args, "position")?)?;
            steps.move_to(id, to).await?;
            print_steps(&steps.list());
        }
        Some(("list", _)) => print_steps(&steps.list()),
        _ => bail!("unknown step command"),
    }
    Ok(())
}

async fn ticket(board: &Board, matches: &ArgMatches) -> anyhow::Result<()> {
    let tickets = board.tickets();
    match matches.subcommand() {
        Some(("add", args)) => {
            let mut draft = TicketDraft::new().with_color(optional_color(args)?);
            if let Some(number) = args.get_one::<u32>("number") {
                draft = draft.with_number(*number);
            }
            if let Some(notes) = args.get_one::<String>("notes") {
                draft = draft.with_notes(notes.clone());
            }
            if let Some(at) = args.get_one::<usize>("at") {
                draft = draft.at_index(zero_based(*at)?);
            }
            draft = draft.with_step(step_assignment(board, args)?);

            let created = board.create_ticket(draft).await?;
            println!("Created ticket #{}", created.display_number());
        }
        Some(("rm", args)) => {
            let id = resolve_ticket(board, *required::<u32>(args, "ticket")?)?;
            let removed = tickets.delete(id).await?;
            println!("Deleted ticket #{}", removed.display_number());
        }
        Some(("color", args)) => {
            let id = resolve_ticket(board, *required::<u32>(args, "ticket")?)?;
            let color = parse_color(required::<String>(args, "color")?)?;
            tickets.set_color(id, color).await?;
        }
        Some(("notes", args)) => {
            let id = resolve_ticket(board, *required::<u32>(args, "ticket")?)?;
            // Saved by the flush on exit.
            tickets.update_notes_debounced(id, required::<String>(args, "text")?.clone())?;
        }
        Some(("number", args)) => {
            let id = resolve_ticket(board, *required::<u32>(args, "ticket")?)?;
            let renumbered = tickets.set_number(id, *required::<u32>(args, "new")?).await?;
            println!("Ticket is now #{}", renumbered.display_number());
        }
        Some(("step", args)) => {
            let id = resolve_ticket(board, *required::<u32>(args, "ticket")?)?;
            let step = match required::<String>(args, "step")?.as_str() {
                "none" => None,
                reference => Some(resolve_step(board, reference)?),
            };
            board.set_ticket_step(id, step).await?;
        }
        Some(("advance", args)) => {
            let id = resolve_ticket(board, *required::<u32>(args, "ticket")?)?;
            let direction = match required::<String>(args, "direction")?.as_str() {
                "left" => Direction::Left,
                _ => Direction::Right,
            };
            let landed = board.advance_ticket(id, direction).await?;
            println!("Ticket is on {}", step_label(board, landed));
        }
        Some(("mv", args)) => {
            let id = resolve_ticket(board, *required::<u32>(args, "ticket")?)?;
            let to = zero_based(*required::<usize>(args, "position")?)?;
            tickets.move_to(id, to).await?;
            print_tickets(board);
        }
        Some(("list", _)) => print_tickets(board),
        _ => bail!("unknown ticket command"),
    }
    Ok(())
}

async fn bulk(board: &Board, matches: &ArgMatches) -> anyhow::Result<()> {
    let tickets = board.tickets();
    match matches.subcommand() {
        Some(("add", args)) => {
            let count = *required::<usize>(args, "count")?;
            let draft = TicketDraft::new()
                .with_color(optional_color(args)?)
                .with_step(step_assignment(board, args)?);
            let created = board.create_tickets(count, &draft).await?;
            let numbers: Vec<String> = created.iter().map(|t| format!("#{}", t.display_number())).collect();
            println!("Created {}", numbers.join(" "));
        }
        Some(("rm", args)) => {
            let ids = resolve_tickets(board, args)?;
            let removed = tickets.delete_many(&ids).await?;
            println!("Deleted {removed} ticket(s)");
        }
        Some(("clear", _)) => {
            let removed = tickets.delete_all().await?;
            println!("Deleted {removed} ticket(s)");
        }
        Some(("color", args)) => {
            let color = parse_color(required::<String>(args, "color")?)?;
            let ids = resolve_tickets(board, args)?;
            let changed = tickets.recolor_many(&ids, color).await?;
            println!("Recolored {changed} ticket(s)");
        }
        _ => bail!("unknown bulk command"),
    }
    Ok(())
}

async fn mode(board: &Board, matches: &ArgMatches) -> anyhow::Result<()> {
    match matches.get_one::<String>("mode").map(String::as_str) {
        Some("sequential") => board.set_numbering_mode(NumberingMode::Sequential).await?,
        Some("random") => board.set_numbering_mode(NumberingMode::Random).await?,
        Some(other) => bail!("unknown numbering mode {other}"),
        None => {}
    }
    println!("Numbering: {}", mode_label(board.numbering_mode()));
    Ok(())
}

async fn export(board: &Board, matches: &ArgMatches) -> anyhow::Result<()> {
    let json = board
        .export()
        .await
        .to_json()
        .context("serializing board")?;
    match matches.get_one::<PathBuf>("output") {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "board exported");
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn import(board: &Board, matches: &ArgMatches) -> anyhow::Result<()> {
    let path = required::<PathBuf>(matches, "input")?;
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let snapshot = BoardSnapshot::from_json(&text)?;
    let summary = board.import(&snapshot).await?;
    println!(
        "Imported {} step(s) and {} ticket(s); {} ticket(s) left unassigned",
        summary.steps, summary.tickets, summary.unassigned
    );
    Ok(())
}

fn check(board: &Board) -> bool {
    let violations = board.check_invariants();
    if violations.is_empty() {
        println!("Board is consistent");
        return true;
    }
    for (i, violation) in violations.iter().enumerate() {
        println!("{}. {violation}", i + 1);
    }
    false
}

/// Run the simulator; returns whether it passed
pub(crate) async fn simulate(matches: &ArgMatches) -> anyhow::Result<bool> {
    let config = SimulatorConfig {
        seed: *required::<u64>(matches, "seed")?,
        operations: *required::<u64>(matches, "operations")?,
        fault_rate: *required::<f64>(matches, "fault-rate")?,
        stop_on_first_violation: matches.get_flag("stop-on-violation"),
    };

    println!("Running ticketboard simulator...");
    println!("Seed: {}", config.seed);
    println!("Operations: {}", config.operations);
    println!();

    let report = run_simulator(config).await?;
    println!("{}", report.generate_text());
    Ok(report.passed())
}

fn required<'a, T>(matches: &'a ArgMatches, name: &str) -> anyhow::Result<&'a T>
where
    T: Clone + Send + Sync + 'static,
{
    matches
        .get_one::<T>(name)
        .ok_or_else(|| anyhow!("missing argument <{name}>"))
}

fn zero_based(position: usize) -> anyhow::Result<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow!("positions start at 1"))
}

fn parse_color(text: &str) -> anyhow::Result<TicketColor> {
    Ok(text.parse()?)
}

fn optional_color(matches: &ArgMatches) -> anyhow::Result<TicketColor> {
    matches
        .get_one::<String>("color")
        .map_or_else(|| Ok(TicketColor::default()), |c| parse_color(c))
}

fn step_assignment(board: &Board, matches: &ArgMatches) -> anyhow::Result<StepAssignment> {
    if matches
        .try_get_one::<bool>("unassigned")
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
    {
        return Ok(StepAssignment::Unassigned);
    }
    match matches.get_one::<String>("step") {
        Some(reference) => Ok(StepAssignment::Step(resolve_step(board, reference)?)),
        None => Ok(StepAssignment::FirstStep),
    }
}

fn resolve_step(board: &Board, reference: &str) -> anyhow::Result<StepId> {
    find_step(&board.steps().list(), reference).ok_or_else(|| anyhow!("no step {reference:?}"))
}

/// Exact name first, then case-insensitive name, then 1-based position
fn find_step(steps: &[Step], reference: &str) -> Option<StepId> {
    if let Some(step) = steps.iter().find(|s| s.display_name() == reference) {
        return Some(step.id);
    }
    if let Some(step) = steps
        .iter()
        .find(|s| s.display_name().eq_ignore_ascii_case(reference))
    {
        return Some(step.id);
    }
    let position: usize = reference.parse().ok()?;
    steps.get(position.checked_sub(1)?).map(|s| s.id)
}

fn resolve_ticket(board: &Board, number: u32) -> anyhow::Result<TicketId> {
    board
        .tickets()
        .list()
        .iter()
        .find(|t| t.ticket_number == number)
        .map(|t| t.id)
        .ok_or_else(|| anyhow!("no ticket #{number:02}"))
}

fn resolve_tickets(board: &Board, matches: &ArgMatches) -> anyhow::Result<Vec<TicketId>> {
    matches
        .get_many::<u32>("tickets")
        .into_iter()
        .flatten()
        .map(|n| resolve_ticket(board, *n))
        .collect()
}

fn step_label(board: &Board, step: Option<StepId>) -> String {
    step.and_then(|id| board.steps().get(id))
        .map_or_else(|| "no step".to_string(), |s| s.display_name())
}

fn mode_label(mode: NumberingMode) -> &'static str {
    match mode {
        NumberingMode::Sequential => "sequential",
        NumberingMode::Random => "random",
    }
}

fn print_steps(steps: &[Step]) {
    for step in steps {
        println!("{:>3}. {}", step.order_index + 1, step.display_name());
    }
}

fn print_tickets(board: &Board) {
    for ticket in board.tickets().list() {
        let notes = ticket.notes.lines().next().unwrap_or_default();
        println!(
            "{:>3}. #{} {:<8} {:<16} {}",
            ticket.order_index + 1,
            ticket.display_number(),
            ticket.color.to_string(),
            step_label(board, ticket.current_step_id),
            notes
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketboard_model::PaletteColor;

    fn steps(names: &[&str]) -> Vec<Step> {
        names
            .iter()
            .zip(0u32..)
            .map(|(name, i)| Step {
                id: StepId::new(),
                name: (*name).to_string(),
                order_index: i,
            })
            .collect()
    }

    #[test]
    fn steps_resolve_by_name_then_position() {
        let steps = steps(&["Todo", "Doing", "2"]);
        assert_eq!(find_step(&steps, "Doing"), Some(steps[1].id));
        assert_eq!(find_step(&steps, "todo"), Some(steps[0].id));
        // A step literally named "2" wins over position 2.
        assert_eq!(find_step(&steps, "2"), Some(steps[2].id));
        assert_eq!(find_step(&steps, "1"), Some(steps[0].id));
        assert_eq!(find_step(&steps, "0"), None);
        assert_eq!(find_step(&steps, "Done"), None);
    }

    #[test]
    fn colors_parse_from_tokens_and_hex() {
        assert_eq!(
            parse_color("red").unwrap(),
            TicketColor::Palette(PaletteColor::Red)
        );
        assert!(parse_color("#a1b2c3").is_ok());
        assert!(parse_color("mauve").is_err());
    }

    #[test]
    fn positions_are_one_based() {
        assert_eq!(zero_based(1).unwrap(), 0);
        assert!(zero_based(0).is_err());
    }
}
