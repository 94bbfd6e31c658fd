//! `ticketboard` command-line front end
//!
//! Opens a board over a JSON file store, runs one command against it, and
//! saves any pending notes before exiting.

mod commands;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use ticketboard_core::{Board, BoardConfig};
use ticketboard_store::FileGateway;
use tracing_subscriber::EnvFilter;

fn build_cli() -> Command {
    let step_ref = || {
        Arg::new("step")
            .required(true)
            .help("Step name or 1-based position")
    };
    let ticket_ref = || {
        Arg::new("ticket")
            .required(true)
            .value_parser(value_parser!(u32))
            .help("Ticket number")
    };
    let position = || {
        Arg::new("position")
            .required(true)
            .value_parser(value_parser!(usize))
            .help("1-based target position")
    };
    let color = |required: bool| {
        Arg::new("color")
            .required(required)
            .help("Palette token (red, yellow, ...) or #rrggbb")
    };

    Command::new("ticketboard")
        .version(ticketboard_core::VERSION)
        .about("Single-board ticket tracker")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("store")
                .long("store")
                .global(true)
                .default_value("ticketboard.json")
                .value_parser(value_parser!(PathBuf))
                .help("Board store file"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("step")
                .about("Manage workflow steps")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Add a step")
                        .arg(Arg::new("name").required(true))
                        .arg(
                            Arg::new("at")
                                .long("at")
                                .value_parser(value_parser!(usize))
                                .help("1-based position; appended when omitted"),
                        ),
                )
                .subcommand(
                    Command::new("rename")
                        .about("Rename a step")
                        .arg(step_ref())
                        .arg(Arg::new("name").required(true)),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Delete a step and unassign its tickets")
                        .arg(step_ref()),
                )
                .subcommand(
                    Command::new("mv")
                        .about("Move a step")
                        .arg(step_ref())
                        .arg(position()),
                )
                .subcommand(Command::new("list").about("List steps")),
        )
        .subcommand(
            Command::new("ticket")
                .about("Manage tickets")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Create a ticket")
                        .arg(
                            Arg::new("number")
                                .long("number")
                                .value_parser(value_parser!(u32))
                                .help("Explicit number; issued automatically when omitted"),
                        )
                        .arg(color(false).long("color"))
                        .arg(Arg::new("notes").long("notes"))
                        .arg(
                            Arg::new("step")
                                .long("step")
                                .conflicts_with("unassigned")
                                .help("Starting step; the first step when omitted"),
                        )
                        .arg(
                            Arg::new("unassigned")
                                .long("unassigned")
                                .action(ArgAction::SetTrue)
                                .help("Start without a step"),
                        )
                        .arg(
                            Arg::new("at")
                                .long("at")
                                .value_parser(value_parser!(usize))
                                .help("1-based position; appended when omitted"),
                        ),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Delete a ticket")
                        .arg(ticket_ref()),
                )
                .subcommand(
                    Command::new("color")
                        .about("Recolor a ticket")
                        .arg(ticket_ref())
                        .arg(color(true)),
                )
                .subcommand(
                    Command::new("notes")
                        .about("Replace a ticket's notes")
                        .arg(ticket_ref())
                        .arg(Arg::new("text").required(true)),
                )
                .subcommand(
                    Command::new("number")
                        .about("Renumber a ticket")
                        .arg(ticket_ref())
                        .arg(
                            Arg::new("new")
                                .required(true)
                                .value_parser(value_parser!(u32)),
                        ),
                )
                .subcommand(
                    Command::new("step")
                        .about("Put a ticket on a step (\"none\" to unassign)")
                        .arg(ticket_ref())
                        .arg(step_ref()),
                )
                .subcommand(
                    Command::new("advance")
                        .about("Move a ticket one step left or right")
                        .arg(ticket_ref())
                        .arg(
                            Arg::new("direction")
                                .required(true)
                                .value_parser(["left", "right"]),
                        ),
                )
                .subcommand(
                    Command::new("mv")
                        .about("Move a ticket")
                        .arg(ticket_ref())
                        .arg(position()),
                )
                .subcommand(Command::new("list").about("List tickets")),
        )
        .subcommand(
            Command::new("bulk")
                .about("Act on many tickets at once")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Create several tickets")
                        .arg(
                            Arg::new("count")
                                .required(true)
                                .value_parser(value_parser!(usize)),
                        )
                        .arg(color(false).long("color"))
                        .arg(Arg::new("step").long("step")),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Delete tickets by number")
                        .arg(
                            Arg::new("tickets")
                                .required(true)
                                .num_args(1..)
                                .value_parser(value_parser!(u32)),
                        ),
                )
                .subcommand(Command::new("clear").about("Delete every ticket"))
                .subcommand(
                    Command::new("color")
                        .about("Recolor tickets by number")
                        .arg(color(true))
                        .arg(
                            Arg::new("tickets")
                                .required(true)
                                .num_args(1..)
                                .value_parser(value_parser!(u32)),
                        ),
                ),
        )
        .subcommand(
            Command::new("mode")
                .about("Show or set the numbering mode")
                .arg(Arg::new("mode").value_parser(["sequential", "random"])),
        )
        .subcommand(
            Command::new("export")
                .about("Write the board as JSON")
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Output file; stdout when omitted"),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Replace the board with an exported snapshot")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(Command::new("check").about("Check board invariants"))
        .subcommand(
            Command::new("simulate")
                .about("Run the board simulator against an in-memory store")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("operations")
                        .long("operations")
                        .default_value("1000")
                        .value_parser(value_parser!(u64))
                        .help("Number of operations to simulate"),
                )
                .arg(
                    Arg::new("fault-rate")
                        .long("fault-rate")
                        .default_value("0.0")
                        .value_parser(value_parser!(f64))
                        .help("Probability that the store is offline for an operation"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<BoardConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => BoardConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(BoardConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    // The simulator brings its own in-memory store.
    if let Some(("simulate", args)) = matches.subcommand() {
        let passed = commands::simulate(args).await?;
        std::process::exit(if passed { 0 } else { 1 });
    }

    let config = load_config(&matches)?;
    let store = matches
        .get_one::<PathBuf>("store")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("ticketboard.json"));
    let gateway = FileGateway::open(&store)
        .await
        .with_context(|| format!("opening store {}", store.display()))?;
    let board = Board::open(Arc::new(gateway), config)
        .await
        .context("loading board")?;

    let outcome = commands::run(&board, &matches).await;
    let flushed = board.flush_notes().await.context("saving pending notes");
    let healthy = outcome?;
    flushed?;

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let matches = build_cli()
            .try_get_matches_from([
                "ticketboard",
                "ticket",
                "add",
                "--color",
                "#00ff00",
                "--store",
                "board.json",
            ])
            .unwrap();
        assert_eq!(
            matches.get_one::<PathBuf>("store"),
            Some(&PathBuf::from("board.json"))
        );
        let (_, ticket) = matches.subcommand().unwrap();
        let (_, add) = ticket.subcommand().unwrap();
        assert_eq!(add.get_one::<String>("color").map(String::as_str), Some("#00ff00"));
    }

    #[test]
    fn step_and_unassigned_conflict() {
        let result = build_cli().try_get_matches_from([
            "ticketboard",
            "ticket",
            "add",
            "--step",
            "Todo",
            "--unassigned",
        ]);
        assert!(result.is_err());
    }
}
