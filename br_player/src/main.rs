//! Terminal bingo player.
//!
//! Finds a caller on the local network (or connects to a given address),
//! keeps a card in sync with the drawn balls and claims wins.

use anyhow::{Context, Result};
use bingo_royale::{
    GameMode, PlayerCoordinator, PlayerNotice,
    config::{NetworkConfig, Preferences},
};
use br_player::{
    commands::{PlayerCommand, parse_command},
    view,
};
use log::{info, warn};
use pico_args::Arguments;
use std::io::Write;
use tokio::sync::mpsc;

const HELP: &str = "\
Play bingo against a caller on the local network

USAGE:
  br_player [OPTIONS]

OPTIONS:
  --name    NAME    Name used when calling bingo   [default: env BINGO_PLAYER_NAME or login name]
  --host    HOST    Connect to this caller instead of scanning
  --port    PORT    Caller's TCP game port         [default: env BINGO_GAME_PORT or 8888]
  --mode    75|90   Mode of the first card         [default: env BINGO_DEFAULT_MODE or 75]

FLAGS:
  --auto-mark       Mark drawn numbers automatically
  -h, --help        Print help information
";

const COMMANDS: &str = "\
Commands:
  scan                Find a caller on the local network and join it
  connect HOST[:PORT] Join a caller at a known address
  disconnect          Leave the caller
  mark N              Mark or unmark number N on your card
  card                Show your card
  new [75|90]         Deal a new card
  clear               Remove all marks
  bingo               Claim a win
  ping                Check the connection
  help                Show this list
  quit                Leave and exit
";

struct Args {
    name: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    mode: Option<GameMode>,
    auto_mark: bool,
}

/// Preferences that shape terminal output.
struct Feedback {
    sound: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        name: pargs.opt_value_from_str("--name")?,
        host: pargs.opt_value_from_str("--host")?,
        port: pargs.opt_value_from_str("--port")?,
        mode: pargs.opt_value_from_str("--mode")?,
        auto_mark: pargs.contains("--auto-mark"),
    };

    env_logger::builder().format_target(false).init();
    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let mut network = NetworkConfig::from_env().context("Invalid network configuration")?;
    if let Some(port) = args.port {
        network.game_port = port;
    }
    let game_port = network.game_port;
    let preferences = Preferences::from_env().context("Invalid preferences")?;

    let name = args
        .name
        .or(preferences.player_name)
        .unwrap_or_else(whoami::username);
    let mode = args.mode.unwrap_or(preferences.default_mode);
    let feedback = Feedback {
        sound: preferences.sound,
    };

    let (mut player, mut events) = PlayerCoordinator::new(network, mode, &name);
    player.set_auto_mark(args.auto_mark || preferences.auto_mark);
    info!("Playing as {name}");
    print_card(&player);

    match args.host {
        Some(host) => connect(&mut player, &host, game_port).await,
        None => scan(&mut player).await,
    }
    print!("{COMMANDS}");

    let mut input = spawn_stdin_reader();
    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else { break };
                match parse_command(&line) {
                    Ok(PlayerCommand::Quit) => break,
                    Ok(command) => run_command(&mut player, command, game_port).await,
                    Err(e) => println!("{e}"),
                }
            }
            Some(event) = events.recv() => {
                for notice in player.handle_event(event) {
                    show_notice(&player, &notice, &feedback);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    player.release().await;
    println!("\nLeft the game.");
    Ok(())
}

/// Read stdin lines on a dedicated thread so a pending read never holds up
/// shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn run_command(player: &mut PlayerCoordinator, command: PlayerCommand, game_port: u16) {
    match command {
        PlayerCommand::Scan => scan(player).await,
        PlayerCommand::Connect { host, port } => {
            connect(player, &host, port.unwrap_or(game_port)).await;
        }
        PlayerCommand::Disconnect => {
            player.disconnect().await;
            println!("Disconnected");
        }
        PlayerCommand::Mark(number) => mark(player, number),
        PlayerCommand::ShowCard => print_card(player),
        PlayerCommand::NewCard(mode) => {
            let mode = mode.unwrap_or(player.mode());
            player.generate_new_card(mode);
            print_card(player);
        }
        PlayerCommand::ClearMarks => {
            player.clear_all_marks();
            print_card(player);
        }
        PlayerCommand::Bingo => match player.call_bingo().await {
            Ok(()) => println!("Bingo called! Waiting for the caller..."),
            Err(e) => println!("Could not call bingo: {e}"),
        },
        PlayerCommand::Ping => {
            if let Err(e) = player.ping().await {
                println!("Ping failed: {e}");
            }
        }
        PlayerCommand::Help => print!("{COMMANDS}"),
        PlayerCommand::Quit => {}
    }
}

async fn scan(player: &mut PlayerCoordinator) {
    println!("Looking for a caller...");
    match player.discover_and_connect().await {
        Ok(Some(server)) => {
            info!("discovered {} at {}", server.name, server.addr);
            println!("Found '{}' ({}-ball)", server.name, server.mode);
        }
        Ok(None) => println!("No caller found. Try 'scan' again or 'connect HOST[:PORT]'"),
        Err(e) => println!("Could not join the caller: {e}"),
    }
}

async fn connect(player: &mut PlayerCoordinator, host: &str, port: u16) {
    println!("Connecting to {host}:{port}...");
    if let Err(e) = player.connect_by_address(host, port).await {
        println!("Could not connect: {e}");
    }
}

fn mark(player: &mut PlayerCoordinator, number: u8) {
    let Some(index) = player.card().index_of(number) else {
        println!("{number} is not on your card");
        return;
    };
    match player.toggle_mark(index) {
        Some(transition) => {
            print_card(player);
            if transition.bingo_reached {
                println!("BINGO! Type 'bingo' to claim it");
            } else if transition.line_reached {
                println!("LINE! You completed a line");
            }
        }
        None => println!("{number} has not been called yet"),
    }
}

fn show_notice(player: &PlayerCoordinator, notice: &PlayerNotice, feedback: &Feedback) {
    if let PlayerNotice::Disconnected = notice {
        warn!("connection to the caller closed");
    }
    println!("{}", view::describe_notice(notice));

    let alert = matches!(
        notice,
        PlayerNotice::LineAchieved | PlayerNotice::BingoAchieved | PlayerNotice::BingoCalled { .. }
    );
    if alert && feedback.sound {
        ring_bell(&mut std::io::stdout());
    }

    if matches!(
        notice,
        PlayerNotice::BallReceived { marked: true, .. }
            | PlayerNotice::CardRegenerated { .. }
            | PlayerNotice::GameReset
    ) {
        print_card(player);
    }
}

/// The bell has no newline, so it sits in the line buffer until flushed.
fn ring_bell(out: &mut impl Write) {
    let _ = out.write_all(b"\x07").and_then(|()| out.flush());
}

fn print_card(player: &PlayerCoordinator) {
    let snapshot = player.snapshot();
    print!("{}", view::render_card(&snapshot));
    println!("{}", view::render_status(&snapshot));
}
