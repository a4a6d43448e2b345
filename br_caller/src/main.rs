//! Terminal bingo caller.
//!
//! Hosts a LAN session that players find by broadcast, draws balls on
//! command and reports win claims as they arrive.

mod commands;
mod config;
mod logging;

use anyhow::{Context, Error};
use bingo_royale::{
    CallerSnapshot, GameCoordinator, GameMode, ServerEvent, net::discovery::local_ip,
};
use commands::{CallerCommand, parse_command};
use config::{CallerConfig, Overrides};
use pico_args::Arguments;
use tokio::sync::mpsc;
use tracing::info;

const HELP: &str = "\
Host a bingo game on the local network

USAGE:
  br_caller [OPTIONS]

OPTIONS:
  --name            NAME    Name shown to players      [default: env BINGO_SERVER_NAME or BingoRoyale]
  --mode            75|90   Mode of the first game     [default: env BINGO_DEFAULT_MODE or 75]
  --port            PORT    TCP game port              [default: env BINGO_GAME_PORT or 8888]
  --discovery-port  PORT    UDP discovery port         [default: env BINGO_DISCOVERY_PORT or 8889]

FLAGS:
  -h, --help                Print help information

ENVIRONMENT:
  RUST_LOG                  Log filter (e.g., debug)
  (See .env file for all BINGO_* options)
";

const COMMANDS: &str = "\
Commands:
  draw, <enter>   Draw the next ball
  new [75|90]     Start a new game, optionally switching modes
  reset           Reshuffle and clear every player's marks
  end             End the current game
  status          Show drawn balls and connected players
  network         Close or reopen the session
  clear           Dismiss the last bingo call
  help            Show this list
  quit            Close the session and exit
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        name: pargs.opt_value_from_str("--name")?,
        mode: pargs.opt_value_from_str("--mode")?,
        game_port: pargs.opt_value_from_str("--port")?,
        discovery_port: pargs.opt_value_from_str("--discovery-port")?,
    };

    logging::init();
    let config = CallerConfig::from_env(overrides).context("Invalid configuration")?;

    let (mut caller, mut events) = GameCoordinator::new(config.network.clone(), config.mode);
    caller
        .start_network(&config.name)
        .await
        .with_context(|| format!("Failed to open session '{}'", config.name))?;
    announce(&caller, &config.name);
    print!("{COMMANDS}");

    let mut input = spawn_stdin_reader();
    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else { break };
                match parse_command(&line) {
                    Ok(CallerCommand::Quit) => break,
                    Ok(command) => run_command(&mut caller, &config.name, command).await,
                    Err(e) => println!("{e}"),
                }
            }
            Some(event) = events.recv() => on_server_event(&mut caller, &event),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutting down caller...");
    caller.stop_network().await;
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

async fn run_command(caller: &mut GameCoordinator, name: &str, command: CallerCommand) {
    match command {
        CallerCommand::Draw => match caller.draw_next_ball() {
            Ok(ball) => {
                let remaining = caller.snapshot().remaining;
                println!("Ball {} ({remaining} left)", ball_label(caller.mode(), ball));
            }
            Err(e) => println!("{e}. Type 'new' to start another game"),
        },
        CallerCommand::NewGame(mode) => {
            let mode = mode.unwrap_or(caller.mode());
            caller.start_new_game(mode);
            println!("New {mode}-ball game");
        }
        CallerCommand::Reset => {
            caller.reset_game();
            println!("Game reset");
        }
        CallerCommand::End => {
            caller.end_game();
            println!("Game over after {} ball(s)", caller.snapshot().drawn.len());
        }
        CallerCommand::Status => print_status(&caller.snapshot()),
        CallerCommand::ToggleNetwork => match caller.toggle_network(name).await {
            Ok(true) => announce(caller, name),
            Ok(false) => println!("Session closed; players were disconnected"),
            Err(e) => println!("Failed to open session: {e}"),
        },
        CallerCommand::ClearClaim => caller.clear_bingo_notification(),
        CallerCommand::Help => print!("{COMMANDS}"),
        CallerCommand::Quit => {}
    }
}

fn on_server_event(caller: &mut GameCoordinator, event: &ServerEvent) {
    let players = caller.server().connected_count();
    match event {
        ServerEvent::ClientConnected { addr } => {
            info!(%addr, players, "player joined");
        }
        ServerEvent::ClientDisconnected { addr } => {
            info!(%addr, players, "player left");
        }
        ServerEvent::BingoClaimed { addr, .. } => {
            info!(%addr, "bingo claimed");
        }
    }

    if let Some(player) = caller.handle_server_event(event) {
        println!("*** BINGO called by {player}! *** (type 'clear' to dismiss)");
    }
}

fn announce(caller: &GameCoordinator, name: &str) {
    let port = caller.server().local_addr().map_or(0, |addr| addr.port());
    match local_ip() {
        Some(ip) => println!("Hosting '{name}' ({}-ball) at {ip}:{port}", caller.mode()),
        None => println!("Hosting '{name}' ({}-ball) on port {port}", caller.mode()),
    }
}

fn ball_label(mode: GameMode, ball: u8) -> String {
    match GameMode::letter_for_number(ball).filter(|_| mode == GameMode::Classic75) {
        Some(letter) => format!("{letter}-{ball}"),
        None => ball.to_string(),
    }
}

fn print_status(snapshot: &CallerSnapshot) {
    let drawn: Vec<String> = snapshot
        .drawn
        .iter()
        .map(|&ball| ball_label(snapshot.mode, ball))
        .collect();

    println!("Mode:      {}-ball", snapshot.mode);
    println!(
        "Drawn:     {} ({} left)",
        snapshot.drawn.len(),
        snapshot.remaining
    );
    if let Some(ball) = snapshot.current_ball {
        println!("Current:   {}", ball_label(snapshot.mode, ball));
    }
    if !drawn.is_empty() {
        println!("History:   {}", drawn.join(" "));
    }
    println!(
        "Session:   {} ({} player(s))",
        if snapshot.network_active { "open" } else { "closed" },
        snapshot.connected_players
    );
    if let Some(player) = &snapshot.bingo_called_by {
        println!("Bingo:     called by {player}");
    }
    if snapshot.ended {
        println!("Game over");
    }
}
