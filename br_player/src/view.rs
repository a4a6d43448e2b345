//! Plain-text rendering of the player's state.

use bingo_royale::{
    GameMode, PlayerNotice, PlayerSnapshot,
    game::{
        card::{EMPTY_VALUE, FREE_VALUE},
        mode::BINGO_LETTERS,
    },
};
use std::fmt::Write;

/// Render the card with marked cells in brackets.
///
/// ```text
///     B    I    N    G    O
///     3   17 [34]   52   70
/// ```
pub fn render_card(snapshot: &PlayerSnapshot) -> String {
    let mut out = String::new();
    let cols = snapshot.mode.cols();

    if snapshot.mode == GameMode::Classic75 {
        for letter in BINGO_LETTERS {
            let _ = write!(out, "{letter:>5}");
        }
        out.push('\n');
    }

    for (index, &value) in snapshot.cells.iter().enumerate() {
        let label = match value {
            FREE_VALUE => "**".to_string(),
            EMPTY_VALUE => ".".to_string(),
            number => number.to_string(),
        };
        if snapshot.marks.contains(&index) {
            let _ = write!(out, "{:>5}", format!("[{label}]"));
        } else {
            let _ = write!(out, "{label:>5}");
        }
        if (index + 1) % cols == 0 {
            out.push('\n');
        }
    }
    out
}

/// One status line under the card.
pub fn render_status(snapshot: &PlayerSnapshot) -> String {
    let connection = match &snapshot.server {
        Some(server) => format!("connected to {server}"),
        None => "offline".to_string(),
    };
    let last_ball = snapshot
        .last_ball
        .map_or_else(|| "-".to_string(), |ball| ball.to_string());
    let win = if snapshot.status.has_bingo {
        " | BINGO!"
    } else if snapshot.status.has_line {
        " | LINE!"
    } else {
        ""
    };
    format!(
        "{}-ball | {connection} | last ball {last_ball} | {} drawn{win}",
        snapshot.mode,
        snapshot.drawn.len()
    )
}

/// Describe a notice for the terminal.
pub fn describe_notice(notice: &PlayerNotice) -> String {
    match notice {
        PlayerNotice::Joined { server } => {
            format!("Joined {}", server.as_deref().unwrap_or("the caller"))
        }
        PlayerNotice::BallReceived { number, marked } => {
            if *marked {
                format!("Ball {number} (marked)")
            } else {
                format!("Ball {number}")
            }
        }
        PlayerNotice::CardRegenerated { mode } => format!("New {mode}-ball card dealt"),
        PlayerNotice::LineAchieved => "LINE! You completed a line".to_string(),
        PlayerNotice::BingoAchieved => "BINGO! Type 'bingo' to claim it".to_string(),
        PlayerNotice::BingoCalled { player } => format!("*** {player} called BINGO! ***"),
        PlayerNotice::GameReset => "The caller reset the game".to_string(),
        PlayerNotice::GameEnded => "The caller ended the game".to_string(),
        PlayerNotice::PongReceived => "Pong".to_string(),
        PlayerNotice::Disconnected => "Disconnected from the caller".to_string(),
    }
}
