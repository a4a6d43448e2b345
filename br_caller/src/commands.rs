//! Parsing of the caller's interactive commands.

use bingo_royale::GameMode;
use std::fmt;

/// A command typed at the caller prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerCommand {
    Draw,
    /// Start a new game, optionally switching modes.
    NewGame(Option<GameMode>),
    Reset,
    End,
    Status,
    /// Open the session if closed, close it if open.
    ToggleNetwork,
    /// Dismiss the last win claim.
    ClearClaim,
    Help,
    Quit,
}

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The mode argument is neither 75 nor 90.
    InvalidMode(String),
    /// A command that takes no arguments was given some.
    UnexpectedArgument(String),
    /// Unrecognized command.
    UnrecognizedCommand(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMode(value) => {
                write!(f, "Invalid mode '{value}'. Use 75 or 90 (e.g., 'new 90')")
            }
            Self::UnexpectedArgument(cmd) => write!(f, "'{cmd}' takes no arguments"),
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{cmd}'. Type 'help' to see available commands"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse one line of caller input.
///
/// Blank input draws a ball, so holding Enter runs the game.
pub fn parse_command(input: &str) -> Result<CallerCommand, ParseError> {
    let parts: Vec<&str> = input.split_ascii_whitespace().collect();
    let Some((&first, rest)) = parts.split_first() else {
        return Ok(CallerCommand::Draw);
    };
    let name = first.to_ascii_lowercase();

    if name == "new" {
        return match rest {
            [] => Ok(CallerCommand::NewGame(None)),
            [mode] => mode
                .parse()
                .map(|mode| CallerCommand::NewGame(Some(mode)))
                .map_err(|_| ParseError::InvalidMode(mode.to_string())),
            _ => Err(ParseError::UnexpectedArgument(input.trim().to_string())),
        };
    }

    let command = match name.as_str() {
        "draw" | "d" => CallerCommand::Draw,
        "reset" => CallerCommand::Reset,
        "end" => CallerCommand::End,
        "status" | "s" => CallerCommand::Status,
        "network" | "net" => CallerCommand::ToggleNetwork,
        "clear" => CallerCommand::ClearClaim,
        "help" | "?" => CallerCommand::Help,
        "quit" | "exit" | "q" => CallerCommand::Quit,
        _ => return Err(ParseError::UnrecognizedCommand(input.trim().to_string())),
    };
    if !rest.is_empty() {
        return Err(ParseError::UnexpectedArgument(first.to_string()));
    }
    Ok(command)
}
