use bingo_royale::GameMode;
use std::fmt;

/// A command typed at the player prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Look for a caller on the local network and join the first one.
    Scan,
    /// Join a caller at a known address; the port defaults to the configured one.
    Connect { host: String, port: Option<u16> },
    Disconnect,
    /// Mark or unmark the cell holding this number.
    Mark(u8),
    /// Print the card.
    ShowCard,
    /// Deal a new card, optionally for another mode.
    NewCard(Option<GameMode>),
    ClearMarks,
    Bingo,
    Ping,
    Help,
    Quit,
}

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Connect command missing its address.
    ConnectMissingHost,
    /// The port part of an address is not a valid port.
    InvalidPort(String),
    /// Mark command missing its number.
    MarkMissingNumber,
    /// The number to mark is not a ball number.
    InvalidNumber(String),
    /// The mode argument is neither 75 nor 90.
    InvalidMode(String),
    /// Unrecognized command.
    UnrecognizedCommand(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectMissingHost => write!(
                f,
                "Connect requires an address (e.g., 'connect 192.168.1.20:8888')"
            ),
            Self::InvalidPort(value) => write!(f, "Invalid port '{value}'"),
            Self::MarkMissingNumber => write!(f, "Mark requires a number (e.g., 'mark 42')"),
            Self::InvalidNumber(value) => {
                write!(f, "Invalid number '{value}'. Must be between 1 and 90")
            }
            Self::InvalidMode(value) => {
                write!(f, "Invalid mode '{value}'. Use 75 or 90 (e.g., 'new 90')")
            }
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{cmd}'. Type 'help' to see available commands"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a command string into a [`PlayerCommand`].
///
/// # Examples
///
/// ```
/// use br_player::commands::{PlayerCommand, parse_command};
///
/// assert_eq!(parse_command("bingo"), Ok(PlayerCommand::Bingo));
/// assert_eq!(parse_command("mark 42"), Ok(PlayerCommand::Mark(42)));
/// assert_eq!(
///     parse_command("connect 10.0.0.2:9000"),
///     Ok(PlayerCommand::Connect { host: "10.0.0.2".to_string(), port: Some(9000) })
/// );
/// ```
pub fn parse_command(input: &str) -> Result<PlayerCommand, ParseError> {
    let trimmed = input.trim();

    // Try single-word commands first
    match trimmed {
        "scan" => return Ok(PlayerCommand::Scan),
        "disconnect" => return Ok(PlayerCommand::Disconnect),
        "card" => return Ok(PlayerCommand::ShowCard),
        "clear" => return Ok(PlayerCommand::ClearMarks),
        "bingo" => return Ok(PlayerCommand::Bingo),
        "ping" => return Ok(PlayerCommand::Ping),
        "help" | "?" => return Ok(PlayerCommand::Help),
        "quit" | "exit" => return Ok(PlayerCommand::Quit),
        _ => {}
    }

    // Parse multi-word commands
    let parts: Vec<&str> = trimmed.split_ascii_whitespace().collect();
    match parts.first() {
        Some(&"connect") => parse_connect_command(&parts),
        Some(&"mark") => parse_mark_command(&parts),
        Some(&"new") => parse_new_command(&parts),
        _ => Err(ParseError::UnrecognizedCommand(trimmed.to_string())),
    }
}

/// Parse a connect command: "connect HOST[:PORT]"
fn parse_connect_command(parts: &[&str]) -> Result<PlayerCommand, ParseError> {
    let address = parts.get(1).ok_or(ParseError::ConnectMissingHost)?;
    let (host, port) = split_address(address)?;
    if host.is_empty() {
        return Err(ParseError::ConnectMissingHost);
    }
    Ok(PlayerCommand::Connect {
        host: host.to_string(),
        port,
    })
}

/// Split `host`, `host:port`, `[v6]` or `[v6]:port`. A bare IPv6 address
/// has several colons and is taken whole.
fn split_address(address: &str) -> Result<(&str, Option<u16>), ParseError> {
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|_| ParseError::InvalidPort(port.to_string()))
    };

    if let Some(rest) = address.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((host, "")) => Ok((host, None)),
            Some((host, tail)) => match tail.strip_prefix(':') {
                Some(port) => Ok((host, Some(parse_port(port)?))),
                None => Err(ParseError::InvalidPort(tail.to_string())),
            },
            None => Ok((rest, None)),
        };
    }

    match address.split_once(':') {
        Some((host, port)) if !port.contains(':') => Ok((host, Some(parse_port(port)?))),
        _ => Ok((address, None)),
    }
}

/// Parse a mark command: "mark NUMBER"
fn parse_mark_command(parts: &[&str]) -> Result<PlayerCommand, ParseError> {
    let value = parts.get(1).ok_or(ParseError::MarkMissingNumber)?;
    match value.parse::<u8>() {
        Ok(number) if (1..=GameMode::European90.max_ball()).contains(&number) => {
            Ok(PlayerCommand::Mark(number))
        }
        _ => Err(ParseError::InvalidNumber(value.to_string())),
    }
}

/// Parse a new-card command: "new [75|90]"
fn parse_new_command(parts: &[&str]) -> Result<PlayerCommand, ParseError> {
    match parts.get(1) {
        Some(value) => value
            .parse()
            .map(|mode| PlayerCommand::NewCard(Some(mode)))
            .map_err(|_| ParseError::InvalidMode(value.to_string())),
        None => Ok(PlayerCommand::NewCard(None)),
    }
}
