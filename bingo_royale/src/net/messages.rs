use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::game::mode::GameMode;

/// Name used when a win claim arrives without one.
pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// One record on the TCP game channel.
///
/// Serialized as a JSON object with a `type` tag, e.g.
/// `{"type":"ball","number":42}`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// First record a caller sends on every new connection.
    Welcome {
        #[serde(default, deserialize_with = "lenient_mode")]
        mode: GameMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server: Option<String>,
    },
    Ball {
        number: u8,
    },
    NewGame {
        #[serde(default, deserialize_with = "lenient_mode")]
        mode: GameMode,
    },
    GameReset,
    GameEnd,
    /// Caller to players: someone claimed a win.
    BingoCalled {
        #[serde(default = "default_player")]
        player: String,
    },
    /// Player to caller: a win claim.
    Bingo {
        #[serde(default = "default_player")]
        player: String,
    },
    Ping,
    Pong,
    /// Best-effort goodbye before the caller closes the connection.
    ServerClosed,
}

impl WireMessage {
    /// Parse one record. Blank lines and unknown shapes are errors.
    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome { mode, server } => match server {
                Some(server) => write!(f, "welcome from {server} ({mode}-ball)"),
                None => write!(f, "welcome ({mode}-ball)"),
            },
            Self::Ball { number } => write!(f, "ball {number}"),
            Self::NewGame { mode } => write!(f, "new {mode}-ball game"),
            Self::GameReset => write!(f, "game reset"),
            Self::GameEnd => write!(f, "game end"),
            Self::BingoCalled { player } => write!(f, "{player} called bingo"),
            Self::Bingo { player } => write!(f, "bingo claim from {player}"),
            Self::Ping => write!(f, "ping"),
            Self::Pong => write!(f, "pong"),
            Self::ServerClosed => write!(f, "server closed"),
        }
    }
}

/// Lifecycle announcements a caller broadcasts besides balls.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GameEventKind {
    NewGame(GameMode),
    Reset,
    End,
}

impl From<GameEventKind> for WireMessage {
    fn from(kind: GameEventKind) -> Self {
        match kind {
            GameEventKind::NewGame(mode) => Self::NewGame { mode },
            GameEventKind::Reset => Self::GameReset,
            GameEventKind::End => Self::GameEnd,
        }
    }
}

fn default_player() -> String {
    DEFAULT_PLAYER_NAME.to_string()
}

/// Any mode value other than 75 or 90 falls back to the default mode.
fn lenient_mode<'de, D>(deserializer: D) -> Result<GameMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(value
        .and_then(|value| u8::try_from(value).ok())
        .and_then(|value| GameMode::try_from(value).ok())
        .unwrap_or_default())
}
