//! Bingo game rules shared by the caller and the players.
//!
//! This module provides:
//! - Game modes and their number domains
//! - Card generation for 75- and 90-ball play
//! - Mark tracking and win detection
//! - The caller's draw state

pub mod card;
pub mod draw;
pub mod errors;
pub mod marks;
pub mod mode;
pub mod win;

pub use card::{BingoCard, CardGenerator, Cell};
pub use draw::DrawState;
pub use errors::{GameError, GameResult};
pub use marks::MarkSet;
pub use mode::GameMode;
pub use win::{WinStatus, WinTracker, WinTransition};
