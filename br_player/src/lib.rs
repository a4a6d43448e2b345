//! Internal modules for the bingo player.
//!
//! Command parsing and text rendering used by the br_player binary.

pub mod commands;
pub mod view;
