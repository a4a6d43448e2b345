//! Game coordinators tying the rules to the network.
//!
//! Each coordinator owns its state outright and is driven by discrete calls:
//! UI commands on one side, session events on the other. The event receiver
//! returned from each constructor is meant to be polled by the owner and fed
//! back into the coordinator.

pub mod caller;
pub mod player;

pub use caller::{CallerSnapshot, GameCoordinator};
pub use player::{PlayerCoordinator, PlayerNotice, PlayerSnapshot};
