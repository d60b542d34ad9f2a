//! One actor per active match, sole owner of that match's race state.

pub mod messages;
pub mod server;

pub use server::RaceSession;
