//! Matchmaking: the waiting pool, the match table and its lifecycle timers.

pub mod match_state;
pub mod messages;
pub mod queue;
pub mod reaper;
pub mod server;
pub mod supervisor;

pub use server::MatchmakingServer;
