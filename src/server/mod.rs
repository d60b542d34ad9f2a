//! Server layer root module.
//!
//! - connection registry and live channel sessions
//! - matchmaking (queue, match table, disconnect supervisor, reaper)
//! - one race session actor per active match
//! - HTTP API, routing and result collaborators

pub mod anti_spam;
pub mod api;
pub mod http_error;
pub mod identity;
pub mod leaderboard;
pub mod matchmaking;
pub mod messages;
pub mod race_session;
pub mod registry;
pub mod results;
pub mod router;
pub mod session;
pub mod state;
