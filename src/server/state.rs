//! Application state shared by the HTTP and WebSocket handlers.

use actix::Addr;
use std::sync::Arc;

use crate::server::leaderboard::Leaderboard;
use crate::server::matchmaking::MatchmakingServer;
use crate::server::registry::ConnectionRegistry;

pub struct AppState {
    pub matchmaking: Addr<MatchmakingServer>,
    pub registry: Addr<ConnectionRegistry>,
    pub leaderboard: Arc<Leaderboard>,
}

impl AppState {
    pub fn new(
        matchmaking: Addr<MatchmakingServer>,
        registry: Addr<ConnectionRegistry>,
        leaderboard: Arc<Leaderboard>,
    ) -> Self {
        AppState {
            matchmaking,
            registry,
            leaderboard,
        }
    }
}
