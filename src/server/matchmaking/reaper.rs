//! Periodic sweep over everything that can be left behind.

use actix::prelude::*;
use std::time::Instant;
use log::{debug, info};

use super::match_state::MatchPhase;
use super::server::MatchmakingServer;
use crate::race::types::{MatchId, ParticipantId};
use crate::server::messages::ServerWsMessage;
use crate::server::registry::ReapIdle;

impl MatchmakingServer {
    /// One reaper pass. Never touches race state; every change is a match or
    /// queue transition like the ones driven by participants.
    pub(super) fn reap(&mut self, ctx: &mut Context<Self>) {
        let now = Instant::now();

        for entry in self.queue.expire(now, self.config.max_queue_wait) {
            info!("[Reaper] {} waited too long, dropped from the queue", entry.id());
            self.send_to(entry.id(), ServerWsMessage::QueueExpired);
            self.release_if_idle(entry.id());
        }

        let overdue: Vec<MatchId> = self
            .matches
            .iter()
            .filter(|(_, m)| m.state.phase() == MatchPhase::Proposed && m.state.accept_deadline() <= now)
            .map(|(id, _)| *id)
            .collect();
        for match_id in overdue {
            self.expire_proposal(match_id, ctx);
        }

        let retention = self.config.closed_match_retention;
        let stale: Vec<MatchId> = self
            .matches
            .iter()
            .filter(|(_, m)| m.state.closed_at().is_some_and(|at| now.saturating_duration_since(at) >= retention))
            .map(|(id, _)| *id)
            .collect();
        for match_id in stale {
            self.forget_match(match_id);
        }

        let known: Vec<ParticipantId> = self.participants.keys().cloned().collect();
        for participant in &known {
            self.release_if_idle(participant);
        }

        debug!(
            "[Reaper] {} queued, {} matches, {} participants tracked",
            self.queue.len(),
            self.matches.len(),
            self.participants.len()
        );
        self.registry.do_send(ReapIdle {
            idle_for: self.config.heartbeat_timeout,
        });
    }
}
