//! Disconnect supervisor: reacts to channel lifecycle events from the registry.
//!
//! - closed while queued: removed from the pool, nothing to resume
//! - closed while a proposal is open: implicit decline
//! - closed during a race: grace timer, then forfeit unless the participant is back
//!
//! A reopened channel cancels any pending grace timer and gets resynchronised.

use actix::prelude::*;
use std::time::Instant;
use log::{debug, info};

use super::match_state::MatchPhase;
use super::server::MatchmakingServer;
use crate::race::types::ParticipantId;
use crate::server::messages::ServerWsMessage;
use crate::server::race_session::messages::{Forfeit, Resync};
use crate::server::registry::ConnectionEvent;

impl MatchmakingServer {
    fn on_channel_opened(&mut self, participant: ParticipantId, ctx: &mut Context<Self>) {
        let Some(record) = self.participants.get_mut(&participant) else {
            return;
        };
        if let Some(timer) = record.grace_timer.take() {
            ctx.cancel_future(timer);
            info!("[Supervisor] {} ({}) is back within the grace period", participant, record.info.display_name);
        }

        let current = record.current_match.and_then(|id| self.matches.get(&id));
        match current {
            Some(m) if m.state.phase() == MatchPhase::Proposed => {
                self.send_to(&participant, self.proposal_message(m));
            }
            Some(m) => {
                if let Some(race) = &m.race {
                    race.do_send(Resync { participant });
                }
            }
            None if self.queue.contains(&participant) => {
                self.send_to(&participant, ServerWsMessage::QueueStatus(self.queue_status(&participant)));
            }
            None => {}
        }
    }

    fn on_channel_closed(&mut self, participant: ParticipantId, ctx: &mut Context<Self>) {
        if self.queue.leave(&participant).is_some() {
            info!("[Supervisor] {} dropped while queued, removed from the pool", participant);
            self.release_if_idle(&participant);
            return;
        }

        let Some(match_id) = self.participants.get(&participant).and_then(|r| r.current_match) else {
            self.release_if_idle(&participant);
            return;
        };
        let Some(record) = self.matches.get_mut(&match_id) else {
            return;
        };
        match record.state.phase() {
            MatchPhase::Proposed => match record.state.decline(&participant, Instant::now()) {
                Ok(abandoned) => {
                    info!("[Supervisor] {} dropped during proposal of match_id={}", participant, match_id);
                    self.after_abandoned_proposal(match_id, abandoned, "participant disconnected", ctx);
                }
                Err(e) => debug!("[Supervisor] match_id={} ignores drop of {}: {}", match_id, participant, e),
            },
            MatchPhase::Accepted | MatchPhase::Active => {
                let grace = self.config.disconnect_grace;
                let absent = participant.clone();
                let timer = ctx.run_later(grace, move |act, _ctx| act.grace_expired(absent));
                if let Some(p) = self.participants.get_mut(&participant) {
                    if let Some(previous) = p.grace_timer.replace(timer) {
                        ctx.cancel_future(previous);
                    }
                }
                info!(
                    "[Supervisor] {} dropped from match_id={}, forfeit in {}s unless back",
                    participant,
                    match_id,
                    grace.as_secs()
                );
            }
            MatchPhase::Completed | MatchPhase::Abandoned => {}
        }
    }

    fn grace_expired(&mut self, participant: ParticipantId) {
        let Some(record) = self.participants.get_mut(&participant) else {
            return;
        };
        record.grace_timer = None;
        let Some(match_id) = record.current_match else {
            return;
        };
        let Some(race) = self.matches.get(&match_id).and_then(|m| m.race.as_ref()) else {
            return;
        };
        info!("[Supervisor] {} did not come back, match_id={} forfeited", participant, match_id);
        race.do_send(Forfeit { absent: participant });
    }
}

impl Handler<ConnectionEvent> for MatchmakingServer {
    type Result = ();

    fn handle(&mut self, msg: ConnectionEvent, ctx: &mut Self::Context) -> Self::Result {
        match msg {
            ConnectionEvent::Opened(participant) => self.on_channel_opened(participant, ctx),
            ConnectionEvent::Closed(participant) => self.on_channel_closed(participant, ctx),
        }
    }
}
