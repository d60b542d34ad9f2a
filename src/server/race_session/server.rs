use actix::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use log::{debug, info};

use super::messages::{ApplyMove, CloseRace, Forfeit, GetSnapshot, Resync};
use crate::error::EngineError;
use crate::race::course::Course;
use crate::race::result::MatchResult;
use crate::race::state::{RaceState, StateDelta};
use crate::race::types::{MatchId, ParticipantId, PlayerInfo};
use crate::server::matchmaking::messages::RaceConcluded;
use crate::server::messages::ServerWsMessage;
use crate::server::registry::{Broadcast, ConnectionRegistry, Deliver};

/// Live race of one match.
///
/// Moves from a participant arrive through a single mailbox and are applied in that
/// order. The first completion resolves the race at once; the result goes back to the
/// match table, which stays responsible for the terminal transition.
pub struct RaceSession {
    state: RaceState,
    players: Vec<ParticipantId>,
    registry: Addr<ConnectionRegistry>,
    matchmaking: Recipient<RaceConcluded>,
}

impl RaceSession {
    pub fn new(
        match_id: MatchId,
        course: Arc<Course>,
        players: &[PlayerInfo],
        registry: Addr<ConnectionRegistry>,
        matchmaking: Recipient<RaceConcluded>,
    ) -> Self {
        Self {
            state: RaceState::new(match_id, course, players, Instant::now()),
            players: players.iter().map(|p| p.id.clone()).collect(),
            registry,
            matchmaking,
        }
    }

    fn others(&self, participant: &ParticipantId) -> Vec<ParticipantId> {
        self.players.iter().filter(|p| *p != participant).cloned().collect()
    }

    fn send_to(&self, participant: &ParticipantId, message: ServerWsMessage) {
        self.registry.do_send(Deliver {
            participant: participant.clone(),
            message,
        });
    }

    fn report(&self, result: MatchResult) {
        info!(
            "[Race] match_id={} resolved ({:?}), winner={}",
            self.state.match_id(),
            result.reason,
            result.winner().map(|w| w.participant.to_string()).unwrap_or_default()
        );
        self.matchmaking.do_send(RaceConcluded {
            match_id: self.state.match_id(),
            result,
        });
    }

    /// Echo a refused move back to its sender so the client can resynchronise.
    fn reject(&self, participant: &ParticipantId, err: &EngineError) {
        let message = match (err, self.state.progress_of(participant)) {
            (EngineError::InvalidMove(reason), Some(progress)) => ServerWsMessage::RejectedMove {
                match_id: self.state.match_id(),
                reason: reason.clone(),
                message: err.to_string(),
                cursor: progress.cursor,
                move_count: progress.move_count,
            },
            _ => ServerWsMessage::error(err),
        };
        debug!("[Race] match_id={} refused move from {}: {}", self.state.match_id(), participant, err);
        self.send_to(participant, message);
    }
}

impl Actor for RaceSession {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        debug!("[Race] match_id={} started with {} racers", self.state.match_id(), self.players.len());
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        debug!("[Race] match_id={} stopped", self.state.match_id());
    }
}

impl Handler<ApplyMove> for RaceSession {
    type Result = Result<StateDelta, EngineError>;

    fn handle(&mut self, msg: ApplyMove, _ctx: &mut Self::Context) -> Self::Result {
        let delta = match self.state.apply_move(&msg.participant, msg.mv, Instant::now()) {
            Ok(delta) => delta,
            Err(err) => {
                self.reject(&msg.participant, &err);
                return Err(err);
            }
        };

        self.registry.do_send(Broadcast {
            participants: self.others(&msg.participant),
            message: ServerWsMessage::StateDelta(delta.clone()),
        });

        if delta.completed {
            if let Some(result) = self.state.conclude_finished() {
                self.report(result);
            }
        }
        Ok(delta)
    }
}

impl Handler<Forfeit> for RaceSession {
    type Result = ();

    fn handle(&mut self, msg: Forfeit, _ctx: &mut Self::Context) -> Self::Result {
        match self.state.conclude_forfeit(&msg.absent) {
            Some(result) => self.report(result),
            None => debug!(
                "[Race] match_id={} ignoring forfeit of {}: already resolved",
                self.state.match_id(),
                msg.absent
            ),
        }
    }
}

impl Handler<Resync> for RaceSession {
    type Result = ();

    fn handle(&mut self, msg: Resync, _ctx: &mut Self::Context) -> Self::Result {
        self.send_to(&msg.participant, ServerWsMessage::MatchSnapshot(self.state.snapshot()));
    }
}

impl Handler<GetSnapshot> for RaceSession {
    type Result = MessageResult<GetSnapshot>;

    fn handle(&mut self, _msg: GetSnapshot, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.state.snapshot())
    }
}

impl Handler<CloseRace> for RaceSession {
    type Result = ();

    fn handle(&mut self, _msg: CloseRace, ctx: &mut Self::Context) -> Self::Result {
        ctx.stop();
    }
}
