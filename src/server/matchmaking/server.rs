/// Matchmaking server actor.
///
/// Owns the waiting pool and the match table. Pairs waiting participants into proposed
/// matches, runs acceptance, starts one race session per accepted match and records
/// the result once the race resolves. The disconnect supervisor and the reaper are
/// implemented on this actor in their own modules so every match transition goes
/// through a single mailbox.

use actix::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use log::{debug, info, warn};

use super::match_state::{Abandoned, Acceptance, Match};
use super::messages::{
    AcceptMatch, DeclineMatch, GetQueueStatus, JoinQueue, LeaveQueue, LookupMatch, MatchSummary, RaceConcluded,
    SubmitMove,
};
use super::queue::{MatchQueue, PairingPolicy, QueueEntry};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::race::catalog::CourseCatalog;
use crate::race::types::{MatchId, ParticipantId, PlayerInfo};
use crate::server::messages::{QueueStatusView, ServerWsMessage};
use crate::server::race_session::messages::{ApplyMove, CloseRace};
use crate::server::race_session::RaceSession;
use crate::server::registry::{delivered_to_all, Broadcast, ConnectionRegistry, Deliver, Subscribe};
use crate::server::results::{ResultSink, StatsSink};

/// A match plus the handles that live alongside it.
pub(super) struct MatchRecord {
    pub(super) state: Match,
    pub(super) race: Option<Addr<RaceSession>>,
    pub(super) accept_timer: Option<SpawnHandle>,
}

/// What the server remembers about a participant between messages.
pub(super) struct ParticipantRecord {
    pub(super) info: PlayerInfo,
    /// Proposed or active match, never a terminal one.
    pub(super) current_match: Option<MatchId>,
    /// Latest match that reached a terminal state, to answer late messages.
    pub(super) last_match: Option<MatchId>,
    pub(super) grace_timer: Option<SpawnHandle>,
}

impl ParticipantRecord {
    fn new(info: PlayerInfo) -> Self {
        Self {
            info,
            current_match: None,
            last_match: None,
            grace_timer: None,
        }
    }
}

pub struct MatchmakingServer {
    pub(super) config: EngineConfig,
    pub(super) queue: MatchQueue,
    pub(super) matches: HashMap<MatchId, MatchRecord>,
    pub(super) participants: HashMap<ParticipantId, ParticipantRecord>,
    pub(super) registry: Addr<ConnectionRegistry>,
    catalog: Arc<CourseCatalog>,
    results: Box<dyn ResultSink>,
    stats: Arc<dyn StatsSink>,
}

impl MatchmakingServer {
    pub fn new(
        config: EngineConfig,
        registry: Addr<ConnectionRegistry>,
        catalog: Arc<CourseCatalog>,
        results: Box<dyn ResultSink>,
        stats: Arc<dyn StatsSink>,
    ) -> Self {
        Self {
            config,
            queue: MatchQueue::new(),
            matches: HashMap::new(),
            participants: HashMap::new(),
            registry,
            catalog,
            results,
            stats,
        }
    }

    fn policy(&self) -> PairingPolicy {
        PairingPolicy {
            group_size: self.config.group_size,
            rating_window: self.config.rating_window,
            relax_after: self.config.relax_rating_after,
        }
    }

    pub(super) fn send_to(&self, participant: &ParticipantId, message: ServerWsMessage) {
        self.registry.do_send(Deliver {
            participant: participant.clone(),
            message,
        });
    }

    pub(super) fn broadcast(&self, participants: Vec<ParticipantId>, message: ServerWsMessage) {
        self.registry.do_send(Broadcast { participants, message });
    }

    /// Broadcast a match-level frame and warn about anyone it did not reach.
    ///
    /// Unreached participants are left to the disconnect supervisor.
    fn broadcast_checked(
        &self,
        match_id: MatchId,
        participants: Vec<ParticipantId>,
        message: ServerWsMessage,
        ctx: &mut Context<Self>,
    ) {
        let kind = message.kind();
        self.registry
            .send(Broadcast { participants, message })
            .into_actor(self)
            .then(move |res, _act, _ctx| {
                match res {
                    Ok(unreached) => {
                        if let Err(e) = delivered_to_all(&unreached) {
                            warn!(
                                "[Matchmaking] match_id={} {} frame: {} for {:?}",
                                match_id,
                                kind,
                                e,
                                unreached.iter().map(|p| p.to_string()).collect::<Vec<_>>()
                            );
                        }
                    }
                    Err(e) => warn!("[Matchmaking] match_id={} {} frame lost, registry unavailable: {}", match_id, kind, e),
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    pub(super) fn queue_status(&self, participant: &ParticipantId) -> QueueStatusView {
        self.queue
            .status(participant, Instant::now(), self.config.group_size)
            .map(|pos| QueueStatusView {
                queued: true,
                position: Some(pos.position),
                estimated_wait_secs: pos.estimated_wait.map(|d| d.as_secs()),
            })
            .unwrap_or_else(QueueStatusView::not_queued)
    }

    pub(super) fn proposal_message(&self, record: &MatchRecord) -> ServerWsMessage {
        let remaining = record.state.accept_deadline().saturating_duration_since(Instant::now());
        ServerWsMessage::MatchProposed {
            match_id: record.state.id(),
            course: (**record.state.course()).clone(),
            participants: record.state.players(),
            accept_within_secs: remaining.as_secs(),
        }
    }

    /// Resolve which match a participant's message is about.
    ///
    /// A match that already reached a terminal state answers `MatchAlreadyClosed`
    /// for as long as it is retained.
    pub(super) fn match_of(&self, participant: &ParticipantId, requested: Option<MatchId>) -> Result<MatchId, EngineError> {
        let record = self.participants.get(participant);
        let id = match requested {
            Some(id) => id,
            None => match record.and_then(|r| r.current_match.or(r.last_match)) {
                Some(id) => id,
                None => return Err(EngineError::NotInMatch),
            },
        };
        let Some(found) = self.matches.get(&id) else {
            return Err(EngineError::NotInMatch);
        };
        if !found.state.contains(participant) {
            return Err(EngineError::NotInMatch);
        }
        if found.state.is_terminal() {
            return Err(EngineError::MatchAlreadyClosed);
        }
        Ok(id)
    }

    /// Pair as many full groups as the pool allows.
    pub(super) fn run_pairing(&mut self, ctx: &mut Context<Self>) {
        let policy = self.policy();
        while let Some(group) = self.queue.pair(Instant::now(), &policy) {
            self.propose(group, ctx);
        }
    }

    fn propose(&mut self, group: Vec<QueueEntry>, ctx: &mut Context<Self>) {
        let now = Instant::now();
        let state = Match::propose(group, self.catalog.pick(), now, self.config.accept_timeout);
        let match_id = state.id();
        let participants = state.participant_ids();
        for participant in &participants {
            if let Some(record) = self.participants.get_mut(participant) {
                record.current_match = Some(match_id);
            }
        }

        let accept_timer = ctx.run_later(self.config.accept_timeout, move |act, ctx| {
            act.expire_proposal(match_id, ctx);
        });
        let record = MatchRecord {
            state,
            race: None,
            accept_timer: Some(accept_timer),
        };
        let message = self.proposal_message(&record);
        info!(
            "[Matchmaking] Proposed match_id={} on course {} to {:?}",
            match_id,
            record.state.course().id,
            participants.iter().map(|p| p.to_string()).collect::<Vec<_>>()
        );
        self.matches.insert(match_id, record);
        self.broadcast_checked(match_id, participants, message, ctx);
    }

    pub(super) fn expire_proposal(&mut self, match_id: MatchId, ctx: &mut Context<Self>) {
        let Some(record) = self.matches.get_mut(&match_id) else {
            return;
        };
        record.accept_timer = None;
        if let Some(abandoned) = record.state.expire_proposal(Instant::now()) {
            info!("[Matchmaking] match_id={} not accepted in time", match_id);
            self.after_abandoned_proposal(match_id, abandoned, "acceptance timed out", ctx);
        }
    }

    /// Fallout of a proposal that fell through: accepters go back to the pool
    /// with their original priority, everyone else is released.
    pub(super) fn after_abandoned_proposal(
        &mut self,
        match_id: MatchId,
        abandoned: Abandoned,
        reason: &str,
        ctx: &mut Context<Self>,
    ) {
        let Some(record) = self.matches.get_mut(&match_id) else {
            return;
        };
        if let Some(timer) = record.accept_timer.take() {
            ctx.cancel_future(timer);
        }
        let everyone = record.state.participant_ids();
        for participant in &everyone {
            if let Some(p) = self.participants.get_mut(participant) {
                p.current_match = None;
                p.last_match = Some(match_id);
            }
        }
        self.broadcast(
            everyone,
            ServerWsMessage::MatchAbandoned {
                match_id,
                reason: reason.to_string(),
            },
        );

        let requeued: Vec<ParticipantId> = abandoned.requeue.iter().map(|e| e.id().clone()).collect();
        for entry in abandoned.requeue {
            self.queue.requeue(entry);
        }
        for participant in &requeued {
            debug!("[Matchmaking] {} back in queue after match_id={} fell through", participant, match_id);
            self.send_to(participant, ServerWsMessage::QueueStatus(self.queue_status(participant)));
        }
        for participant in &abandoned.released {
            debug!("[Matchmaking] {} released from match_id={}", participant, match_id);
        }
        self.run_pairing(ctx);
    }

    fn start_race(&mut self, match_id: MatchId, ctx: &mut Context<Self>) {
        let registry = self.registry.clone();
        let Some(record) = self.matches.get_mut(&match_id) else {
            return;
        };
        if let Some(timer) = record.accept_timer.take() {
            ctx.cancel_future(timer);
        }
        if let Err(e) = record.state.start() {
            warn!("[Matchmaking] match_id={} cannot start: {}", match_id, e);
            return;
        }
        let course = Arc::clone(record.state.course());
        let players = record.state.players();
        let race = RaceSession::new(match_id, Arc::clone(&course), &players, registry, ctx.address().recipient()).start();
        record.race = Some(race);

        info!("[Matchmaking] match_id={} is live on course {}", match_id, course.id);
        self.broadcast_checked(
            match_id,
            players.iter().map(|p| p.id.clone()).collect(),
            ServerWsMessage::MatchStart {
                match_id,
                course: (*course).clone(),
                participants: players,
            },
            ctx,
        );
    }

    /// Forget a terminal match. Its race session, if any, is stopped.
    pub(super) fn forget_match(&mut self, match_id: MatchId) {
        if let Some(record) = self.matches.remove(&match_id) {
            if let Some(race) = record.race {
                race.do_send(CloseRace);
            }
            debug!("[Matchmaking] Forgot match_id={}", match_id);
        }
    }

    /// Drop the record of a participant who has nothing left to resume.
    pub(super) fn release_if_idle(&mut self, participant: &ParticipantId) {
        let idle = self.participants.get(participant).is_some_and(|r| {
            r.current_match.is_none()
                && r.grace_timer.is_none()
                && r.last_match.is_none_or(|m| !self.matches.contains_key(&m))
        });
        if idle && !self.queue.contains(participant) {
            self.participants.remove(participant);
        }
    }
}

impl Actor for MatchmakingServer {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.registry.do_send(Subscribe(ctx.address().recipient()));
        ctx.run_interval(self.config.pairing_tick, |act, ctx| act.run_pairing(ctx));
        ctx.run_interval(self.config.reap_interval, |act, ctx| act.reap(ctx));
        info!(
            "[Matchmaking] Started (group size {}, {} courses)",
            self.config.group_size,
            self.catalog.len()
        );
    }
}

impl Handler<JoinQueue> for MatchmakingServer {
    type Result = Result<QueueStatusView, EngineError>;

    fn handle(&mut self, msg: JoinQueue, ctx: &mut Self::Context) -> Self::Result {
        let id = msg.player.id.clone();
        if let Some(match_id) = self.participants.get(&id).and_then(|r| r.current_match) {
            // A participant bound to a live match still holds its place in matchmaking.
            debug!("[Matchmaking] {} tried to join while in match_id={}", id, match_id);
            return Err(EngineError::AlreadyQueued);
        }
        self.queue.join(msg.player.clone(), msg.hint, Instant::now())?;
        match self.participants.get_mut(&id) {
            Some(record) => record.info = msg.player,
            None => {
                self.participants.insert(id.clone(), ParticipantRecord::new(msg.player));
            }
        }

        let status = self.queue_status(&id);
        debug!("[Matchmaking] {} joined the queue at position {:?}", id, status.position);
        // Pushed before pairing so the client sees its standing before any proposal.
        self.send_to(&id, ServerWsMessage::QueueStatus(status.clone()));
        self.run_pairing(ctx);
        Ok(status)
    }
}

impl Handler<LeaveQueue> for MatchmakingServer {
    type Result = bool;

    fn handle(&mut self, msg: LeaveQueue, _ctx: &mut Self::Context) -> Self::Result {
        let removed = self.queue.leave(&msg.participant).is_some();
        if removed {
            debug!("[Matchmaking] {} left the queue", msg.participant);
            self.send_to(&msg.participant, ServerWsMessage::QueueStatus(QueueStatusView::not_queued()));
            self.release_if_idle(&msg.participant);
        }
        removed
    }
}

impl Handler<GetQueueStatus> for MatchmakingServer {
    type Result = MessageResult<GetQueueStatus>;

    fn handle(&mut self, msg: GetQueueStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.queue_status(&msg.participant))
    }
}

impl Handler<AcceptMatch> for MatchmakingServer {
    type Result = Result<(), EngineError>;

    fn handle(&mut self, msg: AcceptMatch, ctx: &mut Self::Context) -> Self::Result {
        let match_id = self.match_of(&msg.participant, None)?;
        let record = self.matches.get_mut(&match_id).ok_or(EngineError::NotInMatch)?;
        match record.state.accept(&msg.participant)? {
            Acceptance::AllAccepted => self.start_race(match_id, ctx),
            Acceptance::Waiting { accepted, required } => {
                debug!("[Matchmaking] match_id={} accepted by {} ({}/{})", match_id, msg.participant, accepted, required);
            }
            Acceptance::AlreadyAccepted => {}
        }
        Ok(())
    }
}

impl Handler<DeclineMatch> for MatchmakingServer {
    type Result = Result<(), EngineError>;

    fn handle(&mut self, msg: DeclineMatch, ctx: &mut Self::Context) -> Self::Result {
        let match_id = self.match_of(&msg.participant, None)?;
        let record = self.matches.get_mut(&match_id).ok_or(EngineError::NotInMatch)?;
        let abandoned = record.state.decline(&msg.participant, Instant::now())?;
        info!("[Matchmaking] match_id={} declined by {}", match_id, msg.participant);
        self.after_abandoned_proposal(match_id, abandoned, "declined", ctx);
        Ok(())
    }
}

impl Handler<SubmitMove> for MatchmakingServer {
    type Result = ();

    fn handle(&mut self, msg: SubmitMove, _ctx: &mut Self::Context) -> Self::Result {
        let race = self
            .match_of(&msg.participant, msg.match_id)
            .and_then(|id| {
                self.matches
                    .get(&id)
                    .and_then(|r| r.race.clone())
                    .ok_or(EngineError::NotInMatch)
            });
        match race {
            Ok(race) => race.do_send(ApplyMove {
                participant: msg.participant,
                mv: msg.mv,
            }),
            Err(e) => {
                debug!("[Matchmaking] Move from {} dropped: {}", msg.participant, e);
                self.send_to(&msg.participant, ServerWsMessage::error(&e));
            }
        }
    }
}

impl Handler<LookupMatch> for MatchmakingServer {
    type Result = Result<MatchSummary, EngineError>;

    fn handle(&mut self, msg: LookupMatch, _ctx: &mut Self::Context) -> Self::Result {
        let record = self.matches.get(&msg.match_id).ok_or(EngineError::NotInMatch)?;
        Ok(MatchSummary {
            match_id: msg.match_id,
            phase: record.state.phase(),
            participants: record.state.players(),
            race: record.race.clone(),
        })
    }
}

impl Handler<RaceConcluded> for MatchmakingServer {
    type Result = ();

    fn handle(&mut self, msg: RaceConcluded, ctx: &mut Self::Context) -> Self::Result {
        let Some(record) = self.matches.get_mut(&msg.match_id) else {
            debug!("[Matchmaking] Result for unknown match_id={} dropped", msg.match_id);
            return;
        };
        let phase = match record.state.conclude(&msg.result.reason, Instant::now()) {
            Ok(phase) => phase,
            Err(e) => {
                debug!("[Matchmaking] Result for match_id={} dropped: {}", msg.match_id, e);
                return;
            }
        };
        let participants = record.state.participant_ids();
        for participant in &participants {
            if let Some(p) = self.participants.get_mut(participant) {
                p.current_match = None;
                p.last_match = Some(msg.match_id);
                if let Some(timer) = p.grace_timer.take() {
                    ctx.cancel_future(timer);
                }
            }
        }
        info!("[Matchmaking] match_id={} is {:?}", msg.match_id, phase);

        self.broadcast_checked(
            msg.match_id,
            participants,
            ServerWsMessage::MatchResult {
                match_id: msg.match_id,
                outcome: msg.result.clone(),
            },
            ctx,
        );
        self.stats.record(&msg.result);
        if let Err(e) = self.results.record_match_result(&msg.result) {
            warn!("[Matchmaking] match_id={} result not recorded: {}", msg.match_id, e);
        }
    }
}
