//! Messages accepted by the matchmaking server.

use actix::prelude::*;

use super::match_state::MatchPhase;
use crate::error::EngineError;
use crate::race::result::MatchResult;
use crate::race::types::{MatchId, Move, ParticipantId, PlayerInfo};
use crate::server::messages::QueueStatusView;
use crate::server::race_session::RaceSession;

/// Message: enter the pool. Replies with the standing right after insertion.
#[derive(Message, Debug)]
#[rtype(result = "Result<QueueStatusView, EngineError>")]
pub struct JoinQueue {
    pub player: PlayerInfo,
    pub hint: Option<u32>,
}

/// Message: leave the pool. Replies `true` if an entry was removed.
#[derive(Message, Debug)]
#[rtype(result = "bool")]
pub struct LeaveQueue {
    pub participant: ParticipantId,
}

#[derive(Message, Debug)]
#[rtype(result = "QueueStatusView")]
pub struct GetQueueStatus {
    pub participant: ParticipantId,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<(), EngineError>")]
pub struct AcceptMatch {
    pub participant: ParticipantId,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<(), EngineError>")]
pub struct DeclineMatch {
    pub participant: ParticipantId,
}

/// Message: a move from the live channel. Outcome is pushed back through the registry.
#[derive(Message, Debug)]
#[rtype(result = "()")]
pub struct SubmitMove {
    pub participant: ParticipantId,
    /// Defaults to the participant's current match.
    pub match_id: Option<MatchId>,
    pub mv: Move,
}

/// Read-only view of a match table entry.
#[derive(Clone)]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub phase: MatchPhase,
    pub participants: Vec<PlayerInfo>,
    /// Present once the race has started, and kept until the match is forgotten.
    pub race: Option<Addr<RaceSession>>,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<MatchSummary, EngineError>")]
pub struct LookupMatch {
    pub match_id: MatchId,
}

/// Message: a race session resolved its race.
#[derive(Message, Debug)]
#[rtype(result = "()")]
pub struct RaceConcluded {
    pub match_id: MatchId,
    pub result: MatchResult,
}
