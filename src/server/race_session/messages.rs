use actix::prelude::*;

use crate::error::EngineError;
use crate::race::state::{RaceSnapshot, StateDelta};
use crate::race::types::{Move, ParticipantId};

/// Message: one move from a participant, in arrival order.
#[derive(Message, Debug)]
#[rtype(result = "Result<StateDelta, EngineError>")]
pub struct ApplyMove {
    pub participant: ParticipantId,
    pub mv: Move,
}

/// Message: `absent` stayed away past the grace period.
#[derive(Message, Debug)]
#[rtype(result = "()")]
pub struct Forfeit {
    pub absent: ParticipantId,
}

/// Message: push a full snapshot to a participant who just reconnected.
#[derive(Message, Debug)]
#[rtype(result = "()")]
pub struct Resync {
    pub participant: ParticipantId,
}

#[derive(Message, Debug)]
#[rtype(result = "RaceSnapshot")]
pub struct GetSnapshot;

/// Message: the match table forgot this race; stop the actor.
#[derive(Message, Debug)]
#[rtype(result = "()")]
pub struct CloseRace;
