//! Error taxonomy shared by the queue, the match state machine and the race engine.
//!
//! Every variant maps to a stable wire code (see [`EngineError::code`]) used both in
//! WebSocket error frames and in HTTP error bodies.

use serde::Serialize;
use thiserror::Error;

/// Why a move was refused by the course grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("move does not apply to this course")]
    WrongMoveKind,
    #[error("cursor cannot move that way")]
    Blocked,
    #[error("expected '{expected}' but got '{got}'")]
    UnexpectedKey { expected: char, got: char },
    #[error("course already completed")]
    AlreadyFinished,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("already waiting in the queue")]
    AlreadyQueued,
    #[error("already bound to a running match")]
    AlreadyInMatch,
    #[error("not part of an active match")]
    NotInMatch,
    #[error("invalid move: {0}")]
    InvalidMove(RejectReason),
    #[error("match already closed")]
    MatchAlreadyClosed,
    #[error("participant could not be reached")]
    DeliveryFailed,
    #[error("result sink unavailable: {0}")]
    PersistenceFailed(String),
}

impl EngineError {
    /// Stable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::AlreadyQueued => "ALREADY_QUEUED",
            EngineError::AlreadyInMatch => "ALREADY_IN_MATCH",
            EngineError::NotInMatch => "NOT_IN_MATCH",
            EngineError::InvalidMove(_) => "INVALID_MOVE",
            EngineError::MatchAlreadyClosed => "MATCH_ALREADY_CLOSED",
            EngineError::DeliveryFailed => "DELIVERY_FAILED",
            EngineError::PersistenceFailed(_) => "PERSISTENCE_FAILED",
        }
    }
}

impl From<RejectReason> for EngineError {
    fn from(reason: RejectReason) -> Self {
        EngineError::InvalidMove(reason)
    }
}
