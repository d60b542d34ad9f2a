//! Wire protocol of the live channel.
//!
//! Both directions are JSON objects tagged as `{"action": "...", "data": ...}`.

use actix::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, RejectReason};
use crate::race::course::Course;
use crate::race::result::MatchResult;
use crate::race::state::{RaceSnapshot, StateDelta};
use crate::race::types::{Cursor, MatchId, Move, PlayerInfo};

/// Client -> server.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum ClientWsMessage {
    JoinQueue {
        #[serde(default)]
        hint: Option<u32>,
    },
    LeaveQueue,
    QueueStatus,
    AcceptMatch,
    DeclineMatch,
    SubmitMove {
        #[serde(default)]
        match_id: Option<MatchId>,
        command: Move,
    },
    Ping,
}

/// Queue standing as reported to clients.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct QueueStatusView {
    pub queued: bool,
    pub position: Option<usize>,
    pub estimated_wait_secs: Option<u64>,
}

impl QueueStatusView {
    pub fn not_queued() -> Self {
        Self { queued: false, position: None, estimated_wait_secs: None }
    }
}

/// Server -> client.
#[derive(Message, Serialize, Clone, Debug)]
#[rtype(result = "()")]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum ServerWsMessage {
    MatchProposed {
        match_id: MatchId,
        course: Course,
        participants: Vec<PlayerInfo>,
        accept_within_secs: u64,
    },
    MatchStart {
        match_id: MatchId,
        course: Course,
        participants: Vec<PlayerInfo>,
    },
    StateDelta(StateDelta),
    MatchResult {
        match_id: MatchId,
        outcome: MatchResult,
    },
    /// A proposal fell through before the race started.
    MatchAbandoned {
        match_id: MatchId,
        reason: String,
    },
    MatchSnapshot(RaceSnapshot),
    QueueStatus(QueueStatusView),
    QueueExpired,
    RejectedMove {
        match_id: MatchId,
        reason: RejectReason,
        message: String,
        cursor: Cursor,
        move_count: u32,
    },
    Error {
        code: String,
        message: String,
    },
    SessionReplaced,
    IdleTimeout,
}

impl ServerWsMessage {
    pub fn error(err: &EngineError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    /// Wire action name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MatchProposed { .. } => "match_proposed",
            Self::MatchStart { .. } => "match_start",
            Self::StateDelta(_) => "state_delta",
            Self::MatchResult { .. } => "match_result",
            Self::MatchAbandoned { .. } => "match_abandoned",
            Self::MatchSnapshot(_) => "match_snapshot",
            Self::QueueStatus(_) => "queue_status",
            Self::QueueExpired => "queue_expired",
            Self::RejectedMove { .. } => "rejected_move",
            Self::Error { .. } => "error",
            Self::SessionReplaced => "session_replaced",
            Self::IdleTimeout => "idle_timeout",
        }
    }

    /// Messages after which the channel is closed by the server.
    pub fn closes_channel(&self) -> bool {
        matches!(self, Self::SessionReplaced | Self::IdleTimeout)
    }
}
