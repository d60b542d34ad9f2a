//! Durable match outcome handed to the persistence and statistics collaborators.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::race::types::{Cursor, MatchId, ParticipantId};

/// How the match ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultReason {
    /// A participant reached the completion predicate.
    Finished,
    /// A participant stayed disconnected past the grace period.
    Forfeit { absent: ParticipantId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Finished {
        time_ms: u64,
    },
    /// Still racing when the match resolved; best progress at interrupt.
    Interrupted {
        cursor: Cursor,
        move_count: u32,
        elapsed_ms: u64,
        remaining: u32,
    },
    Forfeited {
        cursor: Cursor,
        move_count: u32,
        elapsed_ms: u64,
        remaining: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantOutcome {
    pub participant: ParticipantId,
    pub display_name: String,
    /// 1 is the winner.
    pub rank: u32,
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: MatchId,
    pub course_id: String,
    pub reason: ResultReason,
    /// Unix time in milliseconds.
    pub created_at: u64,
    pub outcomes: Vec<ParticipantOutcome>,
}

impl MatchResult {
    pub fn winner(&self) -> Option<&ParticipantOutcome> {
        self.outcomes.iter().find(|o| o.rank == 1)
    }

    pub fn outcome_of(&self, participant: &ParticipantId) -> Option<&ParticipantOutcome> {
        self.outcomes.iter().find(|o| &o.participant == participant)
    }
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
