use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a match.
pub type MatchId = Uuid;

/// Stable participant identity: a registered player or an ephemeral guest session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantId {
    Player(u64),
    Guest(Uuid),
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantId::Player(id) => write!(f, "player:{}", id),
            ParticipantId::Guest(id) => write!(f, "guest:{}", id),
        }
    }
}

/// Public view of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: ParticipantId,
    pub display_name: String,
}

impl PlayerInfo {
    pub fn new(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self { id, display_name: display_name.into() }
    }
}

/// Cursor position inside a course. Typing courses only use `col`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub line: usize,
    pub col: usize,
}

impl Cursor {
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Editor motions accepted on motion courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    Left,
    Right,
    Up,
    Down,
    WordForward,
    WordBackward,
    LineStart,
    LineEnd,
    BufferTop,
    BufferBottom,
}

/// A single client move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Move {
    Motion(Motion),
    Key(char),
}
