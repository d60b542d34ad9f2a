//! Participant identity from request query parameters.
//!
//! `player_id` (registered player, integer) or `guest_id` (UUID), plus an optional
//! url-encoded `name`. Authentication happens upstream; the engine trusts these.

use thiserror::Error;
use uuid::Uuid;

use crate::race::types::{ParticipantId, PlayerInfo};

const MAX_NAME_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("missing player_id or guest_id")]
    Missing,
    #[error("malformed player_id '{0}'")]
    MalformedPlayerId(String),
    #[error("malformed guest_id '{0}'")]
    MalformedGuestId(String),
    #[error("player_id and guest_id are mutually exclusive")]
    Conflicting,
}

impl IdentityError {
    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::Missing => "MISSING_IDENTITY",
            _ => "INVALID_IDENTITY",
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IdentityQuery {
    pub player_id: Option<u64>,
    pub guest_id: Option<Uuid>,
    pub name: Option<String>,
}

pub fn parse_query(query: &str) -> Result<IdentityQuery, IdentityError> {
    let mut parsed = IdentityQuery::default();
    for kv in query.split('&') {
        let mut split = kv.splitn(2, '=');
        match (split.next(), split.next()) {
            (Some("player_id"), Some(raw)) if !raw.is_empty() => {
                let id = raw.parse().map_err(|_| IdentityError::MalformedPlayerId(raw.to_string()))?;
                parsed.player_id = Some(id);
            }
            (Some("guest_id"), Some(raw)) if !raw.is_empty() => {
                let id = Uuid::parse_str(raw).map_err(|_| IdentityError::MalformedGuestId(raw.to_string()))?;
                parsed.guest_id = Some(id);
            }
            (Some("name"), Some(raw)) => {
                let name = urlencoding::decode(&raw.replace('+', " "))
                    .map(|n| n.trim().chars().take(MAX_NAME_LEN).collect::<String>())
                    .unwrap_or_default();
                if !name.is_empty() {
                    parsed.name = Some(name);
                }
            }
            _ => {}
        }
    }
    Ok(parsed)
}

fn default_name(id: &ParticipantId) -> String {
    match id {
        ParticipantId::Player(n) => format!("player-{n}"),
        ParticipantId::Guest(uuid) => format!("guest-{}", &uuid.simple().to_string()[..8]),
    }
}

fn build(id: ParticipantId, name: Option<String>) -> PlayerInfo {
    let display_name = name.unwrap_or_else(|| default_name(&id));
    PlayerInfo::new(id, display_name)
}

/// Identity for request/response calls, which must name the participant.
pub fn resolve_identity(query: &str) -> Result<PlayerInfo, IdentityError> {
    let parsed = parse_query(query)?;
    let id = match (parsed.player_id, parsed.guest_id) {
        (Some(_), Some(_)) => return Err(IdentityError::Conflicting),
        (Some(n), None) => ParticipantId::Player(n),
        (None, Some(uuid)) => ParticipantId::Guest(uuid),
        (None, None) => return Err(IdentityError::Missing),
    };
    Ok(build(id, parsed.name))
}

/// Identity for the live channel: anonymous connections get a fresh guest id.
pub fn resolve_or_guest(query: &str) -> Result<PlayerInfo, IdentityError> {
    match resolve_identity(query) {
        Err(IdentityError::Missing) => {
            let parsed = parse_query(query)?;
            Ok(build(ParticipantId::Guest(Uuid::new_v4()), parsed.name))
        }
        other => other,
    }
}
