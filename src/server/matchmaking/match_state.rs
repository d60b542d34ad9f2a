//! Match lifecycle: `proposed -> accepted -> active -> {completed | abandoned}`.
//!
//! `completed` and `abandoned` are terminal; every transition out of them fails
//! with `MatchAlreadyClosed` and leaves the match untouched.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineError;
use crate::race::course::Course;
use crate::race::result::ResultReason;
use crate::race::types::{MatchId, ParticipantId, PlayerInfo};
use crate::server::matchmaking::queue::QueueEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Proposed,
    Accepted,
    Active,
    Completed,
    Abandoned,
}

impl MatchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchPhase::Completed | MatchPhase::Abandoned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    Waiting { accepted: usize, required: usize },
    AllAccepted,
    AlreadyAccepted,
}

/// Fallout of a proposal that did not make it to the start line.
#[derive(Debug, Default)]
pub struct Abandoned {
    /// Participants who had accepted; they go back to the queue with their original priority.
    pub requeue: Vec<QueueEntry>,
    /// Participants who declined, dropped or never answered.
    pub released: Vec<ParticipantId>,
}

#[derive(Debug)]
struct Seat {
    entry: QueueEntry,
    accepted: bool,
}

#[derive(Debug)]
pub struct Match {
    id: MatchId,
    seats: Vec<Seat>,
    course: Arc<Course>,
    phase: MatchPhase,
    created_at: Instant,
    accept_deadline: Instant,
    closed_at: Option<Instant>,
}

impl Match {
    /// Bind a freshly paired group. Seat order is queue priority order.
    pub fn propose(entries: Vec<QueueEntry>, course: Arc<Course>, now: Instant, accept_timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            seats: entries.into_iter().map(|entry| Seat { entry, accepted: false }).collect(),
            course,
            phase: MatchPhase::Proposed,
            created_at: now,
            accept_deadline: now + accept_timeout,
            closed_at: None,
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn course(&self) -> &Arc<Course> {
        &self.course
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn closed_at(&self) -> Option<Instant> {
        self.closed_at
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn players(&self) -> Vec<PlayerInfo> {
        self.seats.iter().map(|s| s.entry.player.clone()).collect()
    }

    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.seats.iter().map(|s| s.entry.id().clone()).collect()
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.seats.iter().any(|s| s.entry.id() == participant)
    }

    pub fn accept_deadline(&self) -> Instant {
        self.accept_deadline
    }

    pub fn accept(&mut self, participant: &ParticipantId) -> Result<Acceptance, EngineError> {
        self.check_open(participant)?;
        if self.phase != MatchPhase::Proposed {
            return Ok(Acceptance::AlreadyAccepted);
        }
        let Some(seat) = self.seats.iter_mut().find(|s| s.entry.id() == participant) else {
            return Err(EngineError::NotInMatch);
        };
        if seat.accepted {
            return Ok(Acceptance::AlreadyAccepted);
        }
        seat.accepted = true;

        let accepted = self.seats.iter().filter(|s| s.accepted).count();
        if accepted == self.seats.len() {
            self.phase = MatchPhase::Accepted;
            Ok(Acceptance::AllAccepted)
        } else {
            Ok(Acceptance::Waiting { accepted, required: self.seats.len() })
        }
    }

    /// Explicit refusal, or a disconnect while the proposal is open.
    pub fn decline(&mut self, participant: &ParticipantId, now: Instant) -> Result<Abandoned, EngineError> {
        self.check_open(participant)?;
        if self.phase != MatchPhase::Proposed {
            return Err(EngineError::AlreadyInMatch);
        }
        Ok(self.abandon_proposal(Some(participant), now))
    }

    /// Acceptance timer expiry. Returns `None` while the proposal is still valid.
    pub fn expire_proposal(&mut self, now: Instant) -> Option<Abandoned> {
        if self.phase != MatchPhase::Proposed || now < self.accept_deadline {
            return None;
        }
        Some(self.abandon_proposal(None, now))
    }

    /// The race state exists; play may begin.
    pub fn start(&mut self) -> Result<(), EngineError> {
        match self.phase {
            MatchPhase::Accepted => {
                self.phase = MatchPhase::Active;
                Ok(())
            }
            phase if phase.is_terminal() => Err(EngineError::MatchAlreadyClosed),
            _ => Err(EngineError::NotInMatch),
        }
    }

    /// Terminal transition of an active match.
    pub fn conclude(&mut self, reason: &ResultReason, now: Instant) -> Result<MatchPhase, EngineError> {
        if self.is_terminal() {
            return Err(EngineError::MatchAlreadyClosed);
        }
        if self.phase != MatchPhase::Active {
            return Err(EngineError::NotInMatch);
        }
        self.phase = match reason {
            ResultReason::Finished => MatchPhase::Completed,
            ResultReason::Forfeit { .. } => MatchPhase::Abandoned,
        };
        self.closed_at = Some(now);
        Ok(self.phase)
    }

    fn check_open(&self, participant: &ParticipantId) -> Result<(), EngineError> {
        if self.is_terminal() {
            return Err(EngineError::MatchAlreadyClosed);
        }
        if !self.contains(participant) {
            return Err(EngineError::NotInMatch);
        }
        Ok(())
    }

    fn abandon_proposal(&mut self, decliner: Option<&ParticipantId>, now: Instant) -> Abandoned {
        self.phase = MatchPhase::Abandoned;
        self.closed_at = Some(now);
        let mut outcome = Abandoned::default();
        for seat in &self.seats {
            if seat.accepted && Some(seat.entry.id()) != decliner {
                outcome.requeue.push(seat.entry.clone());
            } else {
                outcome.released.push(seat.entry.id().clone());
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::matchmaking::queue::{MatchQueue, PairingPolicy};

    fn proposed(now: Instant) -> Match {
        let mut queue = MatchQueue::new();
        queue.join(PlayerInfo::new(ParticipantId::Player(1), "a"), None, now).unwrap();
        queue.join(PlayerInfo::new(ParticipantId::Player(2), "b"), None, now).unwrap();
        let policy = PairingPolicy { group_size: 2, rating_window: None, relax_after: Duration::from_secs(1) };
        let group = queue.pair(now, &policy).unwrap();
        Match::propose(group, Arc::new(Course::typing("t", "T", "x")), now, Duration::from_secs(10))
    }

    const A: ParticipantId = ParticipantId::Player(1);
    const B: ParticipantId = ParticipantId::Player(2);

    #[test]
    fn test_all_accept_then_start() {
        let now = Instant::now();
        let mut m = proposed(now);
        assert_eq!(m.accept(&A), Ok(Acceptance::Waiting { accepted: 1, required: 2 }));
        assert_eq!(m.accept(&A), Ok(Acceptance::AlreadyAccepted));
        assert_eq!(m.start(), Err(EngineError::NotInMatch));
        assert_eq!(m.accept(&B), Ok(Acceptance::AllAccepted));
        assert_eq!(m.phase(), MatchPhase::Accepted);
        m.start().unwrap();
        assert_eq!(m.phase(), MatchPhase::Active);
    }

    #[test]
    fn test_decline_requeues_only_acceptors() {
        let now = Instant::now();
        let mut m = proposed(now);
        m.accept(&A).unwrap();
        let abandoned = m.decline(&B, now).unwrap();
        assert_eq!(abandoned.requeue.len(), 1);
        assert_eq!(abandoned.requeue[0].id(), &A);
        assert_eq!(abandoned.released, vec![B]);
        assert_eq!(m.phase(), MatchPhase::Abandoned);
    }

    #[test]
    fn test_decline_after_abandoned_changes_nothing() {
        let now = Instant::now();
        let mut m = proposed(now);
        m.decline(&B, now).unwrap();
        let closed_at = m.closed_at();
        assert_eq!(m.decline(&B, now).unwrap_err(), EngineError::MatchAlreadyClosed);
        assert_eq!(m.decline(&A, now).unwrap_err(), EngineError::MatchAlreadyClosed);
        assert_eq!(m.phase(), MatchPhase::Abandoned);
        assert_eq!(m.closed_at(), closed_at);
    }

    #[test]
    fn test_expiry_only_after_deadline() {
        let now = Instant::now();
        let mut m = proposed(now);
        m.accept(&B).unwrap();
        assert!(m.expire_proposal(now + Duration::from_secs(5)).is_none());
        let abandoned = m.expire_proposal(now + Duration::from_secs(10)).unwrap();
        assert_eq!(abandoned.requeue[0].id(), &B);
        assert_eq!(abandoned.released, vec![A]);
        assert!(m.expire_proposal(now + Duration::from_secs(20)).is_none());
    }

    #[test]
    fn test_conclude_is_terminal() {
        let now = Instant::now();
        let mut m = proposed(now);
        m.accept(&A).unwrap();
        m.accept(&B).unwrap();
        m.start().unwrap();
        assert_eq!(m.conclude(&ResultReason::Finished, now), Ok(MatchPhase::Completed));
        assert_eq!(
            m.conclude(&ResultReason::Forfeit { absent: A }, now),
            Err(EngineError::MatchAlreadyClosed)
        );
        assert_eq!(m.accept(&A), Err(EngineError::MatchAlreadyClosed));
        assert_eq!(m.phase(), MatchPhase::Completed);
    }

    #[test]
    fn test_forfeit_abandons() {
        let now = Instant::now();
        let mut m = proposed(now);
        m.accept(&A).unwrap();
        m.accept(&B).unwrap();
        m.start().unwrap();
        assert_eq!(m.conclude(&ResultReason::Forfeit { absent: B }, now), Ok(MatchPhase::Abandoned));
    }

    #[test]
    fn test_outsider_is_not_in_match() {
        let mut m = proposed(Instant::now());
        assert_eq!(m.accept(&ParticipantId::Player(9)), Err(EngineError::NotInMatch));
    }
}
