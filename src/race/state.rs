//! Authoritative race state of one active match.
//!
//! Progress only moves forward: a legal move always increments the move count,
//! elapsed time never decreases, and the completion flag is set at most once.
//! Illegal moves leave the state untouched.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, RejectReason};
use crate::race::course::Course;
use crate::race::result::{unix_millis, MatchResult, OutcomeStatus, ParticipantOutcome, ResultReason};
use crate::race::types::{Cursor, MatchId, Move, ParticipantId, PlayerInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub participant: ParticipantId,
    pub display_name: String,
    pub cursor: Cursor,
    pub move_count: u32,
    /// Time of the latest legal move relative to the race start.
    pub elapsed_ms: u64,
    pub completed: bool,
}

/// Change produced by one legal move, broadcast to the other racers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    pub match_id: MatchId,
    pub participant_id: ParticipantId,
    pub cursor: Cursor,
    pub move_count: u32,
    pub elapsed_ms: u64,
    pub completed: bool,
}

/// Full read-only copy of a race, used for reconnects and the HTTP view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub match_id: MatchId,
    pub course: Course,
    pub progress: Vec<Progress>,
    pub finish_order: Vec<ParticipantId>,
    pub concluded: bool,
}

#[derive(Debug)]
pub struct RaceState {
    match_id: MatchId,
    course: Arc<Course>,
    started_at: Instant,
    progress: Vec<Progress>,
    finish_order: Vec<ParticipantId>,
    concluded: bool,
}

impl RaceState {
    pub fn new(match_id: MatchId, course: Arc<Course>, participants: &[PlayerInfo], started_at: Instant) -> Self {
        let start = course.start_cursor();
        let progress = participants
            .iter()
            .map(|p| Progress {
                participant: p.id.clone(),
                display_name: p.display_name.clone(),
                cursor: start,
                move_count: 0,
                elapsed_ms: 0,
                completed: false,
            })
            .collect();
        Self {
            match_id,
            course,
            started_at,
            progress,
            finish_order: Vec::new(),
            concluded: false,
        }
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn is_concluded(&self) -> bool {
        self.concluded
    }

    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> {
        self.progress.iter().map(|p| &p.participant)
    }

    pub fn progress_of(&self, participant: &ParticipantId) -> Option<&Progress> {
        self.progress.iter().find(|p| &p.participant == participant)
    }

    /// First participant to complete, in server receipt order.
    pub fn winner(&self) -> Option<&ParticipantId> {
        self.finish_order.first()
    }

    /// Validate and apply one move from `participant`, received at `now`.
    pub fn apply_move(&mut self, participant: &ParticipantId, mv: Move, now: Instant) -> Result<StateDelta, EngineError> {
        if self.concluded {
            return Err(EngineError::MatchAlreadyClosed);
        }
        let course = Arc::clone(&self.course);
        let elapsed = now.saturating_duration_since(self.started_at).as_millis() as u64;
        let progress = self
            .progress
            .iter_mut()
            .find(|p| &p.participant == participant)
            .ok_or(EngineError::NotInMatch)?;
        if progress.completed {
            return Err(RejectReason::AlreadyFinished.into());
        }

        let next = course.step(progress.cursor, mv)?;
        progress.cursor = next;
        progress.move_count += 1;
        progress.elapsed_ms = progress.elapsed_ms.max(elapsed);
        if course.is_complete(next) {
            progress.completed = true;
            self.finish_order.push(participant.clone());
        }

        Ok(StateDelta {
            match_id: self.match_id,
            participant_id: progress.participant.clone(),
            cursor: progress.cursor,
            move_count: progress.move_count,
            elapsed_ms: progress.elapsed_ms,
            completed: progress.completed,
        })
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            match_id: self.match_id,
            course: (*self.course).clone(),
            progress: self.progress.clone(),
            finish_order: self.finish_order.clone(),
            concluded: self.concluded,
        }
    }

    /// Resolve the race as soon as someone finished. Returns `None` if nobody
    /// finished yet or the race was already resolved.
    pub fn conclude_finished(&mut self) -> Option<MatchResult> {
        if self.concluded || self.finish_order.is_empty() {
            return None;
        }
        self.concluded = true;
        let outcomes = self.rank(None);
        Some(self.result(ResultReason::Finished, outcomes))
    }

    /// Resolve the race against `absent`, who failed to come back in time.
    pub fn conclude_forfeit(&mut self, absent: &ParticipantId) -> Option<MatchResult> {
        if self.concluded || self.progress_of(absent).is_none() {
            return None;
        }
        self.concluded = true;
        let outcomes = self.rank(Some(absent));
        Some(self.result(ResultReason::Forfeit { absent: absent.clone() }, outcomes))
    }

    /// Finishers in receipt order, then unfinished racers by distance left,
    /// then the forfeiting participant.
    fn rank(&self, absent: Option<&ParticipantId>) -> Vec<ParticipantOutcome> {
        let mut ordered: Vec<&Progress> = self
            .finish_order
            .iter()
            .filter(|id| Some(*id) != absent)
            .filter_map(|id| self.progress_of(id))
            .collect();

        let mut racing: Vec<&Progress> = self
            .progress
            .iter()
            .filter(|p| !p.completed && Some(&p.participant) != absent)
            .collect();
        racing.sort_by_key(|p| (self.course.remaining(p.cursor), p.elapsed_ms));
        ordered.extend(racing);

        let mut outcomes: Vec<ParticipantOutcome> = ordered
            .into_iter()
            .enumerate()
            .map(|(idx, p)| {
                let status = if p.completed {
                    OutcomeStatus::Finished { time_ms: p.elapsed_ms }
                } else {
                    OutcomeStatus::Interrupted {
                        cursor: p.cursor,
                        move_count: p.move_count,
                        elapsed_ms: p.elapsed_ms,
                        remaining: self.course.remaining(p.cursor),
                    }
                };
                ParticipantOutcome {
                    participant: p.participant.clone(),
                    display_name: p.display_name.clone(),
                    rank: idx as u32 + 1,
                    status,
                }
            })
            .collect();

        if let Some(p) = absent.and_then(|id| self.progress_of(id)) {
            outcomes.push(ParticipantOutcome {
                participant: p.participant.clone(),
                display_name: p.display_name.clone(),
                rank: outcomes.len() as u32 + 1,
                status: OutcomeStatus::Forfeited {
                    cursor: p.cursor,
                    move_count: p.move_count,
                    elapsed_ms: p.elapsed_ms,
                    remaining: self.course.remaining(p.cursor),
                },
            });
        }
        outcomes
    }

    fn result(&self, reason: ResultReason, outcomes: Vec<ParticipantOutcome>) -> MatchResult {
        MatchResult {
            match_id: self.match_id,
            course_id: self.course.id.clone(),
            reason,
            created_at: unix_millis(),
            outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::race::types::Motion;

    fn alice() -> PlayerInfo {
        PlayerInfo::new(ParticipantId::Player(1), "alice")
    }

    fn bob() -> PlayerInfo {
        PlayerInfo::new(ParticipantId::Player(2), "bob")
    }

    fn typing_race(text: &str, start: Instant) -> RaceState {
        RaceState::new(Uuid::new_v4(), Arc::new(Course::typing("t", "T", text)), &[alice(), bob()], start)
    }

    fn motion_race(start: Instant) -> RaceState {
        let course = Course::motion("m", "M", &["abc def", "ghi"], Cursor::new(0, 0), Cursor::new(1, 2));
        RaceState::new(Uuid::new_v4(), Arc::new(course), &[alice(), bob()], start)
    }

    #[test]
    fn test_cursor_is_fold_over_legal_prefix() {
        let start = Instant::now();
        let mut race = motion_race(start);
        let moves = [
            Move::Motion(Motion::WordForward),
            Move::Motion(Motion::Down),
            Move::Motion(Motion::Down), // course already completed by now
            Move::Motion(Motion::Right),
        ];

        let course = race.course().clone();
        let mut expected = course.start_cursor();
        let mut legal = 0;
        for (i, mv) in moves.iter().enumerate() {
            let before = race.progress_of(&alice().id).cloned().unwrap();
            match race.apply_move(&alice().id, *mv, start + Duration::from_millis(i as u64 * 10)) {
                Ok(_) => {
                    expected = course.step(expected, *mv).unwrap();
                    legal += 1;
                }
                Err(EngineError::InvalidMove(_)) => {
                    assert_eq!(race.progress_of(&alice().id), Some(&before));
                    break;
                }
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        let progress = race.progress_of(&alice().id).unwrap();
        assert_eq!(progress.cursor, expected);
        assert_eq!(progress.cursor, Cursor::new(1, 2));
        assert_eq!(progress.move_count, legal);
        assert_eq!(legal, 2);
    }

    #[test]
    fn test_illegal_move_does_not_mutate() {
        let start = Instant::now();
        let mut race = typing_race("hey", start);
        race.apply_move(&alice().id, Move::Key('h'), start).unwrap();
        let before = race.snapshot();
        let err = race.apply_move(&alice().id, Move::Key('x'), start + Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, EngineError::InvalidMove(RejectReason::UnexpectedKey { expected: 'e', got: 'x' }));
        assert_eq!(race.snapshot(), before);
    }

    #[test]
    fn test_elapsed_never_rewinds() {
        let start = Instant::now();
        let mut race = typing_race("abc", start);
        race.apply_move(&alice().id, Move::Key('a'), start + Duration::from_millis(500)).unwrap();
        // A receipt instant earlier than the previous one must not rewind time.
        let delta = race.apply_move(&alice().id, Move::Key('b'), start + Duration::from_millis(100)).unwrap();
        assert_eq!(delta.elapsed_ms, 500);
        assert_eq!(delta.move_count, 2);
    }

    #[test]
    fn test_completion_is_set_once_and_is_irreversible() {
        let start = Instant::now();
        let mut race = typing_race("a", start);
        let delta = race.apply_move(&alice().id, Move::Key('a'), start + Duration::from_millis(40)).unwrap();
        assert!(delta.completed);
        assert_eq!(race.winner(), Some(&alice().id));
        let err = race.apply_move(&alice().id, Move::Key('a'), start).unwrap_err();
        assert_eq!(err, EngineError::InvalidMove(RejectReason::AlreadyFinished));
        assert!(race.progress_of(&alice().id).unwrap().completed);
    }

    #[test]
    fn test_unknown_participant_is_not_in_match() {
        let start = Instant::now();
        let mut race = typing_race("a", start);
        let stranger = ParticipantId::Guest(Uuid::new_v4());
        assert_eq!(race.apply_move(&stranger, Move::Key('a'), start), Err(EngineError::NotInMatch));
    }

    #[test]
    fn test_snapshot_matches_replay() {
        let start = Instant::now();
        let script = [
            (alice().id, Move::Key('g'), 10),
            (bob().id, Move::Key('g'), 15),
            (alice().id, Move::Key('x'), 20),
            (alice().id, Move::Key('o'), 30),
        ];
        let mut live = typing_race("go!", start);
        let mut accepted = vec![];
        for (who, mv, at) in &script {
            if live.apply_move(who, *mv, start + Duration::from_millis(*at)).is_ok() {
                accepted.push((who.clone(), *mv, *at));
            }
        }
        let snapshot = live.snapshot();

        let mut replay = RaceState::new(snapshot.match_id, Arc::new(snapshot.course.clone()), &[alice(), bob()], start);
        for (who, mv, at) in &accepted {
            replay.apply_move(who, *mv, start + Duration::from_millis(*at)).unwrap();
        }
        assert_eq!(replay.snapshot(), snapshot);
        assert_eq!(accepted.len(), 3);
    }

    #[test]
    fn test_finished_result_records_loser_progress() {
        let start = Instant::now();
        let mut race = typing_race("ab", start);
        race.apply_move(&bob().id, Move::Key('a'), start + Duration::from_millis(5)).unwrap();
        race.apply_move(&alice().id, Move::Key('a'), start + Duration::from_millis(10)).unwrap();
        race.apply_move(&alice().id, Move::Key('b'), start + Duration::from_millis(20)).unwrap();

        let result = race.conclude_finished().unwrap();
        assert_eq!(result.reason, ResultReason::Finished);
        assert_eq!(result.winner().unwrap().participant, alice().id);
        assert_eq!(result.winner().unwrap().status, OutcomeStatus::Finished { time_ms: 20 });
        let loser = result.outcome_of(&bob().id).unwrap();
        assert_eq!(loser.rank, 2);
        assert_eq!(
            loser.status,
            OutcomeStatus::Interrupted { cursor: Cursor::new(0, 1), move_count: 1, elapsed_ms: 5, remaining: 1 }
        );

        assert!(race.conclude_finished().is_none());
        assert_eq!(
            race.apply_move(&bob().id, Move::Key('b'), start + Duration::from_millis(30)),
            Err(EngineError::MatchAlreadyClosed)
        );
    }

    #[test]
    fn test_conclude_requires_a_finisher() {
        let mut race = typing_race("ab", Instant::now());
        assert!(race.conclude_finished().is_none());
        assert!(!race.is_concluded());
    }

    #[test]
    fn test_forfeit_ranks_absent_last() {
        let start = Instant::now();
        let mut race = typing_race("abc", start);
        race.apply_move(&alice().id, Move::Key('a'), start + Duration::from_millis(5)).unwrap();
        race.apply_move(&alice().id, Move::Key('b'), start + Duration::from_millis(6)).unwrap();

        let result = race.conclude_forfeit(&alice().id).unwrap();
        assert_eq!(result.reason, ResultReason::Forfeit { absent: alice().id });
        assert_eq!(result.winner().unwrap().participant, bob().id);
        let absent = result.outcome_of(&alice().id).unwrap();
        assert_eq!(absent.rank, 2);
        assert!(matches!(absent.status, OutcomeStatus::Forfeited { move_count: 2, remaining: 1, .. }));
        assert!(race.conclude_forfeit(&bob().id).is_none());
    }
}
