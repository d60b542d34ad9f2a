//! In-memory leaderboard fed by concluded matches.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::race::result::{MatchResult, OutcomeStatus};
use crate::race::types::ParticipantId;
use crate::server::results::StatsSink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub participant: ParticipantId,
    pub display_name: String,
    pub wins: u32,
    pub losses: u32,
    pub forfeits: u32,
    /// Fastest completion, in milliseconds.
    pub best_time_ms: Option<u64>,
}

impl LeaderboardEntry {
    fn new(participant: ParticipantId, display_name: String) -> Self {
        Self {
            participant,
            display_name,
            wins: 0,
            losses: 0,
            forfeits: 0,
            best_time_ms: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Leaderboard {
    entries: Mutex<HashMap<ParticipantId, LeaderboardEntry>>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ParticipantId, LeaderboardEntry>> {
        // A panicking writer cannot leave a half-updated counter behind, so keep serving.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Best players first: most wins, then fastest time, then name.
    pub fn top(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut rows: Vec<LeaderboardEntry> = self.entries().values().cloned().collect();
        rows.sort_by(|a, b| {
            b.wins
                .cmp(&a.wins)
                .then_with(|| a.best_time_ms.unwrap_or(u64::MAX).cmp(&b.best_time_ms.unwrap_or(u64::MAX)))
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        rows.truncate(limit);
        rows
    }

    pub fn get(&self, participant: &ParticipantId) -> Option<LeaderboardEntry> {
        self.entries().get(participant).cloned()
    }
}

impl StatsSink for Leaderboard {
    fn record(&self, result: &MatchResult) {
        let mut entries = self.entries();
        for outcome in &result.outcomes {
            let entry = entries
                .entry(outcome.participant.clone())
                .or_insert_with(|| LeaderboardEntry::new(outcome.participant.clone(), outcome.display_name.clone()));
            entry.display_name = outcome.display_name.clone();
            match &outcome.status {
                OutcomeStatus::Forfeited { .. } => entry.forfeits += 1,
                _ if outcome.rank == 1 => entry.wins += 1,
                _ => entry.losses += 1,
            }
            if let OutcomeStatus::Finished { time_ms } = outcome.status {
                entry.best_time_ms = Some(entry.best_time_ms.map_or(time_ms, |best| best.min(time_ms)));
            }
        }
    }
}
