//! Matchmaking pool.
//!
//! Entries are kept in wait order (insertion sequence), so pairing always takes the
//! longest-waiting compatible entries and ties fall back to insertion order.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::EngineError;
use crate::race::types::{ParticipantId, PlayerInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Waiting,
    Matched,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub player: PlayerInfo,
    pub hint: Option<u32>,
    pub enqueued_at: Instant,
    pub status: EntryStatus,
    /// Insertion order; kept when an entry is put back after an abandoned proposal.
    seq: u64,
}

impl QueueEntry {
    pub fn id(&self) -> &ParticipantId {
        &self.player.id
    }

    pub fn waited(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }
}

#[derive(Debug, Clone)]
pub struct PairingPolicy {
    pub group_size: usize,
    pub rating_window: Option<u32>,
    pub relax_after: Duration,
}

/// Where a participant stands in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePosition {
    /// 1-based.
    pub position: usize,
    pub estimated_wait: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct MatchQueue {
    entries: VecDeque<QueueEntry>,
    next_seq: u64,
    /// Moving average of the wait observed at pairing time.
    avg_wait: Option<Duration>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.entries.iter().any(|e| e.id() == id)
    }

    pub fn join(&mut self, player: PlayerInfo, hint: Option<u32>, now: Instant) -> Result<(), EngineError> {
        if self.contains(&player.id) {
            return Err(EngineError::AlreadyQueued);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(QueueEntry {
            player,
            hint,
            enqueued_at: now,
            status: EntryStatus::Waiting,
            seq,
        });
        Ok(())
    }

    /// Remove a waiting entry. Absent participants are not an error.
    pub fn leave(&mut self, id: &ParticipantId) -> Option<QueueEntry> {
        let idx = self.entries.iter().position(|e| e.id() == id)?;
        let mut entry = self.entries.remove(idx)?;
        entry.status = EntryStatus::Cancelled;
        Some(entry)
    }

    /// Put an entry back at the place its original wait earns it.
    pub fn requeue(&mut self, mut entry: QueueEntry) {
        if self.contains(entry.id()) {
            return;
        }
        entry.status = EntryStatus::Waiting;
        let idx = self.entries.iter().position(|e| e.seq > entry.seq).unwrap_or(self.entries.len());
        self.entries.insert(idx, entry);
    }

    pub fn status(&self, id: &ParticipantId, now: Instant, group_size: usize) -> Option<QueuePosition> {
        let idx = self.entries.iter().position(|e| e.id() == id)?;
        let waited = self.entries[idx].waited(now);
        let groups_ahead = (idx / group_size.max(1)) as u32;
        let estimated_wait = self.avg_wait.map(|avg| (avg * (groups_ahead + 1)).saturating_sub(waited));
        Some(QueuePosition { position: idx + 1, estimated_wait })
    }

    /// Take the next full group, if any, in FIFO order.
    pub fn pair(&mut self, now: Instant, policy: &PairingPolicy) -> Option<Vec<QueueEntry>> {
        let size = policy.group_size.max(2);
        if self.entries.len() < size {
            return None;
        }
        for head in 0..self.entries.len() {
            let mut picked = vec![head];
            for other in head + 1..self.entries.len() {
                if picked.len() == size {
                    break;
                }
                if compatible(&self.entries[head], &self.entries[other], now, policy) {
                    picked.push(other);
                }
            }
            if picked.len() < size {
                continue;
            }
            let mut group: Vec<QueueEntry> = picked
                .iter()
                .rev()
                .filter_map(|&idx| self.entries.remove(idx))
                .collect();
            group.reverse();
            for entry in &mut group {
                entry.status = EntryStatus::Matched;
                self.record_wait(entry.waited(now));
            }
            debug!(
                "[Matchmaking] Paired {:?}",
                group.iter().map(|e| e.id().to_string()).collect::<Vec<_>>()
            );
            return Some(group);
        }
        None
    }

    /// Drop entries that waited longer than `max_wait`.
    pub fn expire(&mut self, now: Instant, max_wait: Duration) -> Vec<QueueEntry> {
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|e| e.waited(now) > max_wait);
        self.entries = kept.into();
        expired
            .into_iter()
            .map(|mut e| {
                e.status = EntryStatus::Expired;
                e
            })
            .collect()
    }

    fn record_wait(&mut self, sample: Duration) {
        self.avg_wait = Some(match self.avg_wait {
            Some(avg) => (avg * 3 + sample) / 4,
            None => sample,
        });
    }
}

fn compatible(head: &QueueEntry, other: &QueueEntry, now: Instant, policy: &PairingPolicy) -> bool {
    let Some(window) = policy.rating_window else {
        return true;
    };
    if head.waited(now) >= policy.relax_after {
        return true;
    }
    match (head.hint, other.hint) {
        (Some(a), Some(b)) => a.abs_diff(b) <= window,
        _ => true,
    }
}
