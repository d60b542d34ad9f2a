use std::time::{Duration, Instant};
use log::warn;

use crate::config::anti_spam::{BAN_DURATION_SECONDS, MAX_REQUESTS_PER_SECOND};

/// Flood protection for a single live channel.
pub struct AntiSpamState {
    max_requests_per_second: u32,
    ban_duration: Duration,
    // Last error code sent (for suppression)
    last_error_code: Option<String>,
    // Start of the current one-second window
    last_tick: Instant,
    requests_this_tick: u32,
    banned_until: Option<Instant>,
}

impl Default for AntiSpamState {
    fn default() -> Self {
        Self::new()
    }
}

impl AntiSpamState {
    pub fn new() -> Self {
        Self::with_limits(MAX_REQUESTS_PER_SECOND, Duration::from_secs(BAN_DURATION_SECONDS))
    }

    pub fn with_limits(max_requests_per_second: u32, ban_duration: Duration) -> Self {
        Self {
            max_requests_per_second,
            ban_duration,
            last_error_code: None,
            last_tick: Instant::now(),
            requests_this_tick: 0,
            banned_until: None,
        }
    }

    /// Call for every inbound request. Returns true if the channel is banned.
    pub fn record_request(&mut self, who: &str) -> bool {
        self.tick();
        self.requests_this_tick += 1;
        if self.requests_this_tick > self.max_requests_per_second && !self.is_banned() {
            self.ban(who, "too many requests per second");
        }
        self.is_banned()
    }

    /// Returns true if the error should be sent, false if it repeats the previous one.
    pub fn should_send_error(&mut self, error_code: &str, who: &str) -> bool {
        if self.last_error_code.as_deref() == Some(error_code) {
            warn!("[AntiSpam] Suppressed duplicate error '{}' for {}", error_code, who);
            return false;
        }
        self.last_error_code = Some(error_code.to_string());
        true
    }

    /// Any non-error frame re-arms error reporting.
    pub fn reset_error_suppression(&mut self) {
        self.last_error_code = None;
    }

    pub fn is_banned(&self) -> bool {
        self.banned_until.is_some_and(|until| Instant::now() < until)
    }

    pub fn ban_remaining_secs(&self) -> u64 {
        self.banned_until
            .map(|until| until.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0)
    }

    fn ban(&mut self, who: &str, reason: &str) {
        let until = Instant::now() + self.ban_duration;
        self.banned_until = Some(until);
        warn!("[AntiSpam] Banned {} for {:?}: {}", who, self.ban_duration, reason);
    }

    /// Reset per-second counters if a new second has started.
    fn tick(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_secs(1) {
            self.last_tick = now;
            self.requests_this_tick = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ban_after_burst() {
        let mut guard = AntiSpamState::with_limits(3, Duration::from_secs(30));
        for _ in 0..3 {
            assert!(!guard.record_request("player:1"));
        }
        assert!(guard.record_request("player:1"));
        assert!(guard.is_banned());
        assert!(guard.ban_remaining_secs() > 0);
    }

    #[test]
    fn test_duplicate_errors_are_suppressed() {
        let mut guard = AntiSpamState::new();
        assert!(guard.should_send_error("INVALID_MOVE", "player:1"));
        assert!(!guard.should_send_error("INVALID_MOVE", "player:1"));
        assert!(guard.should_send_error("NOT_IN_MATCH", "player:1"));
        guard.reset_error_suppression();
        assert!(guard.should_send_error("NOT_IN_MATCH", "player:1"));
    }

    #[test]
    fn test_not_banned_by_default() {
        let guard = AntiSpamState::new();
        assert!(!guard.is_banned());
        assert_eq!(guard.ban_remaining_secs(), 0);
    }
}
