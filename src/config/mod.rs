/// Main configuration module.
///
/// Tunables live as constants in the submodules; `EngineConfig` and
/// `ServerConfig` gather them so tests can build isolated instances with short timers.
pub mod anti_spam;
pub mod matchmaking;
pub mod race;

use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

/// Engine-wide tunables shared by the matchmaking server, supervisor and reaper.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of participants bound into one match.
    pub group_size: usize,
    /// Interval of the periodic pairing pass.
    pub pairing_tick: Duration,
    /// How long a proposed match waits for every acceptance.
    pub accept_timeout: Duration,
    /// Maximum time an entry may sit in the queue before the reaper drops it.
    pub max_queue_wait: Duration,
    /// Maximum rating distance inside a group, `None` for pure FIFO.
    pub rating_window: Option<u32>,
    /// Wait after which the rating window is ignored for the group head.
    pub relax_rating_after: Duration,
    /// Grace period granted to a participant who drops out of an active race.
    pub disconnect_grace: Duration,
    /// Interval of the reaper sweep.
    pub reap_interval: Duration,
    /// Silence after which a live channel is considered dead.
    pub heartbeat_timeout: Duration,
    /// How long closed matches are remembered to answer late messages.
    pub closed_match_retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            group_size: matchmaking::GROUP_SIZE,
            pairing_tick: Duration::from_millis(matchmaking::PAIRING_TICK_MS),
            accept_timeout: Duration::from_secs(matchmaking::ACCEPT_TIMEOUT_SECS),
            max_queue_wait: Duration::from_secs(matchmaking::MAX_QUEUE_WAIT_SECS),
            rating_window: matchmaking::RATING_WINDOW,
            relax_rating_after: Duration::from_secs(matchmaking::RELAX_RATING_AFTER_SECS),
            disconnect_grace: Duration::from_secs(race::DISCONNECT_GRACE_SECS),
            reap_interval: Duration::from_secs(race::REAP_INTERVAL_SECS),
            heartbeat_timeout: Duration::from_secs(race::HEARTBEAT_TIMEOUT_SECS),
            closed_match_retention: Duration::from_secs(race::CLOSED_MATCH_RETENTION_SECS),
        }
    }
}

impl EngineConfig {
    /// Build the default configuration, then apply `RACE_*` environment overrides.
    pub fn from_env() -> Self {
        Self::from_vars(&|key| env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] over an arbitrary variable lookup.
    pub fn from_vars(vars: Lookup) -> Self {
        let mut config = Self::default();
        if let Some(size) = parse_var::<usize>(vars, "RACE_GROUP_SIZE") {
            if size >= 2 {
                config.group_size = size;
            } else {
                warn!("[Config] RACE_GROUP_SIZE must be at least 2, keeping {}", config.group_size);
            }
        }
        if let Some(window) = parse_var::<u32>(vars, "RACE_RATING_WINDOW") {
            config.rating_window = Some(window);
        }

        // Timers driving a periodic pass or a deadline must be positive.
        positive(vars, "RACE_PAIRING_TICK_MS", Duration::from_millis, &mut config.pairing_tick);
        positive(vars, "RACE_ACCEPT_TIMEOUT_SECS", Duration::from_secs, &mut config.accept_timeout);
        positive(vars, "RACE_MAX_QUEUE_WAIT_SECS", Duration::from_secs, &mut config.max_queue_wait);
        positive(vars, "RACE_REAP_INTERVAL_SECS", Duration::from_secs, &mut config.reap_interval);
        positive(vars, "RACE_HEARTBEAT_TIMEOUT_SECS", Duration::from_secs, &mut config.heartbeat_timeout);

        // Zero is meaningful here: relax at once, forfeit at once, forget at once.
        if let Some(secs) = parse_var::<u64>(vars, "RACE_RELAX_RATING_AFTER_SECS") {
            config.relax_rating_after = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(vars, "RACE_DISCONNECT_GRACE_SECS") {
            config.disconnect_grace = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(vars, "RACE_CLOSED_MATCH_RETENTION_SECS") {
            config.closed_match_retention = Duration::from_secs(secs);
        }
        config
    }
}

/// Listener settings for the HTTP/WebSocket front.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Optional JSON file of courses replacing the built-in catalog.
    pub courses_path: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("RACE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var(&|key| env::var(key).ok(), "RACE_PORT").unwrap_or(8080),
            courses_path: env::var("RACE_COURSES_PATH").ok(),
        }
    }
}

/// Variable lookup used to read overrides.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn parse_var<T: FromStr>(vars: Lookup, key: &str) -> Option<T> {
    let raw = vars(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("[Config] Ignoring malformed {}={:?}", key, raw);
            None
        }
    }
}

fn positive(vars: Lookup, key: &str, unit: fn(u64) -> Duration, slot: &mut Duration) {
    match parse_var::<u64>(vars, key) {
        Some(0) => warn!("[Config] {} must be positive, keeping {:?}", key, slot),
        Some(value) => *slot = unit(value),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EngineConfig::from_vars(&|key| vars.get(key).cloned())
    }

    #[test]
    fn sweep_and_retention_timers_are_overridable() {
        let config = config_from(&[
            ("RACE_REAP_INTERVAL_SECS", "7"),
            ("RACE_RELAX_RATING_AFTER_SECS", "12"),
            ("RACE_CLOSED_MATCH_RETENTION_SECS", "90"),
        ]);
        assert_eq!(config.reap_interval, Duration::from_secs(7));
        assert_eq!(config.relax_rating_after, Duration::from_secs(12));
        assert_eq!(config.closed_match_retention, Duration::from_secs(90));
    }

    #[test]
    fn zero_periodic_timers_keep_defaults() {
        let defaults = EngineConfig::default();
        let config = config_from(&[
            ("RACE_PAIRING_TICK_MS", "0"),
            ("RACE_REAP_INTERVAL_SECS", "0"),
            ("RACE_ACCEPT_TIMEOUT_SECS", "0"),
            ("RACE_HEARTBEAT_TIMEOUT_SECS", "0"),
        ]);
        assert_eq!(config.pairing_tick, defaults.pairing_tick);
        assert_eq!(config.reap_interval, defaults.reap_interval);
        assert_eq!(config.accept_timeout, defaults.accept_timeout);
        assert_eq!(config.heartbeat_timeout, defaults.heartbeat_timeout);
    }

    #[test]
    fn zero_grace_is_allowed_and_garbage_is_ignored() {
        let config = config_from(&[("RACE_DISCONNECT_GRACE_SECS", "0"), ("RACE_GROUP_SIZE", "many")]);
        assert_eq!(config.disconnect_grace, Duration::ZERO);
        assert_eq!(config.group_size, EngineConfig::default().group_size);
    }
}
