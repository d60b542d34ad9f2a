/// Race and liveness configuration constants.
pub const DISCONNECT_GRACE_SECS: u64 = 20; // Time a dropped racer has to come back.

/// Interval (in seconds) of the reaper sweep.
pub const REAP_INTERVAL_SECS: u64 = 5;

/// Time (in seconds) without traffic before a live channel is reaped.
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 45;

/// Interval (in seconds) between server pings on a live channel.
pub const PING_INTERVAL_SECS: u64 = 10;

/// Time (in seconds) closed matches are kept to answer late messages.
pub const CLOSED_MATCH_RETENTION_SECS: u64 = 120;
