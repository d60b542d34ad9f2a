/// Matchmaking configuration constants.
///
/// This module defines parameters for the queue and the proposal phase, such as
/// group size, pairing cadence, and acceptance timeouts.
pub const GROUP_SIZE: usize = 2; // Participants per match.

/// Interval (in milliseconds) of the periodic pairing pass.
pub const PAIRING_TICK_MS: u64 = 1000;

/// Time (in seconds) every participant has to accept a proposed match.
pub const ACCEPT_TIMEOUT_SECS: u64 = 15;

/// Time (in seconds) after which a waiting queue entry expires.
pub const MAX_QUEUE_WAIT_SECS: u64 = 300;

/// Maximum rating distance inside one match. `None` means pure FIFO pairing.
pub const RATING_WINDOW: Option<u32> = None;

/// Time (in seconds) after which the group head ignores the rating window.
pub const RELAX_RATING_AFTER_SECS: u64 = 30;
