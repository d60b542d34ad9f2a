/// Configuration for flood protection on live channels.
/// All values are in seconds or counts per second.
pub const MAX_REQUESTS_PER_SECOND: u32 = 40;
pub const BAN_DURATION_SECONDS: u64 = 60;
