//! Race domain: participants, course grammar, authoritative race state and results.
//!
//! Everything here is synchronous and owns no timers or channels, so it can be
//! driven directly from unit tests. The actors in `server` wrap these types.

pub mod catalog;
pub mod course;
pub mod result;
pub mod state;
pub mod types;
