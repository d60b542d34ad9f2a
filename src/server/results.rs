//! Collaborators notified once per terminal match transition.

use log::info;

use crate::error::EngineError;
use crate::race::result::MatchResult;

/// Durable recording of match outcomes.
///
/// Called exactly once per match that reached the start line. An error is logged by
/// the caller and never rolls the match back; retrying is the sink's business.
pub trait ResultSink: Send {
    fn record_match_result(&mut self, result: &MatchResult) -> Result<(), EngineError>;
}

/// Best-effort statistics update, run even when persistence fails.
pub trait StatsSink: Send + Sync {
    fn record(&self, result: &MatchResult);
}

/// Writes every result to the log as JSON.
#[derive(Debug, Default)]
pub struct LogResultSink;

impl ResultSink for LogResultSink {
    fn record_match_result(&mut self, result: &MatchResult) -> Result<(), EngineError> {
        let json = serde_json::to_string(result).map_err(|e| EngineError::PersistenceFailed(e.to_string()))?;
        info!("[Results] {}", json);
        Ok(())
    }
}
