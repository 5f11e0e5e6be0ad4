//! Structured status events emitted once per loop iteration.
//!
//! Where the events go is the sink's concern; the shipped [`LogSink`]
//! serializes them onto the ambient log.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::automation::context::StopReason;
use crate::automation::executor::ExecutionOutcome;
use crate::engine::Decision;
use crate::screen::ScreenState;

/// What one iteration of the loop observed and did.
#[derive(Clone, Debug, Serialize)]
pub struct IterationReport {
    pub iteration: u64,
    pub screen: ScreenState,
    pub decision: Decision,
    /// `None` when no execution was attempted (unknown screen).
    pub outcome: Option<ExecutionOutcome>,
    pub timestamp: DateTime<Local>,
}

impl IterationReport {
    pub fn new(
        iteration: u64,
        screen: ScreenState,
        decision: Decision,
        outcome: Option<ExecutionOutcome>,
    ) -> Self {
        Self {
            iteration,
            screen,
            decision,
            outcome,
            timestamp: Local::now(),
        }
    }
}

/// Receives per-iteration reports and the final stop notification.
pub trait StatusSink {
    fn report(&mut self, report: &IterationReport);

    /// Called once when the loop leaves its final iteration.
    fn finished(&mut self, _reason: &StopReason) {}
}

/// Sink that writes each report as a JSON line on the ambient log.
#[derive(Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn report(&mut self, report: &IterationReport) {
        match serde_json::to_string(report) {
            Ok(line) => log::info!("{}", line),
            Err(e) => log::warn!("failed to serialize iteration report: {}", e),
        }
    }

    fn finished(&mut self, reason: &StopReason) {
        log::info!("automation stopped: {}", reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_to_json() {
        let report = IterationReport::new(
            3,
            ScreenState::TrainingSelect,
            Decision::Train(crate::engine::Stat::Speed),
            Some(ExecutionOutcome::Success),
        );

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"iteration\":3"));
        assert!(json.contains("TrainingSelect"));
        assert!(json.contains("speed"));
        assert!(json.contains("success"));
    }

    #[test]
    fn test_report_without_outcome() {
        let report = IterationReport::new(1, ScreenState::Unknown, Decision::Wait, None);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"outcome\":null"));
    }
}
