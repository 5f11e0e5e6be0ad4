//! Run context: the loop's own mutable state plus the cross-thread controls.
//!
//! The cancellation and pause flags are the only state shared across
//! threads, held behind atomics in [`ControlHandle`]. Everything else in
//! [`RunContext`] is mutated exclusively by the loop thread and stays
//! inspectable after the loop exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::AutomationConfig;

/// Top-level loop states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Paused,
    Stopping,
    Stopped,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Running => write!(f, "running"),
            LoopState::Paused => write!(f, "paused"),
            LoopState::Stopping => write!(f, "stopping"),
            LoopState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why the loop stopped. A user-requested stop is distinct from the fatal
/// paths so a front-end can tell a clean shutdown from a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// External stop signal.
    UserRequested,
    /// Consecutive transient failures exceeded `max_retries`.
    RetriesExhausted(String),
    /// The decision engine hit a configured hard stop.
    Aborted(String),
}

impl StopReason {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StopReason::UserRequested)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::UserRequested => write!(f, "stopped by user"),
            StopReason::RetriesExhausted(msg) => write!(f, "retries exhausted: {}", msg),
            StopReason::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Cloneable handle for controlling a running loop from another thread.
#[derive(Clone, Debug, Default)]
pub struct ControlHandle {
    stop: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. Honored at the top of the next iteration or at the
    /// next blocking wait, whichever comes first.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Process-wide state for one automation run.
///
/// Created at loop start, mutated only by the loop thread, and handed back
/// for diagnostics when the loop exits.
pub struct RunContext {
    pub config: AutomationConfig,
    pub state: LoopState,
    /// 1-based count of iterations begun.
    pub iteration: u64,
    /// Retryable failures since the last successful iteration.
    pub consecutive_failures: u32,
    /// Training sessions successfully executed this run.
    pub training_sessions: u32,
    pub races_completed: u32,
    pub events_handled: u32,
    /// Human-readable reason for the last fatal condition, if any.
    pub last_error: Option<String>,
    controls: ControlHandle,
}

impl RunContext {
    pub fn new(config: AutomationConfig) -> Self {
        Self {
            config,
            state: LoopState::Stopped,
            iteration: 0,
            consecutive_failures: 0,
            training_sessions: 0,
            races_completed: 0,
            events_handled: 0,
            last_error: None,
            controls: ControlHandle::new(),
        }
    }

    /// Handle for issuing pause/resume/stop from other threads.
    pub fn controls(&self) -> ControlHandle {
        self.controls.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_handle_flags() {
        let controls = ControlHandle::new();
        assert!(!controls.stop_requested());
        assert!(!controls.is_paused());

        controls.pause();
        assert!(controls.is_paused());
        controls.resume();
        assert!(!controls.is_paused());

        controls.stop();
        assert!(controls.stop_requested());
    }

    #[test]
    fn test_control_handle_clones_share_state() {
        let controls = ControlHandle::new();
        let other = controls.clone();
        other.stop();
        assert!(controls.stop_requested());
    }

    #[test]
    fn test_new_context_starts_clean() {
        let ctx = RunContext::new(AutomationConfig::default());
        assert_eq!(ctx.state, LoopState::Stopped);
        assert_eq!(ctx.iteration, 0);
        assert_eq!(ctx.consecutive_failures, 0);
        assert!(ctx.last_error.is_none());
    }

    #[test]
    fn test_stop_reason_fatality() {
        assert!(!StopReason::UserRequested.is_fatal());
        assert!(StopReason::RetriesExhausted("x".into()).is_fatal());
        assert!(StopReason::Aborted("x".into()).is_fatal());
    }
}
