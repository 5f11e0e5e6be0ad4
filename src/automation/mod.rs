//! The automation loop and its collaborators.
//!
//! This module provides:
//! - Input injection contract and the decision-to-click executor
//! - Run context with cancellation and failure bookkeeping
//! - Structured per-iteration status reporting
//! - The top-level perceive-decide-act loop with retry/backoff

pub mod context;
pub mod executor;
pub mod report;
pub mod runner;

pub use context::{ControlHandle, LoopState, RunContext, StopReason};
pub use executor::{ActionExecutor, ExecutionOutcome, InputEvent, InputInjector};
pub use report::{IterationReport, LogSink, StatusSink};
pub use runner::{AutomationHandle, AutomationLoop};
