//! The top-level automation loop.
//!
//! Each iteration runs capture → classify → decide → execute strictly in
//! sequence on one thread. Transient failures (unrecognized screen, missing
//! window, failed injection) feed a consecutive-failure counter with
//! backoff; exceeding `max_retries` is a fatal stop distinct from a
//! user-requested one. The stop signal is checked at the top of every
//! iteration and inside every wait, so cancellation lands within one
//! iteration's latency without ever interrupting an in-flight click
//! sequence.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::automation::context::{ControlHandle, LoopState, RunContext, StopReason};
use crate::automation::executor::{ActionExecutor, ExecutionOutcome};
use crate::automation::report::{IterationReport, StatusSink};
use crate::capture::ScreenSource;
use crate::engine::{Decision, DecisionEngine};
use crate::screen::{ScreenClassifier, ScreenState};
use crate::vision::TextRecognizer;

/// Granularity at which waits re-check the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Outcome of one loop iteration.
enum IterationStatus {
    Success,
    /// Retryable; the message feeds logs and the eventual fatal report.
    Transient(String),
    Fatal(StopReason),
}

/// Drives the perceive-decide-act cycle until stopped.
pub struct AutomationLoop {
    source: Box<dyn ScreenSource + Send>,
    classifier: ScreenClassifier,
    engine: DecisionEngine,
    executor: ActionExecutor,
    ocr: Box<dyn TextRecognizer + Send>,
    sink: Box<dyn StatusSink + Send>,
}

impl AutomationLoop {
    pub fn new(
        source: Box<dyn ScreenSource + Send>,
        classifier: ScreenClassifier,
        engine: DecisionEngine,
        executor: ActionExecutor,
        ocr: Box<dyn TextRecognizer + Send>,
        sink: Box<dyn StatusSink + Send>,
    ) -> Self {
        Self {
            source,
            classifier,
            engine,
            executor,
            ocr,
            sink,
        }
    }

    /// Runs the loop on the current thread until it stops, returning why.
    ///
    /// The context keeps its final counters and `last_error` for
    /// inspection after the run.
    pub fn run(&mut self, ctx: &mut RunContext) -> StopReason {
        let controls = ctx.controls();
        ctx.state = LoopState::Running;
        log::info!("automation loop started");

        let reason = loop {
            if controls.stop_requested() {
                break StopReason::UserRequested;
            }

            if controls.is_paused() {
                if ctx.state != LoopState::Paused {
                    log::info!("automation paused");
                    ctx.state = LoopState::Paused;
                }
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            if ctx.state != LoopState::Running {
                log::info!("automation resumed");
                ctx.state = LoopState::Running;
            }

            ctx.iteration += 1;
            match self.iterate(ctx) {
                IterationStatus::Success => {
                    ctx.consecutive_failures = 0;
                    interruptible_sleep(&controls, ctx.config.screenshot_delay());
                }
                IterationStatus::Transient(msg) => {
                    ctx.consecutive_failures += 1;
                    log::warn!(
                        "iteration {} failed ({}), consecutive failures: {}",
                        ctx.iteration,
                        msg,
                        ctx.consecutive_failures
                    );
                    if ctx.consecutive_failures > ctx.config.max_retries {
                        break StopReason::RetriesExhausted(format!(
                            "{} consecutive failures, last: {}",
                            ctx.consecutive_failures, msg
                        ));
                    }
                    // Back off harder the longer the failure streak lasts
                    let backoff = ctx
                        .config
                        .screenshot_delay()
                        .saturating_mul(ctx.consecutive_failures);
                    interruptible_sleep(&controls, backoff);
                }
                IterationStatus::Fatal(reason) => break reason,
            }
        };

        ctx.state = LoopState::Stopping;
        if reason.is_fatal() {
            ctx.last_error = Some(reason.to_string());
        }
        self.sink.finished(&reason);
        ctx.state = LoopState::Stopped;
        log::info!("automation loop finished: {}", reason);
        reason
    }

    /// One perceive-decide-act pass.
    fn iterate(&mut self, ctx: &mut RunContext) -> IterationStatus {
        // The capture lives only for this iteration.
        let capture = match self.source.capture() {
            Ok(capture) => capture,
            Err(e) => return IterationStatus::Transient(format!("capture failed: {}", e)),
        };

        let observation = match self.classifier.classify(&capture) {
            Ok(observation) => observation,
            Err(e) => return IterationStatus::Transient(format!("classification failed: {}", e)),
        };

        if observation.state == ScreenState::Unknown {
            // Report the blind iteration, then retry capture.
            self.sink.report(&IterationReport::new(
                ctx.iteration,
                ScreenState::Unknown,
                Decision::Wait,
                None,
            ));
            return IterationStatus::Transient("screen not recognized".to_string());
        }

        // A modal error dialog can overlay a recognized screen; back off
        // instead of clicking through it.
        if let Some(indicator) = self.engine.error_indicator(&capture, self.ocr.as_ref()) {
            self.sink.report(&IterationReport::new(
                ctx.iteration,
                observation.state,
                Decision::Wait,
                None,
            ));
            return IterationStatus::Transient(format!("error dialog detected: {}", indicator));
        }

        let decision = self.engine.decide(
            &observation,
            &capture,
            &self.classifier,
            self.ocr.as_ref(),
            ctx.training_sessions,
        );
        log::debug!(
            "iteration {}: {} -> {}",
            ctx.iteration,
            observation.state,
            decision
        );

        if let Decision::Abort(reason) = &decision {
            self.sink.report(&IterationReport::new(
                ctx.iteration,
                observation.state,
                decision.clone(),
                None,
            ));
            return IterationStatus::Fatal(StopReason::Aborted(reason.clone()));
        }

        // Runs to completion even if a stop arrives meanwhile; the stop is
        // honored at the top of the next iteration.
        let outcome = self.executor.execute(&decision);

        self.sink.report(&IterationReport::new(
            ctx.iteration,
            observation.state,
            decision.clone(),
            Some(outcome),
        ));

        match outcome {
            ExecutionOutcome::Success => {
                match decision {
                    Decision::Train(_) => ctx.training_sessions += 1,
                    Decision::Race(_) => ctx.races_completed += 1,
                    Decision::ChooseOption(_) => ctx.events_handled += 1,
                    _ => {}
                }
                IterationStatus::Success
            }
            ExecutionOutcome::NotFound => {
                IterationStatus::Transient("game window not found".to_string())
            }
            ExecutionOutcome::InputFailed => {
                IterationStatus::Transient("input injection failed".to_string())
            }
        }
    }

    /// Starts the loop in a background thread.
    ///
    /// The handle controls the run and joins back the final context and
    /// stop reason.
    pub fn spawn(mut self, mut ctx: RunContext) -> AutomationHandle {
        let controls = ctx.controls();
        let thread = thread::spawn(move || {
            let reason = self.run(&mut ctx);
            (ctx, reason)
        });
        AutomationHandle { controls, thread }
    }
}

/// Sleeps in short slices, returning early once a stop is requested.
fn interruptible_sleep(controls: &ControlHandle, duration: Duration) {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if controls.stop_requested() {
            return;
        }
        let slice = remaining.min(POLL_INTERVAL);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}

/// Handle to a loop running on a background thread.
pub struct AutomationHandle {
    controls: ControlHandle,
    thread: JoinHandle<(RunContext, StopReason)>,
}

impl AutomationHandle {
    pub fn controls(&self) -> ControlHandle {
        self.controls.clone()
    }

    pub fn pause(&self) {
        self.controls.pause();
    }

    pub fn resume(&self) {
        self.controls.resume();
    }

    pub fn stop(&self) {
        self.controls.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the loop to finish and returns the final context and stop
    /// reason.
    pub fn join(self) -> Result<(RunContext, StopReason)> {
        self.thread
            .join()
            .map_err(|_| anyhow!("automation thread panicked"))
    }
}
