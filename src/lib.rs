//! Automation core for the Uma Musume PC client.
//!
//! Drives the game through a perceive-decide-act loop: capture the game
//! window, classify which screen is showing via template matching, extract
//! decision-relevant data (stat buttons, event text) with OCR, pick the next
//! action from configured training priorities, and inject clicks to carry it
//! out. The loop applies retry/backoff on transient failures and honors an
//! external stop signal so it can run unattended.
//!
//! Platform concerns are deliberately kept outside this crate: screen
//! capture, window location, and input injection are traits
//! ([`capture::ScreenSource`], [`capture::WindowLocator`],
//! [`automation::InputInjector`]) implemented by a platform front-end.

pub mod automation;
pub mod capture;
pub mod config;
pub mod engine;
pub mod screen;
pub mod vision;

pub use automation::{
    ActionExecutor, AutomationHandle, AutomationLoop, ControlHandle, ExecutionOutcome, InputEvent,
    InputInjector, IterationReport, LogSink, LoopState, RunContext, StatusSink, StopReason,
};
pub use capture::{Capture, Frame, ScreenSource, WindowLocator, WindowRegion};
pub use config::AutomationConfig;
pub use engine::{Decision, DecisionEngine, RaceAction, Stat};
pub use screen::{ScreenClassifier, ScreenState, Template, TemplateRegistry};
pub use vision::{ImageMatcher, MatchResult, Recognized, TesseractRecognizer, TextRecognizer};
