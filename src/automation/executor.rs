//! Translates decisions into synthetic input against the game window.
//!
//! The executor re-validates that the target window still exists and is
//! focused immediately before injecting anything; if not, it reports
//! `NotFound` rather than clicking into whatever window took its place.
//! Once a click plan starts it runs to completion; cancellation is honored
//! between iterations, never mid-sequence, so the game is never left in a
//! half-clicked state.

use anyhow::Result;
use serde::Serialize;
use std::time::Duration;

use crate::capture::window::{WindowLocator, WindowRegion};
use crate::config::{RelativePoint, ScreenLayout};
use crate::engine::{Decision, RaceAction};

/// Result of executing one decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    /// The game window disappeared or could not be focused.
    NotFound,
    /// Input injection itself failed.
    InputFailed,
}

impl std::fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionOutcome::Success => write!(f, "success"),
            ExecutionOutcome::NotFound => write!(f, "window not found"),
            ExecutionOutcome::InputFailed => write!(f, "input failed"),
        }
    }
}

/// A single synthetic input event, in screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    MoveTo { x: i32, y: i32 },
    Click { x: i32, y: i32 },
    Wait(Duration),
}

/// Injects synthetic input. Platform front-ends implement this on top of
/// SendInput or the local equivalent.
pub trait InputInjector {
    fn send(&mut self, event: &InputEvent) -> Result<()>;
}

/// Maps decisions to click sequences against the located window.
pub struct ActionExecutor {
    locator: Box<dyn WindowLocator + Send>,
    injector: Box<dyn InputInjector + Send>,
    layout: ScreenLayout,
    click_delay: Duration,
}

impl ActionExecutor {
    pub fn new(
        locator: Box<dyn WindowLocator + Send>,
        injector: Box<dyn InputInjector + Send>,
        layout: ScreenLayout,
        click_delay: Duration,
    ) -> Self {
        Self {
            locator,
            injector,
            layout,
            click_delay,
        }
    }

    /// Executes a decision. `Wait` and `Abort` inject nothing and always
    /// succeed; everything else requires the window to still be present.
    pub fn execute(&mut self, decision: &Decision) -> ExecutionOutcome {
        let Some(target) = self.target_for(decision) else {
            return ExecutionOutcome::Success;
        };

        // Re-validate the window right before touching it.
        let Some(region) = self.locator.locate() else {
            log::warn!("game window not found, skipping {}", decision);
            return ExecutionOutcome::NotFound;
        };
        if !self.locator.focus(&region) {
            log::warn!("could not focus game window for {}", decision);
            return ExecutionOutcome::NotFound;
        }

        let plan = self.click_plan(&region, target);
        for event in &plan {
            if let Err(e) = self.injector.send(event) {
                log::warn!("input injection failed during {}: {}", decision, e);
                return ExecutionOutcome::InputFailed;
            }
        }

        log::debug!("executed {}", decision);
        ExecutionOutcome::Success
    }

    /// The relative click target for a decision, or `None` when the
    /// decision requires no input.
    fn target_for(&self, decision: &Decision) -> Option<RelativePoint> {
        match decision {
            Decision::Train(stat) => Some(self.layout.train_button(*stat)),
            Decision::Rest => Some(self.layout.rest_button),
            Decision::Race(RaceAction::Enter) => Some(self.layout.race_entry_button),
            Decision::Race(RaceAction::Skip) => Some(self.layout.race_skip_button),
            Decision::ChooseOption(index) => Some(self.layout.choice_option(*index)),
            Decision::Wait | Decision::Abort(_) => None,
        }
    }

    /// Move, settle, click: the standard click sequence.
    fn click_plan(&self, region: &WindowRegion, target: RelativePoint) -> Vec<InputEvent> {
        let (x, y) = region.to_screen(target);
        vec![
            InputEvent::MoveTo { x, y },
            InputEvent::Wait(self.click_delay),
            InputEvent::Click { x, y },
            InputEvent::Wait(self.click_delay),
        ]
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;
    use crate::engine::Stat;

    fn executor(locator: FakeLocator, injector: RecordingInjector) -> ActionExecutor {
        ActionExecutor::new(
            Box::new(locator),
            Box::new(injector),
            ScreenLayout::default(),
            Duration::from_millis(0),
        )
    }

    #[test]
    fn test_train_decision_clicks_the_stat_button() {
        let injector = RecordingInjector::default();
        let mut executor = executor(FakeLocator::default(), injector.clone());

        let outcome = executor.execute(&Decision::Train(Stat::Speed));
        assert_eq!(outcome, ExecutionOutcome::Success);

        let expected = REGION.to_screen(ScreenLayout::default().speed_button);
        assert_eq!(injector.clicks(), vec![expected]);
    }

    #[test]
    fn test_wait_injects_nothing() {
        let injector = RecordingInjector::default();
        // Window absent: Wait must still succeed because it never injects.
        let locator = FakeLocator {
            present: false,
            focusable: false,
        };
        let mut executor = executor(locator, injector.clone());

        assert_eq!(executor.execute(&Decision::Wait), ExecutionOutcome::Success);
        assert!(injector.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_abort_injects_nothing() {
        let injector = RecordingInjector::default();
        let mut executor = executor(FakeLocator::default(), injector.clone());

        let outcome = executor.execute(&Decision::Abort("done".to_string()));
        assert_eq!(outcome, ExecutionOutcome::Success);
        assert!(injector.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_window_is_not_found() {
        let injector = RecordingInjector::default();
        let locator = FakeLocator {
            present: false,
            focusable: true,
        };
        let mut executor = executor(locator, injector.clone());

        let outcome = executor.execute(&Decision::Train(Stat::Power));
        assert_eq!(outcome, ExecutionOutcome::NotFound);
        assert!(injector.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unfocusable_window_is_not_found() {
        let injector = RecordingInjector::default();
        let locator = FakeLocator {
            present: true,
            focusable: false,
        };
        let mut executor = executor(locator, injector.clone());

        assert_eq!(
            executor.execute(&Decision::Rest),
            ExecutionOutcome::NotFound
        );
    }

    #[test]
    fn test_injection_failure_is_input_failed() {
        let injector = RecordingInjector {
            fail: true,
            ..Default::default()
        };
        let mut executor = executor(FakeLocator::default(), injector.clone());

        assert_eq!(
            executor.execute(&Decision::Rest),
            ExecutionOutcome::InputFailed
        );
    }

    #[test]
    fn test_click_plan_orders_move_before_click() {
        let injector = RecordingInjector::default();
        let mut executor = executor(FakeLocator::default(), injector.clone());
        executor.execute(&Decision::ChooseOption(1));

        let events = injector.events.lock().unwrap().clone();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], InputEvent::MoveTo { .. }));
        assert!(matches!(events[1], InputEvent::Wait(_)));
        assert!(matches!(events[2], InputEvent::Click { .. }));

        // Option 1 sits one spacing below option 0
        let expected = REGION.to_screen(ScreenLayout::default().choice_option(1));
        assert_eq!(injector.clicks(), vec![expected]);
    }
}
