//! Screen classification: which logical game screen a capture shows.

pub mod classifier;
pub mod registry;

use serde::Serialize;

pub use classifier::{Observation, ScreenAnchors, ScreenClassifier};
pub use registry::{Template, TemplateRegistry};

/// The logical screens the automation knows how to handle.
///
/// Exactly one value is active per loop iteration. `Unknown` is the explicit
/// "classification failed" state; the loop treats it as "retry capture",
/// never as an error that halts the run by itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ScreenState {
    MainMenu,
    TrainingSelect,
    RaceScreen,
    EventChoice,
    Unknown,
}

impl std::fmt::Display for ScreenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreenState::MainMenu => write!(f, "main menu"),
            ScreenState::TrainingSelect => write!(f, "training select"),
            ScreenState::RaceScreen => write!(f, "race screen"),
            ScreenState::EventChoice => write!(f, "event choice"),
            ScreenState::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", ScreenState::MainMenu), "main menu");
        assert_eq!(format!("{}", ScreenState::Unknown), "unknown");
    }
}
