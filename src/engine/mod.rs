//! The decision engine: maps a classified screen to the next action.
//!
//! Decisions are pure values; all I/O stays in the executor. The engine
//! never fails for "no good option": every screen resolves to a defined
//! fallback. `Abort` is produced only for the configured hard stop
//! (training session budget exhausted).

pub mod rules;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::capture::Capture;
use crate::config::{AutomationConfig, FallbackAction};
use crate::screen::classifier::{Observation, ScreenClassifier};
use crate::screen::ScreenState;
use crate::vision::ocr::TextRecognizer;
use rules::{IndicatorSet, RuleSet};

/// A trainable stat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Speed,
    Stamina,
    Power,
    Guts,
    Intelligence,
    Technique,
}

impl Stat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Speed => "speed",
            Stat::Stamina => "stamina",
            Stat::Power => "power",
            Stat::Guts => "guts",
            Stat::Intelligence => "intelligence",
            Stat::Technique => "technique",
        }
    }

    /// Name of this stat's train-button template.
    pub fn button_template(&self) -> String {
        format!("{}_train", self.as_str())
    }

    /// Name of the optional secondary indicator template confirming the
    /// training is currently worthwhile/selectable.
    pub fn indicator_template(&self) -> String {
        format!("{}_train_ready", self.as_str())
    }
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "speed" => Ok(Stat::Speed),
            "stamina" => Ok(Stat::Stamina),
            "power" => Ok(Stat::Power),
            "guts" => Ok(Stat::Guts),
            "intelligence" => Ok(Stat::Intelligence),
            "technique" => Ok(Stat::Technique),
            other => Err(anyhow::anyhow!("unknown stat \"{}\"", other)),
        }
    }
}

/// What to do on the race screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceAction {
    /// Enter the selected race.
    Enter,
    /// Fast-forward a race already in progress.
    Skip,
}

/// The action selected for one iteration.
///
/// Produced fresh each iteration and only valid for the screen it was
/// derived from; decisions are never carried across iterations.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Click the train button for this stat.
    Train(Stat),
    Race(RaceAction),
    /// Click the event choice option at this 0-based index.
    ChooseOption(usize),
    /// Click the rest button (training fallback).
    Rest,
    /// Do nothing; re-capture after the configured delay.
    Wait,
    /// Hard stop with a human-readable reason.
    Abort(String),
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Train(stat) => write!(f, "train {}", stat),
            Decision::Race(RaceAction::Enter) => write!(f, "enter race"),
            Decision::Race(RaceAction::Skip) => write!(f, "skip race playback"),
            Decision::ChooseOption(index) => write!(f, "choose option {}", index + 1),
            Decision::Rest => write!(f, "rest"),
            Decision::Wait => write!(f, "wait"),
            Decision::Abort(reason) => write!(f, "abort: {}", reason),
        }
    }
}

/// Selects the next action from the classified screen and recognized data.
pub struct DecisionEngine {
    config: AutomationConfig,
    rules: RuleSet,
    indicators: IndicatorSet,
}

impl DecisionEngine {
    /// Compiles the configured option rules; a malformed rule is a fatal
    /// configuration error.
    pub fn new(config: &AutomationConfig) -> Result<Self> {
        let rules = RuleSet::compile(&config.option_rules)?;
        let indicators = IndicatorSet::new(&config.error_indicators);
        Ok(Self {
            config: config.clone(),
            rules,
            indicators,
        })
    }

    /// Scans the dialog region for a configured error indicator.
    ///
    /// A reliable hit means a modal popup is covering whatever screen was
    /// classified; the caller backs off and retries instead of clicking
    /// through it. OCR failures and unreliable reads report nothing, so a
    /// broken recognizer cannot stall the loop on its own.
    pub fn error_indicator(&self, capture: &Capture, ocr: &dyn TextRecognizer) -> Option<String> {
        if self.indicators.is_empty() {
            return None;
        }
        let region = self.config.layout.dialog_text_region;
        match ocr.recognize(&capture.image, &region) {
            Ok(recognized) if recognized.reliable => self
                .indicators
                .first_match(&recognized.text)
                .map(str::to_string),
            Ok(_) | Err(_) => None,
        }
    }

    /// Picks the decision for the current observation.
    ///
    /// Deterministic for identical capture, configuration, and
    /// `training_sessions` count; the session count is the only piece of
    /// run state that feeds a decision (the configured hard stop).
    pub fn decide(
        &self,
        observation: &Observation,
        capture: &Capture,
        perception: &ScreenClassifier,
        ocr: &dyn TextRecognizer,
        training_sessions: u32,
    ) -> Decision {
        if training_sessions >= self.config.max_training_sessions {
            return Decision::Abort(format!(
                "max training sessions reached ({})",
                self.config.max_training_sessions
            ));
        }

        match observation.state {
            ScreenState::TrainingSelect => self.decide_training(capture, perception),
            ScreenState::RaceScreen => self.decide_race(capture, perception),
            ScreenState::EventChoice => self.decide_event(capture, ocr),
            ScreenState::MainMenu | ScreenState::Unknown => Decision::Wait,
        }
    }

    /// Training screen: first selectable stat in priority order wins; if
    /// none is selectable, fall back to the configured default instead of
    /// failing.
    fn decide_training(&self, capture: &Capture, perception: &ScreenClassifier) -> Decision {
        for &stat in &self.config.priority_stats {
            if self.stat_selectable(capture, perception, stat) {
                return Decision::Train(stat);
            }
        }

        log::info!("no prioritized stat selectable, falling back");
        match self.config.fallback {
            FallbackAction::Rest => Decision::Rest,
            FallbackAction::Wait => Decision::Wait,
        }
    }

    /// A stat is selectable when its button template matches, and, if a
    /// secondary indicator template is registered for it, that matches too.
    fn stat_selectable(
        &self,
        capture: &Capture,
        perception: &ScreenClassifier,
        stat: Stat,
    ) -> bool {
        let button = match self.probe(capture, perception, &stat.button_template()) {
            Some(result) => result,
            None => return false,
        };
        if !button {
            return false;
        }

        let indicator = stat.indicator_template();
        if !perception.registry().contains(&indicator) {
            return true;
        }
        self.probe(capture, perception, &indicator).unwrap_or(false)
    }

    /// Probes a template, treating matcher hard errors as "not present".
    /// Classification already succeeded on this capture, so a resolution
    /// error here only loses a secondary cue, never the iteration.
    fn probe(&self, capture: &Capture, perception: &ScreenClassifier, name: &str) -> Option<bool> {
        match perception.probe(capture, name) {
            Ok(Some(result)) => Some(result.matched),
            Ok(None) => None,
            Err(e) => {
                log::warn!("probe of template \"{}\" failed: {}", name, e);
                Some(false)
            }
        }
    }

    /// Race screen: honoring `skip_races` means no race-entry click at all.
    /// Otherwise enter; a visible fast-forward anchor lets us skip the
    /// playback unless the run is farming fans.
    fn decide_race(&self, capture: &Capture, perception: &ScreenClassifier) -> Decision {
        if self.config.skip_races {
            return Decision::Wait;
        }

        if !self.config.farm_fans {
            if let Some(true) = self.probe(capture, perception, "skip_race_button") {
                return Decision::Race(RaceAction::Skip);
            }
        }

        Decision::Race(RaceAction::Enter)
    }

    /// Event screen: read the prompt text and apply the configured rules;
    /// anything unreadable or unmatched takes the first option. This path
    /// must never block waiting for a human.
    fn decide_event(&self, capture: &Capture, ocr: &dyn TextRecognizer) -> Decision {
        let region = self.config.layout.event_text_region;
        match ocr.recognize(&capture.image, &region) {
            Ok(recognized) if recognized.reliable => {
                match self.rules.match_option(&recognized.text) {
                    Some(option) => Decision::ChooseOption(option),
                    None => Decision::ChooseOption(0),
                }
            }
            Ok(recognized) => {
                log::warn!(
                    "event text unreliable (confidence {:.2}), taking first option",
                    recognized.confidence
                );
                Decision::ChooseOption(0)
            }
            Err(e) => {
                log::warn!("event text recognition failed: {}", e);
                Decision::ChooseOption(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Frame;
    use crate::config::RelativeRect;
    use crate::screen::classifier::test_fixtures::{capture_showing, classifier};
    use crate::vision::ocr::Recognized;

    /// Recognizer returning a canned result.
    struct FakeOcr {
        result: Result<Recognized>,
    }

    impl FakeOcr {
        fn reading(text: &str, confidence: f32, reliable: bool) -> Self {
            Self {
                result: Ok(Recognized {
                    text: text.to_string(),
                    confidence,
                    reliable,
                }),
            }
        }

        fn failing() -> Self {
            Self {
                result: Err(anyhow::anyhow!("ocr unavailable")),
            }
        }
    }

    impl TextRecognizer for FakeOcr {
        fn recognize(&self, _frame: &Frame, _region: &RelativeRect) -> Result<Recognized> {
            match &self.result {
                Ok(r) => Ok(r.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    fn engine(config: &AutomationConfig) -> DecisionEngine {
        DecisionEngine::new(config).unwrap()
    }

    fn decide(
        config: &AutomationConfig,
        shown: &[&str],
        ocr: &FakeOcr,
        training_sessions: u32,
    ) -> Decision {
        let classifier = classifier();
        let capture = capture_showing(shown);
        let observation = classifier.classify(&capture).unwrap();
        engine(config).decide(&observation, &capture, &classifier, ocr, training_sessions)
    }

    #[test]
    fn test_training_picks_highest_priority_selectable_stat() {
        let mut config = AutomationConfig::default();
        config.priority_stats = vec![Stat::Speed, Stat::Stamina, Stat::Power];

        // Speed's secondary indicator is registered but absent from the
        // capture, so speed is not selectable; stamina is next in line.
        let decision = decide(
            &config,
            &["training_screen", "speed_train", "stamina_train"],
            &FakeOcr::failing(),
            0,
        );
        assert_eq!(decision, Decision::Train(Stat::Stamina));
    }

    #[test]
    fn test_training_uses_indicator_when_registered() {
        let mut config = AutomationConfig::default();
        config.priority_stats = vec![Stat::Speed, Stat::Power];

        // Both the speed button and its ready indicator are visible.
        let decision = decide(
            &config,
            &["training_screen", "speed_train", "speed_train_ready"],
            &FakeOcr::failing(),
            0,
        );
        assert_eq!(decision, Decision::Train(Stat::Speed));
    }

    #[test]
    fn test_training_falls_back_to_rest_when_nothing_selectable() {
        let config = AutomationConfig::default();
        let decision = decide(&config, &["training_screen"], &FakeOcr::failing(), 0);
        assert_eq!(decision, Decision::Rest);
    }

    #[test]
    fn test_training_fallback_can_be_wait() {
        let mut config = AutomationConfig::default();
        config.fallback = FallbackAction::Wait;
        let decision = decide(&config, &["training_screen"], &FakeOcr::failing(), 0);
        assert_eq!(decision, Decision::Wait);
    }

    #[test]
    fn test_race_screen_skip_races_waits() {
        let mut config = AutomationConfig::default();
        config.skip_races = true;
        let decision = decide(&config, &["race_screen"], &FakeOcr::failing(), 0);
        assert_eq!(decision, Decision::Wait);
    }

    #[test]
    fn test_race_screen_enters_by_default() {
        let config = AutomationConfig::default();
        let decision = decide(&config, &["race_screen"], &FakeOcr::failing(), 0);
        assert_eq!(decision, Decision::Race(RaceAction::Enter));
    }

    #[test]
    fn test_race_playback_skipped_when_anchor_visible() {
        let config = AutomationConfig::default();
        let decision = decide(
            &config,
            &["race_screen", "skip_race_button"],
            &FakeOcr::failing(),
            0,
        );
        assert_eq!(decision, Decision::Race(RaceAction::Skip));
    }

    #[test]
    fn test_farm_fans_never_skips_playback() {
        let mut config = AutomationConfig::default();
        config.farm_fans = true;
        let decision = decide(
            &config,
            &["race_screen", "skip_race_button"],
            &FakeOcr::failing(),
            0,
        );
        assert_eq!(decision, Decision::Race(RaceAction::Enter));
    }

    #[test]
    fn test_event_choice_follows_matching_rule() {
        let mut config = AutomationConfig::default();
        config.option_rules = vec![rules::OptionRule {
            pattern: "stamina".to_string(),
            regex: false,
            option: 1,
        }];

        let ocr = FakeOcr::reading("Gain +10 Stamina", 0.92, true);
        let decision = decide(&config, &["event_screen", "choice_option_1"], &ocr, 0);
        assert_eq!(decision, Decision::ChooseOption(1));
    }

    #[test]
    fn test_event_choice_defaults_to_first_option() {
        let config = AutomationConfig::default();
        let ocr = FakeOcr::reading("Some unmatched prompt", 0.9, true);
        let decision = decide(&config, &["event_screen", "choice_option_1"], &ocr, 0);
        assert_eq!(decision, Decision::ChooseOption(0));
    }

    #[test]
    fn test_event_choice_unreliable_text_takes_first_option() {
        let mut config = AutomationConfig::default();
        config.option_rules = vec![rules::OptionRule {
            pattern: "stamina".to_string(),
            regex: false,
            option: 2,
        }];

        // The text would match a rule, but the read is unreliable; never
        // act on a low-confidence read as if it were certain.
        let ocr = FakeOcr::reading("Gain +10 Stamina", 0.3, false);
        let decision = decide(&config, &["event_screen", "choice_option_1"], &ocr, 0);
        assert_eq!(decision, Decision::ChooseOption(0));
    }

    #[test]
    fn test_event_choice_survives_ocr_failure() {
        let config = AutomationConfig::default();
        let decision = decide(
            &config,
            &["event_screen", "choice_option_1"],
            &FakeOcr::failing(),
            0,
        );
        assert_eq!(decision, Decision::ChooseOption(0));
    }

    #[test]
    fn test_error_indicator_found_in_reliable_dialog_text() {
        let config = AutomationConfig::default();
        let engine = engine(&config);
        let capture = capture_showing(&["training_screen"]);

        let ocr = FakeOcr::reading("Connection Lost. Check your network.", 0.91, true);
        assert_eq!(
            engine.error_indicator(&capture, &ocr),
            Some("connection lost".to_string())
        );
    }

    #[test]
    fn test_error_indicator_ignores_unreliable_reads() {
        let config = AutomationConfig::default();
        let engine = engine(&config);
        let capture = capture_showing(&["training_screen"]);

        let ocr = FakeOcr::reading("Connection Lost", 0.2, false);
        assert_eq!(engine.error_indicator(&capture, &ocr), None);
    }

    #[test]
    fn test_error_indicator_survives_ocr_failure() {
        let config = AutomationConfig::default();
        let engine = engine(&config);
        let capture = capture_showing(&["training_screen"]);

        assert_eq!(engine.error_indicator(&capture, &FakeOcr::failing()), None);
    }

    #[test]
    fn test_main_menu_waits() {
        let config = AutomationConfig::default();
        let decision = decide(&config, &["main_menu"], &FakeOcr::failing(), 0);
        assert_eq!(decision, Decision::Wait);
    }

    #[test]
    fn test_aborts_at_training_session_budget() {
        let mut config = AutomationConfig::default();
        config.max_training_sessions = 5;
        let decision = decide(&config, &["main_menu"], &FakeOcr::failing(), 5);
        assert!(matches!(decision, Decision::Abort(_)));
    }

    #[test]
    fn test_decide_is_idempotent_for_identical_capture() {
        let mut config = AutomationConfig::default();
        config.priority_stats = vec![Stat::Speed];

        let classifier = classifier();
        let capture = capture_showing(&["training_screen", "speed_train", "speed_train_ready"]);
        let observation = classifier.classify(&capture).unwrap();
        let engine = engine(&config);
        let ocr = FakeOcr::failing();

        let first = engine.decide(&observation, &capture, &classifier, &ocr, 0);
        let second = engine.decide(&observation, &capture, &classifier, &ocr, 0);
        assert_eq!(first, second);
        assert_eq!(first, Decision::Train(Stat::Speed));
    }

    #[test]
    fn test_stat_parsing() {
        assert_eq!("Speed".parse::<Stat>().unwrap(), Stat::Speed);
        assert_eq!(" guts ".parse::<Stat>().unwrap(), Stat::Guts);
        assert!("charisma".parse::<Stat>().is_err());
    }
}
