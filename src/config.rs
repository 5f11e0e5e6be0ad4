//! Configuration types for the automation core.
//!
//! Loads settings from config.json at startup. Everything the loop needs is
//! validated up front: out-of-range thresholds, an empty or duplicated stat
//! priority list, or an unparseable option rule abort before automation
//! starts instead of degrading mid-run.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::rules::OptionRule;
use crate::engine::Stat;

/// A rectangle in window-relative coordinates, so regions survive resizes.
/// All fields are fractions of the client area in [0.0, 1.0].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RelativeRect {
    /// Top-left corner, as a fraction of window width.
    pub x: f32,
    /// Top-left corner, as a fraction of window height.
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for RelativeRect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.1,
            height: 0.1,
        }
    }
}

/// A window-relative point, typically a button center.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RelativePoint {
    /// Fraction of window width from the left edge.
    pub x: f32,
    /// Fraction of window height from the top edge.
    pub y: f32,
}

impl Default for RelativePoint {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

/// What the decision engine falls back to on the training screen when none
/// of the prioritized stats is selectable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackAction {
    /// Click the rest button.
    Rest,
    /// Do nothing this iteration and re-capture after the usual delay.
    Wait,
}

/// Relative positions of the clickable UI elements the executor targets.
///
/// Positions are fractions of the game window client area, so they survive
/// window resizes. Defaults match the 16:9 layout of the PC client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScreenLayout {
    pub speed_button: RelativePoint,
    pub stamina_button: RelativePoint,
    pub power_button: RelativePoint,
    pub guts_button: RelativePoint,
    pub intelligence_button: RelativePoint,
    pub technique_button: RelativePoint,
    /// Rest button on the training screen (fallback target).
    pub rest_button: RelativePoint,
    /// Button that enters the selected race.
    pub race_entry_button: RelativePoint,
    /// Button that fast-forwards a running race.
    pub race_skip_button: RelativePoint,
    /// Center of the first event choice option.
    pub choice_first_option: RelativePoint,
    /// Vertical spacing between stacked choice options, as window fraction.
    pub choice_option_spacing: f32,
    /// Region containing the event prompt text, read via OCR.
    pub event_text_region: RelativeRect,
    /// Region where modal dialogs render their message text, scanned for
    /// error indicators before acting on any screen.
    pub dialog_text_region: RelativeRect,
}

impl ScreenLayout {
    /// Returns the train-button position for a stat.
    pub fn train_button(&self, stat: Stat) -> RelativePoint {
        match stat {
            Stat::Speed => self.speed_button,
            Stat::Stamina => self.stamina_button,
            Stat::Power => self.power_button,
            Stat::Guts => self.guts_button,
            Stat::Intelligence => self.intelligence_button,
            Stat::Technique => self.technique_button,
        }
    }

    /// Returns the center of the choice option at `index` (0-based).
    /// Options stack vertically below the first one.
    pub fn choice_option(&self, index: usize) -> RelativePoint {
        RelativePoint {
            x: self.choice_first_option.x,
            y: self.choice_first_option.y + self.choice_option_spacing * index as f32,
        }
    }
}

impl Default for ScreenLayout {
    fn default() -> Self {
        Self {
            speed_button: RelativePoint { x: 0.12, y: 0.78 },
            stamina_button: RelativePoint { x: 0.27, y: 0.78 },
            power_button: RelativePoint { x: 0.42, y: 0.78 },
            guts_button: RelativePoint { x: 0.57, y: 0.78 },
            intelligence_button: RelativePoint { x: 0.72, y: 0.78 },
            technique_button: RelativePoint { x: 0.87, y: 0.78 },
            rest_button: RelativePoint { x: 0.5, y: 0.9 },
            race_entry_button: RelativePoint { x: 0.5, y: 0.85 },
            race_skip_button: RelativePoint { x: 0.9, y: 0.95 },
            choice_first_option: RelativePoint { x: 0.5, y: 0.45 },
            choice_option_spacing: 0.12,
            event_text_region: RelativeRect {
                x: 0.1,
                y: 0.15,
                width: 0.8,
                height: 0.2,
            },
            dialog_text_region: RelativeRect {
                x: 0.15,
                y: 0.3,
                width: 0.7,
                height: 0.4,
            },
        }
    }
}

/// Complete automation configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Stats to train, highest priority first.
    #[serde(default = "default_priority_stats")]
    pub priority_stats: Vec<Stat>,
    /// Never enter races; wait out the race screen instead.
    #[serde(default)]
    pub skip_races: bool,
    /// Enter every race to farm fans (disables race fast-forwarding).
    #[serde(default)]
    pub farm_fans: bool,
    /// Hard stop after this many completed training sessions.
    #[serde(default = "default_max_training_sessions")]
    pub max_training_sessions: u32,
    /// Delay between injected input events (milliseconds).
    #[serde(default = "default_click_delay_ms")]
    pub click_delay_ms: u64,
    /// Delay between loop iterations / before re-capture (milliseconds).
    #[serde(default = "default_screenshot_delay_ms")]
    pub screenshot_delay_ms: u64,
    /// Consecutive transient failures tolerated before a fatal stop.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Default template-match acceptance threshold (0.0-1.0).
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Per-template overrides of the match threshold.
    #[serde(default)]
    pub template_thresholds: BTreeMap<String, f32>,
    /// OCR results below this confidence are treated as unreliable (0.0-1.0).
    #[serde(default = "default_ocr_confidence_threshold")]
    pub ocr_confidence_threshold: f32,
    /// Tesseract language code. Fixed at startup, never inferred.
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    /// Deadline for one OCR subprocess invocation (milliseconds).
    #[serde(default = "default_ocr_timeout_ms")]
    pub ocr_timeout_ms: u64,
    /// Substrings marking an error dialog; a reliable OCR hit in the dialog
    /// region backs the loop off instead of acting on the screen beneath.
    #[serde(default = "default_error_indicators")]
    pub error_indicators: Vec<String>,
    /// Training-screen fallback when no prioritized stat is selectable.
    #[serde(default = "default_fallback")]
    pub fallback: FallbackAction,
    /// Resolution the templates were authored at. Captures at a different
    /// resolution are rescaled to this before matching.
    #[serde(default)]
    pub reference_resolution: Option<(u32, u32)>,
    /// Event-choice preferences, checked in order; first match wins.
    #[serde(default)]
    pub option_rules: Vec<OptionRule>,
    /// Clickable UI element positions.
    #[serde(default)]
    pub layout: ScreenLayout,
    /// Ambient log level: error, warn, info, debug, or trace.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_priority_stats() -> Vec<Stat> {
    vec![Stat::Speed, Stat::Stamina, Stat::Power]
}

fn default_max_training_sessions() -> u32 {
    50
}

fn default_click_delay_ms() -> u64 {
    500
}

fn default_screenshot_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_confidence_threshold() -> f32 {
    0.8
}

fn default_ocr_confidence_threshold() -> f32 {
    0.6
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

fn default_ocr_timeout_ms() -> u64 {
    10_000
}

fn default_error_indicators() -> Vec<String> {
    ["error", "failed", "connection lost", "retry"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_fallback() -> FallbackAction {
    FallbackAction::Rest
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            priority_stats: default_priority_stats(),
            skip_races: false,
            farm_fans: false,
            max_training_sessions: default_max_training_sessions(),
            click_delay_ms: default_click_delay_ms(),
            screenshot_delay_ms: default_screenshot_delay_ms(),
            max_retries: default_max_retries(),
            confidence_threshold: default_confidence_threshold(),
            template_thresholds: BTreeMap::new(),
            ocr_confidence_threshold: default_ocr_confidence_threshold(),
            ocr_language: default_ocr_language(),
            ocr_timeout_ms: default_ocr_timeout_ms(),
            error_indicators: default_error_indicators(),
            fallback: default_fallback(),
            reference_resolution: None,
            option_rules: Vec::new(),
            layout: ScreenLayout::default(),
            log_level: default_log_level(),
        }
    }
}

impl AutomationConfig {
    /// Loads and validates configuration from a JSON file.
    ///
    /// A missing or malformed file is a fatal startup error; automation
    /// never starts on a half-read configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads config.json from next to the executable, falling back to the
    /// working directory. Returns validated defaults if no file exists.
    pub fn load_default_location() -> Result<Self> {
        let config_path = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.join("config.json")))
            .unwrap_or_else(|| Path::new("config.json").to_path_buf());

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            log::info!("config.json not found, using default config");
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Checks every configured value against its documented valid range.
    pub fn validate(&self) -> Result<()> {
        if self.priority_stats.is_empty() {
            bail!("priority_stats must name at least one stat");
        }
        for (i, stat) in self.priority_stats.iter().enumerate() {
            if self.priority_stats[..i].contains(stat) {
                bail!("priority_stats lists {} more than once", stat);
            }
        }
        if self.max_training_sessions == 0 {
            bail!("max_training_sessions must be at least 1");
        }
        check_unit_range("confidence_threshold", self.confidence_threshold)?;
        check_unit_range("ocr_confidence_threshold", self.ocr_confidence_threshold)?;
        for (name, threshold) in &self.template_thresholds {
            check_unit_range(&format!("template_thresholds.{}", name), *threshold)?;
        }
        if self.layout.choice_option_spacing <= 0.0 {
            bail!("layout.choice_option_spacing must be positive");
        }
        if self.ocr_timeout_ms == 0 {
            bail!("ocr_timeout_ms must be positive");
        }
        self.log_filter()?;
        Ok(())
    }

    /// Delay between injected input events.
    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_delay_ms)
    }

    /// Delay between loop iterations.
    pub fn screenshot_delay(&self) -> Duration {
        Duration::from_millis(self.screenshot_delay_ms)
    }

    /// Deadline for one OCR subprocess invocation.
    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }

    /// Parses `log_level` into a level filter for the log facade.
    pub fn log_filter(&self) -> Result<log::LevelFilter> {
        log::LevelFilter::from_str(&self.log_level)
            .map_err(|_| anyhow!("log_level \"{}\" is not a valid level", self.log_level))
    }

    /// Match threshold for a template, honoring per-template overrides.
    pub fn template_threshold(&self, name: &str) -> f32 {
        self.template_thresholds
            .get(name)
            .copied()
            .unwrap_or(self.confidence_threshold)
    }
}

fn check_unit_range(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        bail!("{} must be in [0.0, 1.0], got {}", name, value);
    }
    Ok(())
}
