//! Screen classification over a registered set of anchor templates.
//!
//! Screens are evaluated in a fixed, documented priority order, most
//! specific first, so a generic anchor shared across screens can never
//! shadow a more specific one. The first screen whose *entire* anchor set
//! matches wins; if none does, the observation is `Unknown`.

use anyhow::Result;

use crate::capture::Capture;
use crate::screen::registry::TemplateRegistry;
use crate::screen::ScreenState;
use crate::vision::matcher::{ImageMatcher, MatchResult};

/// Anchor template names that must all match for a screen to be selected.
#[derive(Clone, Debug)]
pub struct ScreenAnchors {
    pub state: ScreenState,
    pub anchors: Vec<String>,
}

/// The classification produced for one capture.
#[derive(Clone, Debug)]
pub struct Observation {
    pub state: ScreenState,
    /// Anchor match results of the winning screen (empty for Unknown).
    pub matches: Vec<MatchResult>,
}

/// Classifies captures against the anchor registry.
#[derive(Debug)]
pub struct ScreenClassifier {
    registry: TemplateRegistry,
    matcher: ImageMatcher,
    /// Evaluation order; earlier entries win ties.
    order: Vec<ScreenAnchors>,
}

/// Default classification priority, most specific screen first.
///
/// EventChoice needs two anchors and sits on top so that its generic event
/// frame can never be claimed by another screen. MainMenu's anchor is the
/// most generic and is checked last. This ordering is the documented
/// tie-break: when two screens' anchors all match on the same capture, the
/// earlier entry is always selected.
fn default_order() -> Vec<ScreenAnchors> {
    vec![
        ScreenAnchors {
            state: ScreenState::EventChoice,
            anchors: vec!["event_screen".to_string(), "choice_option_1".to_string()],
        },
        ScreenAnchors {
            state: ScreenState::RaceScreen,
            anchors: vec!["race_screen".to_string()],
        },
        ScreenAnchors {
            state: ScreenState::TrainingSelect,
            anchors: vec!["training_screen".to_string()],
        },
        ScreenAnchors {
            state: ScreenState::MainMenu,
            anchors: vec!["main_menu".to_string()],
        },
    ]
}

impl ScreenClassifier {
    /// Builds a classifier with the default priority order.
    ///
    /// Fails fast with a missing-template error if any required anchor is
    /// absent from the registry.
    pub fn new(registry: TemplateRegistry, matcher: ImageMatcher) -> Result<Self> {
        Self::with_order(registry, matcher, default_order())
    }

    /// Builds a classifier with an explicit priority order.
    pub fn with_order(
        registry: TemplateRegistry,
        matcher: ImageMatcher,
        order: Vec<ScreenAnchors>,
    ) -> Result<Self> {
        for screen in &order {
            let names: Vec<&str> = screen.anchors.iter().map(String::as_str).collect();
            registry.require(&names)?;
        }
        Ok(Self {
            registry,
            matcher,
            order,
        })
    }

    /// Classifies a capture. Deterministic: identical capture and registry
    /// always produce the same observation.
    ///
    /// Returns an error only for matcher hard failures (resolution
    /// mismatch); an unrecognized screen is the `Unknown` observation.
    pub fn classify(&self, capture: &Capture) -> Result<Observation> {
        for screen in &self.order {
            let mut matches = Vec::with_capacity(screen.anchors.len());
            let mut all_matched = true;

            for anchor in &screen.anchors {
                // Anchors were checked at construction time
                let Some(template) = self.registry.get(anchor) else {
                    all_matched = false;
                    break;
                };
                let result = self.matcher.find(capture, template)?;
                if !result.matched {
                    all_matched = false;
                    break;
                }
                matches.push(result);
            }

            if all_matched {
                log::debug!("classified capture as {}", screen.state);
                return Ok(Observation {
                    state: screen.state,
                    matches,
                });
            }
        }

        Ok(Observation {
            state: ScreenState::Unknown,
            matches: Vec::new(),
        })
    }

    /// Matches a single template by name against a capture.
    ///
    /// Used by the decision engine for secondary cues (stat buttons, race
    /// skip anchor) on an already-classified capture. Returns `None` if the
    /// template was never registered.
    pub fn probe(&self, capture: &Capture, name: &str) -> Result<Option<MatchResult>> {
        match self.registry.get(name) {
            Some(template) => Ok(Some(self.matcher.find(capture, template)?)),
            None => Ok(None),
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }
}
