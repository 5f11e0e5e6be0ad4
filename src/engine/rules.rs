//! Preferred-option rules for event choice screens.
//!
//! Rules are configured externally and checked in order against the
//! recognized event text; the first hit decides which option index to click.
//! A rule is either a case-insensitive substring or a full regex.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// One configured preference: when `pattern` appears in the event text,
/// choose option `option` (0-based).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptionRule {
    pub pattern: String,
    /// Interpret `pattern` as a regex instead of a plain substring.
    #[serde(default)]
    pub regex: bool,
    pub option: usize,
}

enum Matcher {
    Substring(String),
    Pattern(Regex),
}

struct CompiledRule {
    matcher: Matcher,
    option: usize,
}

/// The configured rules, compiled once at startup. A malformed regex is a
/// configuration error and prevents automation from starting.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn compile(rules: &[OptionRule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let matcher = if rule.regex {
                let regex = RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("invalid option rule pattern \"{}\"", rule.pattern))?;
                Matcher::Pattern(regex)
            } else {
                Matcher::Substring(rule.pattern.to_lowercase())
            };
            compiled.push(CompiledRule {
                matcher,
                option: rule.option,
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Returns the option index of the first rule matching `text`, if any.
    pub fn match_option(&self, text: &str) -> Option<usize> {
        let lowered = text.to_lowercase();
        for rule in &self.rules {
            let hit = match &rule.matcher {
                Matcher::Substring(needle) => lowered.contains(needle),
                Matcher::Pattern(regex) => regex.is_match(text),
            };
            if hit {
                return Some(rule.option);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Case-insensitive substring scan for error-dialog indicators.
///
/// Dialog messages carry short fixed phrases, so plain substrings suffice
/// here; full regex rules stay with [`RuleSet`].
#[derive(Default)]
pub struct IndicatorSet {
    needles: Vec<String>,
}

impl IndicatorSet {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            needles: patterns.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Returns the first indicator contained in `text`, if any.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.needles
            .iter()
            .find(|needle| lowered.contains(needle.as_str()))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.needles.is_empty()
    }
}
