//! Search configuration with environment-variable overrides.
//!
//! Every knob has a built-in default and can be overridden through a
//! `BFS_`-prefixed environment variable, so host processes configure the
//! search without touching code. Unparseable values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// When the orchestrator runs the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorMode {
    /// Inject a synthesize/validate pair once the value trigger fires.
    Action,
    /// Validate every `validation_period` iterations.
    Periodic,
    /// Union of `Action` and `Periodic`.
    Both,
}

impl FromStr for ValidatorMode {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "action" => Ok(Self::Action),
            "periodic" => Ok(Self::Periodic),
            "both" => Ok(Self::Both),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ValidatorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Action => write!(f, "action"),
            Self::Periodic => write!(f, "periodic"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// Configuration for the BFS orchestrator and its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Hard iteration cap for a single task (default: 40).
    pub max_iterations: u32,
    /// Number of plans kept on the frontier (default: 4).
    pub beam_width: usize,
    /// Validation scheduling mode (default: action).
    pub validator_mode: ValidatorMode,
    /// Estimated-value threshold that triggers a validation round (default: 0.8).
    pub value_trigger: f64,
    /// Minimum iterations between validation rounds (default: 2).
    pub validation_cooldown: u32,
    /// Validation interval for periodic mode (default: 5).
    pub validation_period: u32,
    /// Minimum validator confidence to accept completion (default: 0.7).
    pub validator_confidence: f64,
    /// Score bonus for plans matching validator hints (default: 0.35).
    pub hint_boost: f64,
    /// Extra bonus for `implement_code` / `test_example` plans (default: 0.10).
    pub special_hint_boost: f64,
    /// Score penalty for re-proposing a recently executed action (default: 0.3).
    pub duplicate_penalty: f64,
    /// Duplicate-action count that declares a loop (default: 3).
    pub loop_max_duplicates: u32,
    /// Validation-action count that declares a loop (default: 5).
    pub loop_max_validations: u32,
    /// Task context age limit in minutes (default: 60).
    pub task_ttl_minutes: i64,
    /// Directory unsafe file paths are rewritten into (default: "./workspace").
    pub workspace_dir: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            beam_width: 4,
            validator_mode: ValidatorMode::Action,
            value_trigger: 0.8,
            validation_cooldown: 2,
            validation_period: 5,
            validator_confidence: 0.7,
            hint_boost: 0.35,
            special_hint_boost: 0.10,
            duplicate_penalty: 0.3,
            loop_max_duplicates: 3,
            loop_max_validations: 5,
            task_ttl_minutes: 60,
            workspace_dir: "./workspace".to_string(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl SearchConfig {
    /// Build a configuration from `BFS_*` environment variables,
    /// falling back to defaults for unset or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: env_parse("BFS_MAX_ITERATIONS", defaults.max_iterations),
            beam_width: env_parse("BFS_BEAM_WIDTH", defaults.beam_width),
            validator_mode: env_parse("BFS_VALIDATOR_MODE", defaults.validator_mode),
            value_trigger: env_parse("BFS_VALUE_TRIGGER", defaults.value_trigger),
            validation_cooldown: env_parse("BFS_VALIDATION_COOLDOWN", defaults.validation_cooldown),
            validation_period: env_parse("BFS_VALIDATION_PERIOD", defaults.validation_period),
            validator_confidence: env_parse("BFS_VALIDATOR_CONF", defaults.validator_confidence),
            hint_boost: env_parse("BFS_HINT_BOOST", defaults.hint_boost),
            special_hint_boost: env_parse("BFS_SPECIAL_HINT_BOOST", defaults.special_hint_boost),
            duplicate_penalty: env_parse("BFS_DUPLICATE_PENALTY", defaults.duplicate_penalty),
            loop_max_duplicates: env_parse("BFS_LOOP_MAX_DUPLICATES", defaults.loop_max_duplicates),
            loop_max_validations: env_parse(
                "BFS_LOOP_MAX_VALIDATIONS",
                defaults.loop_max_validations,
            ),
            task_ttl_minutes: env_parse("BFS_TASK_TTL_MINUTES", defaults.task_ttl_minutes),
            workspace_dir: std::env::var("BFS_WORKSPACE_DIR")
                .unwrap_or(defaults.workspace_dir),
        }
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the beam width (minimum 1).
    pub fn with_beam_width(mut self, width: usize) -> Self {
        self.beam_width = width.max(1);
        self
    }

    /// Set the validator scheduling mode.
    pub fn with_validator_mode(mut self, mode: ValidatorMode) -> Self {
        self.validator_mode = mode;
        self
    }

    /// Set the validator confidence threshold.
    pub fn with_validator_confidence(mut self, confidence: f64) -> Self {
        self.validator_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the value trigger for action-mode validation.
    pub fn with_value_trigger(mut self, trigger: f64) -> Self {
        self.value_trigger = trigger.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = SearchConfig::default();
        assert_eq!(config.max_iterations, 40);
        assert_eq!(config.beam_width, 4);
        assert_eq!(config.validator_mode, ValidatorMode::Action);
        assert_eq!(config.value_trigger, 0.8);
        assert_eq!(config.validation_cooldown, 2);
        assert_eq!(config.validator_confidence, 0.7);
        assert_eq!(config.hint_boost, 0.35);
        assert_eq!(config.special_hint_boost, 0.10);
        assert_eq!(config.loop_max_duplicates, 3);
        assert_eq!(config.loop_max_validations, 5);
        assert_eq!(config.task_ttl_minutes, 60);
    }

    #[test]
    fn test_validator_mode_parsing() {
        assert_eq!("action".parse(), Ok(ValidatorMode::Action));
        assert_eq!("Periodic".parse(), Ok(ValidatorMode::Periodic));
        assert_eq!("BOTH".parse(), Ok(ValidatorMode::Both));
        assert_eq!("sometimes".parse::<ValidatorMode>(), Err(()));
    }

    #[test]
    fn test_builder_clamps() {
        let config = SearchConfig::default()
            .with_beam_width(0)
            .with_validator_confidence(1.5);
        assert_eq!(config.beam_width, 1);
        assert_eq!(config.validator_confidence, 1.0);
    }
}
