//! TOML configuration for every tunable constant.
//!
//! Every field has a default, so an empty file (or no file) yields the stock
//! settings. Command-line flags override what is loaded here.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::prove::dpr::DEFAULT_MAX_PUSHES;
use crate::prove::{ALPHA_DEFAULT, EPS_DEFAULT};
use crate::tune::{CalibrationConfig, MAX_ITER, MIN_DELTA};
use crate::weight::SchemeKind;
use crate::weight::weighter::{
    UNKNOWN_FEATURE_CAPACITY, UNKNOWN_FEATURE_FP_RATE, UnknownFeatureLog,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TuneConfig {
    #[serde(default)]
    pub calibration: CalibrationSection,
    #[serde(default)]
    pub weighting: WeightingSection,
    #[serde(default)]
    pub prover: ProverSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSection {
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_min_delta")]
    pub min_delta: f64,
    #[serde(default = "default_alpha")]
    pub alpha_default: f64,
    #[serde(default = "default_eps")]
    pub eps_default: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingSection {
    #[serde(default)]
    pub scheme: SchemeKind,
    #[serde(default = "default_capacity")]
    pub unknown_feature_capacity: usize,
    #[serde(default = "default_fp_rate")]
    pub unknown_feature_fp_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProverSection {
    #[serde(default = "default_max_pushes")]
    pub max_pushes: usize,
}

fn default_max_iter() -> usize {
    MAX_ITER
}
fn default_min_delta() -> f64 {
    MIN_DELTA
}
fn default_alpha() -> f64 {
    ALPHA_DEFAULT
}
fn default_eps() -> f64 {
    EPS_DEFAULT
}
fn default_capacity() -> usize {
    UNKNOWN_FEATURE_CAPACITY
}
fn default_fp_rate() -> f64 {
    UNKNOWN_FEATURE_FP_RATE
}
fn default_max_pushes() -> usize {
    DEFAULT_MAX_PUSHES
}

impl Default for CalibrationSection {
    fn default() -> Self {
        Self {
            max_iter: default_max_iter(),
            min_delta: default_min_delta(),
            alpha_default: default_alpha(),
            eps_default: default_eps(),
        }
    }
}

impl Default for WeightingSection {
    fn default() -> Self {
        Self {
            scheme: SchemeKind::default(),
            unknown_feature_capacity: default_capacity(),
            unknown_feature_fp_rate: default_fp_rate(),
        }
    }
}

impl Default for ProverSection {
    fn default() -> Self {
        Self {
            max_pushes: default_max_pushes(),
        }
    }
}

impl TuneConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Parse TOML text and validate; `source` names it in errors.
    pub fn from_toml_str(content: &str, source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: source.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.calibration().validate()?;
        let w = &self.weighting;
        if !(w.unknown_feature_fp_rate > 0.0 && w.unknown_feature_fp_rate < 1.0) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "unknown_feature_fp_rate must be in (0, 1), got {}",
                    w.unknown_feature_fp_rate
                ),
            });
        }
        if w.unknown_feature_capacity == 0 {
            return Err(ConfigError::Invalid {
                message: "unknown_feature_capacity must be at least 1".into(),
            });
        }
        if self.prover.max_pushes == 0 {
            return Err(ConfigError::Invalid {
                message: "max_pushes must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Calibration constants as the calibrator takes them.
    pub fn calibration(&self) -> CalibrationConfig {
        CalibrationConfig {
            max_iter: self.calibration.max_iter,
            min_delta: self.calibration.min_delta,
            alpha_default: self.calibration.alpha_default,
            eps_default: self.calibration.eps_default,
        }
    }

    /// A fresh unknown-feature log sized from this config.
    pub fn unknown_feature_log(&self) -> UnknownFeatureLog {
        UnknownFeatureLog::new(
            self.weighting.unknown_feature_fp_rate,
            self.weighting.unknown_feature_capacity,
        )
    }
}
