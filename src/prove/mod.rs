//! Approximate proof oracle contract.
//!
//! The calibrator only needs three things from a prover: a threshold
//! configuration to run under, a query, and an answer of "proved" or
//! "could not certify at this threshold". A convergence failure is an expected
//! outcome and is returned as [`ProofStatus::ConvergenceFailure`]; `Err` is
//! reserved for inputs the prover cannot work with at all.

pub mod dpr;
pub mod graph;

use serde::{Deserialize, Serialize};

use crate::corpus::Query;
use crate::error::ProveError;

/// System-wide default (and calibration ceiling) for alpha.
pub const ALPHA_DEFAULT: f64 = 0.001;
/// System-wide default for eps; `EPS_DEFAULT / ALPHA_DEFAULT` is the shape ratio.
pub const EPS_DEFAULT: f64 = 0.0001;

/// Result type for prover operations.
pub type ProveResult<T> = std::result::Result<T, ProveError>;

/// The (alpha, eps) pair one prover run is parameterized by.
///
/// Both values are finite and strictly positive; construction rejects anything
/// else, so no search work ever starts on an invalid pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    alpha: f64,
    eps: f64,
}

impl ThresholdConfig {
    pub fn new(alpha: f64, eps: f64) -> ProveResult<Self> {
        let valid = |x: f64| x.is_finite() && x > 0.0;
        if !valid(alpha) || !valid(eps) {
            return Err(ProveError::InvalidThreshold { alpha, eps });
        }
        Ok(Self { alpha, eps })
    }

    /// Config for `alpha` with eps rescaled to keep the default shape ratio:
    /// `eps = alpha * eps_default / alpha_default`.
    pub fn scaled(alpha: f64, alpha_default: f64, eps_default: f64) -> ProveResult<Self> {
        Self::new(alpha, alpha * (eps_default / alpha_default))
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            alpha: ALPHA_DEFAULT,
            eps: EPS_DEFAULT,
        }
    }
}

/// A successful proof: solution states with their normalized scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofResult {
    /// `(state label, score)`, highest score first.
    pub solutions: Vec<(String, f64)>,
    /// Push operations performed.
    pub pushes: usize,
}

/// Why a proof could not be certified under the current thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum ConvergenceFailure {
    /// A state's restart probability is below the configured alpha.
    MinAlpha {
        state: String,
        local_alpha: f64,
        alpha: f64,
    },
    /// The push budget ran out before all residuals fell under eps.
    PushBudget { pushes: usize },
}

impl std::fmt::Display for ConvergenceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvergenceFailure::MinAlpha {
                state,
                local_alpha,
                alpha,
            } => write!(
                f,
                "local alpha {local_alpha:.6} at {state} is below minalpha {alpha:.6}"
            ),
            ConvergenceFailure::PushBudget { pushes } => {
                write!(f, "push budget exhausted after {pushes} pushes")
            }
        }
    }
}

/// Outcome of one proof attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofStatus {
    Proved(ProofResult),
    ConvergenceFailure(ConvergenceFailure),
}

impl ProofStatus {
    pub fn is_proved(&self) -> bool {
        matches!(self, ProofStatus::Proved(_))
    }
}

/// Anything that can attempt a proof under a threshold configuration.
///
/// Implementations must terminate for every valid [`ThresholdConfig`].
pub trait ProofOracle {
    fn prove_state(&self, config: &ThresholdConfig, query: &Query) -> ProveResult<ProofStatus>;
}

impl<F> ProofOracle for F
where
    F: Fn(&ThresholdConfig, &Query) -> ProveResult<ProofStatus>,
{
    fn prove_state(&self, config: &ThresholdConfig, query: &Query) -> ProveResult<ProofStatus> {
        self(config, query)
    }
}
