//! Minimum-alpha calibration.
//!
//! [`ParameterCalibrator`] searches for the alpha at which every query of a
//! corpus still proves, using a fixed geometric step schedule instead of true
//! bisection: the step `delta` halves on every iteration whatever the outcome,
//! a fully successful corpus pass raises alpha by `delta`, and a convergence
//! failure lowers it by `delta`. The run ends after `max_iter` passes, when
//! `delta` drops below `min_delta` after at least one success, or when alpha
//! climbs past the system default, whichever comes first. eps follows alpha at
//! the default `eps / alpha` ratio throughout.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::corpus::QueryCorpus;
use crate::error::{ConfigError, TuneResult};
use crate::prove::{
    ALPHA_DEFAULT, ConvergenceFailure, EPS_DEFAULT, ProofOracle, ProofStatus, ThresholdConfig,
};

/// Default iteration budget.
pub const MAX_ITER: usize = 50;
/// Default precision floor for the step size.
pub const MIN_DELTA: f64 = 1e-10;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Constants governing one calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Maximum number of full corpus passes.
    pub max_iter: usize,
    /// Stop once the step is this small and some pass has succeeded.
    pub min_delta: f64,
    /// Default alpha; also the ceiling the search will not go past.
    pub alpha_default: f64,
    /// Default eps, paired with `alpha_default` to fix the eps/alpha ratio.
    pub eps_default: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_iter: MAX_ITER,
            min_delta: MIN_DELTA,
            alpha_default: ALPHA_DEFAULT,
            eps_default: EPS_DEFAULT,
        }
    }
}

impl CalibrationConfig {
    /// The fixed eps/alpha shape ratio.
    pub fn ratio(&self) -> f64 {
        self.eps_default / self.alpha_default
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &str, x: f64| {
            if x.is_finite() && x > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    message: format!("{name} must be finite and > 0, got {x}"),
                })
            }
        };
        positive("min_delta", self.min_delta)?;
        positive("alpha_default", self.alpha_default)?;
        positive("eps_default", self.eps_default)?;
        if self.max_iter == 0 {
            return Err(ConfigError::Invalid {
                message: "max_iter must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Working memory of one tuning run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationState {
    pub alpha: f64,
    pub delta: f64,
    pub succeeded_once: bool,
    pub iteration: usize,
    /// Alpha of the most recent trial.
    pub last_good: f64,
}

impl CalibrationState {
    pub fn new(start: f64) -> Self {
        Self {
            alpha: start,
            delta: start,
            succeeded_once: false,
            iteration: 0,
            last_good: start,
        }
    }

    /// Which stopping rule, if any, fires before the next trial.
    pub fn stop_reason(&self, config: &CalibrationConfig) -> Option<StopReason> {
        if self.iteration >= config.max_iter {
            Some(StopReason::IterationCap)
        } else if self.succeeded_once && self.delta < config.min_delta {
            Some(StopReason::Converged)
        } else if self.alpha > config.alpha_default {
            Some(StopReason::CeilingReached)
        } else {
            None
        }
    }
}

/// Why a run stopped. None of these is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The step fell below `min_delta` after a successful pass.
    Converged,
    /// Alpha exceeded the default ceiling.
    CeilingReached,
    /// `max_iter` passes were used.
    IterationCap,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Converged => write!(f, "minimum delta reached"),
            StopReason::CeilingReached => write!(f, "alpha exceeds maximum threshold"),
            StopReason::IterationCap => write!(f, "iteration budget exhausted"),
        }
    }
}

/// Result of one corpus pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrialOutcome {
    /// Every query proved.
    Succeeded,
    /// `query` could not be certified; the rest of the corpus was skipped.
    ConvergenceFailure {
        query: String,
        failure: ConvergenceFailure,
    },
    /// The trial alpha was not a valid threshold; nothing was run.
    Rejected { message: String },
}

/// One iteration of the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub alpha: f64,
    pub eps: f64,
    /// Step size after this trial's halving.
    pub delta: f64,
    pub outcome: TrialOutcome,
}

/// What a finished run reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Alpha of the last trial run.
    pub alpha: f64,
    /// eps paired with `alpha`.
    pub eps: f64,
    /// Final step size, the uncertainty on `alpha`.
    pub delta: f64,
    pub iterations: usize,
    pub stop: StopReason,
    /// Largest alpha whose full corpus pass succeeded.
    pub best_success: Option<f64>,
    pub trials: Vec<Trial>,
}

impl std::fmt::Display for CalibrationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Reached minalpha {} +/- {} in {} iterations ({})",
            self.alpha, self.delta, self.iterations, self.stop
        )
    }
}

/// Adaptive step-halving search for the tightest viable alpha.
pub struct ParameterCalibrator<'a, O: ProofOracle + ?Sized> {
    oracle: &'a O,
    config: CalibrationConfig,
}

impl<'a, O: ProofOracle + ?Sized> ParameterCalibrator<'a, O> {
    pub fn new(oracle: &'a O, config: CalibrationConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Run the search from `start` over `corpus`.
    ///
    /// Convergence failures steer the search and never escape it. Any other
    /// prover error aborts the run and no alpha is reported.
    pub fn tune(&self, corpus: &QueryCorpus, start: f64) -> TuneResult<CalibrationReport> {
        self.config.validate()?;
        let ratio = self.config.ratio();
        ThresholdConfig::new(start, start * ratio)?;
        if corpus.is_empty() {
            tracing::warn!(source = corpus.source(), "query corpus is empty; every pass succeeds");
        }
        tracing::info!(start, queries = corpus.len(), "tuning with initial alpha");

        let mut state = CalibrationState::new(start);
        let mut trials = Vec::new();
        let mut best_success: Option<f64> = None;

        let stop = loop {
            if let Some(reason) = state.stop_reason(&self.config) {
                tracing::info!(%reason, "stopping");
                break reason;
            }

            state.last_good = state.alpha;
            let eps = state.alpha * ratio;
            tracing::info!(alpha = state.alpha, eps, "trying minalpha");
            state.delta /= 2.0;

            let outcome = match ThresholdConfig::new(state.alpha, eps) {
                Ok(threshold) => self.run_corpus(&threshold, corpus)?,
                Err(e) => {
                    tracing::warn!(alpha = state.alpha, "rejecting trial: {e}");
                    TrialOutcome::Rejected {
                        message: e.to_string(),
                    }
                }
            };

            if outcome == TrialOutcome::Succeeded {
                state.succeeded_once = true;
                best_success = Some(best_success.map_or(state.alpha, |b| b.max(state.alpha)));
                state.alpha += state.delta;
                tracing::info!("succeeded, increasing alpha");
            } else {
                state.alpha -= state.delta;
                tracing::info!("failed, decreasing alpha");
            }

            trials.push(Trial {
                alpha: state.last_good,
                eps,
                delta: state.delta,
                outcome,
            });
            state.iteration += 1;
        };

        let report = CalibrationReport {
            alpha: state.last_good,
            eps: state.last_good * ratio,
            delta: state.delta,
            iterations: state.iteration,
            stop,
            best_success,
            trials,
        };
        tracing::info!(
            alpha = report.alpha,
            delta = report.delta,
            iterations = report.iterations,
            "reached minalpha"
        );
        Ok(report)
    }

    /// Prove every query under `threshold`, stopping at the first failure.
    fn run_corpus(
        &self,
        threshold: &ThresholdConfig,
        corpus: &QueryCorpus,
    ) -> TuneResult<TrialOutcome> {
        let started = Instant::now();
        let mut last_report = started;
        for (done, query) in corpus.iter().enumerate() {
            if last_report.elapsed() > PROGRESS_INTERVAL {
                tracing::info!(done, total = corpus.len(), "queries...");
                last_report = Instant::now();
            }
            match self.oracle.prove_state(threshold, query)? {
                ProofStatus::Proved(_) => {}
                ProofStatus::ConvergenceFailure(failure) => {
                    tracing::info!(query = %query, %failure, "convergence failure");
                    return Ok(TrialOutcome::ConvergenceFailure {
                        query: query.to_string(),
                        failure,
                    });
                }
            }
        }
        tracing::debug!(elapsed = ?started.elapsed(), "corpus pass succeeded");
        Ok(TrialOutcome::Succeeded)
    }
}
