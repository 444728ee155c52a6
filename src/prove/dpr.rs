//! Push-based approximate personalized PageRank prover.
//!
//! Every state `u` has its weighted outlinks plus a restart link back to the
//! query state. The prover keeps an estimate `p` and a residual `r`, starting
//! with all residual mass on the query state, and repeatedly pushes any state
//! whose residual exceeds `eps * degree(u)`:
//!
//! 1. `p[u] += alpha * r[u]`
//! 2. the remaining `(1 - alpha) * r[u]` is spread over the outlinks and the
//!    restart link in proportion to their weights
//! 3. `r[u] = 0`
//!
//! Each push settles at least `alpha * eps` of the unit mass, so a run makes at
//! most `1 / (alpha * eps)` pushes. The scheme is only sound if the restart link
//! carries at least `alpha` of a state's outgoing weight; a state whose local
//! restart probability falls below `alpha` ends the attempt with
//! [`ConvergenceFailure::MinAlpha`].

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;

use crate::corpus::Query;
use crate::error::ProveError;
use crate::weight::FeatureDictionary;
use crate::weight::weighter::FeatureWeighter;

use super::graph::ProofGraph;
use super::{
    ConvergenceFailure, ProofOracle, ProofResult, ProofStatus, ProveResult, ThresholdConfig,
};

/// Default cap on pushes per proof attempt.
pub const DEFAULT_MAX_PUSHES: usize = 10_000_000;

/// Weighted outlinks of one state, computed once per attempt.
struct Links {
    targets: Vec<(NodeIndex, f64)>,
    total: f64,
}

/// Approximate PPR prover over a [`ProofGraph`].
pub struct DprProver<'a> {
    graph: &'a ProofGraph,
    weighter: &'a FeatureWeighter,
    max_pushes: usize,
}

impl<'a> DprProver<'a> {
    pub fn new(graph: &'a ProofGraph, weighter: &'a FeatureWeighter) -> Self {
        Self {
            graph,
            weighter,
            max_pushes: DEFAULT_MAX_PUSHES,
        }
    }

    /// Cap the number of pushes per attempt.
    pub fn with_max_pushes(mut self, max_pushes: usize) -> Self {
        self.max_pushes = max_pushes.max(1);
        self
    }

    fn edge_weight(&self, state: NodeIndex, features: &FeatureDictionary) -> ProveResult<f64> {
        let weight = self.weighter.score(features);
        if !weight.is_finite() || weight < 0.0 {
            return Err(ProveError::InvalidWeight {
                state: self.graph.label(state).to_string(),
                weight,
            });
        }
        Ok(weight)
    }

    fn links(&self, state: NodeIndex) -> ProveResult<Links> {
        let mut targets = Vec::with_capacity(self.graph.out_degree(state));
        let mut total = 0.0;
        for (target, features) in self.graph.outlinks(state) {
            let w = self.edge_weight(state, features)?;
            total += w;
            targets.push((target, w));
        }
        Ok(Links { targets, total })
    }

    fn degree(&self, state: NodeIndex) -> f64 {
        // Outlinks plus the restart link.
        (self.graph.out_degree(state) + 1) as f64
    }
}

impl ProofOracle for DprProver<'_> {
    fn prove_state(&self, config: &ThresholdConfig, query: &Query) -> ProveResult<ProofStatus> {
        let start = self
            .graph
            .start_state(query)
            .ok_or_else(|| ProveError::UnknownQuery {
                query: query.to_string(),
            })?;
        let alpha = config.alpha();
        let eps = config.eps();
        let restart = self.edge_weight(start, self.graph.restart_features())?;

        let mut estimate: HashMap<NodeIndex, f64> = HashMap::new();
        let mut residual: HashMap<NodeIndex, f64> = HashMap::from([(start, 1.0)]);
        let mut cache: HashMap<NodeIndex, Links> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut queued = HashSet::from([start]);
        let mut pushes = 0usize;

        while let Some(u) = queue.pop_front() {
            queued.remove(&u);
            let ru = residual.get(&u).copied().unwrap_or(0.0);
            if ru <= eps * self.degree(u) {
                continue;
            }
            if pushes >= self.max_pushes {
                return Ok(ProofStatus::ConvergenceFailure(
                    ConvergenceFailure::PushBudget { pushes },
                ));
            }

            if !cache.contains_key(&u) {
                let links = self.links(u)?;
                cache.insert(u, links);
            }
            let links = &cache[&u];
            let z = restart + links.total;
            let local_alpha = if z > 0.0 { restart / z } else { 1.0 };
            if local_alpha < alpha {
                tracing::debug!(
                    query = %query,
                    state = self.graph.label(u),
                    local_alpha,
                    alpha,
                    "local restart probability below minalpha"
                );
                return Ok(ProofStatus::ConvergenceFailure(
                    ConvergenceFailure::MinAlpha {
                        state: self.graph.label(u).to_string(),
                        local_alpha,
                        alpha,
                    },
                ));
            }

            pushes += 1;
            *estimate.entry(u).or_insert(0.0) += alpha * ru;
            residual.insert(u, 0.0);

            let spread = (1.0 - alpha) * ru;
            let mut touched: Vec<(NodeIndex, f64)> = Vec::with_capacity(links.targets.len() + 1);
            if z > 0.0 {
                touched.extend(
                    links
                        .targets
                        .iter()
                        .filter(|(_, w)| *w > 0.0)
                        .map(|(v, w)| (*v, spread * w / z)),
                );
                touched.push((start, spread * restart / z));
            } else {
                touched.push((start, spread));
            }
            for (v, mass) in touched {
                let rv = residual.entry(v).or_insert(0.0);
                *rv += mass;
                if *rv > eps * self.degree(v) && queued.insert(v) {
                    queue.push_back(v);
                }
            }
        }

        let mut solutions: Vec<(String, f64)> = estimate
            .iter()
            .filter(|(state, _)| self.graph.is_solution(**state))
            .map(|(state, score)| (self.graph.label(*state).to_string(), *score))
            .collect();
        let total: f64 = solutions.iter().map(|(_, s)| s).sum();
        if total > 0.0 {
            solutions.iter_mut().for_each(|(_, s)| *s /= total);
        }
        solutions.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        tracing::debug!(
            query = %query,
            pushes,
            solutions = solutions.len(),
            "proof converged"
        );
        Ok(ProofStatus::Proved(ProofResult { solutions, pushes }))
    }
}
