// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # dpr-tune
//!
//! Edge weighting and threshold calibration for approximate
//! personalized-PageRank proof search over weighted logic programs.
//!
//! ## Architecture
//!
//! - **Features** (`feature`): parsed, normalized goals used as weight keys
//! - **Weighting** (`weight`): learned weight vectors, pluggable combination
//!   schemes, and a weighter that reports unseen features once via a Bloom filter
//! - **Proving** (`prove`): the threshold/oracle contract plus a push-based
//!   approximate PPR prover over ground proof graphs (petgraph)
//! - **Calibration** (`tune`): step-halving search for the tightest viable alpha
//!   over a query corpus
//!
//! ## Library usage
//!
//! ```no_run
//! use dpr_tune::corpus::QueryCorpus;
//! use dpr_tune::prove::dpr::DprProver;
//! use dpr_tune::prove::graph::ProofGraph;
//! use dpr_tune::tune::{CalibrationConfig, ParameterCalibrator};
//! use dpr_tune::weight::weighter::FeatureWeighter;
//!
//! let graph = ProofGraph::load("program.json".as_ref()).unwrap();
//! let corpus = QueryCorpus::load("queries.tsv".as_ref()).unwrap();
//! let weighter = FeatureWeighter::uniform();
//! let prover = DprProver::new(&graph, &weighter);
//! let report = ParameterCalibrator::new(&prover, CalibrationConfig::default())
//!     .tune(&corpus, 0.001)
//!     .unwrap();
//! println!("{report}");
//! ```

pub mod config;
pub mod corpus;
pub mod error;
pub mod feature;
pub mod params;
pub mod prove;
pub mod tune;
pub mod weight;
