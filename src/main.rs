//! dpr-tune CLI: minimum-alpha calibration for approximate PPR proof search.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use dpr_tune::config::TuneConfig;
use dpr_tune::corpus::{Query, QueryCorpus};
use dpr_tune::params::read_param_vec;
use dpr_tune::prove::dpr::DprProver;
use dpr_tune::prove::graph::ProofGraph;
use dpr_tune::prove::{ProofOracle, ProofStatus, ThresholdConfig};
use dpr_tune::tune::ParameterCalibrator;
use dpr_tune::weight::{FeatureDictionary, SchemeKind};
use dpr_tune::weight::weighter::FeatureWeighter;

#[derive(Parser)]
#[command(
    name = "dpr-tune",
    version,
    about = "Calibrate the minimum restart probability of approximate PPR proof search"
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Weighting scheme (linear, sigmoid, tanh, exp); overrides the config.
    #[arg(long, global = true)]
    scheme: Option<SchemeKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for the tightest alpha at which every query still proves.
    Tune {
        /// Proof graph in JSON form.
        #[arg(long)]
        program: PathBuf,

        /// Query corpus, one goal per line (first tab-separated field).
        #[arg(long)]
        queries: PathBuf,

        /// Learned parameters, `goal<TAB>weight` per line.
        #[arg(long)]
        params: Option<PathBuf>,

        /// Initial alpha (defaults to the configured alpha_default).
        #[arg(long)]
        start: Option<f64>,

        /// Maximum number of corpus passes; overrides the config.
        #[arg(long)]
        max_iter: Option<usize>,

        /// Print the full calibration report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Prove a single query and print its ranked solutions.
    Prove {
        /// Proof graph in JSON form.
        #[arg(long)]
        program: PathBuf,

        /// Goal to prove, e.g. "samebib(a,Y)".
        #[arg(long)]
        query: String,

        /// Learned parameters, `goal<TAB>weight` per line.
        #[arg(long)]
        params: Option<PathBuf>,

        /// Minimum restart probability (defaults to the configured alpha_default).
        #[arg(long)]
        alpha: Option<f64>,

        /// Residual tolerance (defaults to alpha scaled by the default eps/alpha ratio).
        #[arg(long)]
        eps: Option<f64>,
    },

    /// Score one feature dictionary against a parameter vector.
    Score {
        /// Learned parameters, `goal<TAB>weight` per line.
        #[arg(long)]
        params: Option<PathBuf>,

        /// Feature counts, e.g. "foo(a)=1,bar(b)=3".
        #[arg(long)]
        features: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TuneConfig::load(path)?,
        None => TuneConfig::default(),
    };
    if let Some(scheme) = cli.scheme {
        config.weighting.scheme = scheme;
    }

    match cli.command {
        Commands::Tune {
            program,
            queries,
            params,
            start,
            max_iter,
            json,
        } => {
            if let Some(max_iter) = max_iter {
                config.calibration.max_iter = max_iter;
            }
            config.validate()?;

            let graph = ProofGraph::load(&program)?;
            let corpus = QueryCorpus::load(&queries)?;
            let weighter = build_weighter(&config, params.as_deref())?;
            let prover =
                DprProver::new(&graph, &weighter).with_max_pushes(config.prover.max_pushes);

            let calibrator = ParameterCalibrator::new(&prover, config.calibration());
            let start = start.unwrap_or(config.calibration.alpha_default);
            let report = calibrator.tune(&corpus, start)?;

            if json {
                let out = serde_json::to_string_pretty(&report).into_diagnostic()?;
                println!("{out}");
            } else {
                println!("{report}");
                if let Some(best) = report.best_success {
                    println!("  best fully-proved alpha: {best}");
                }
                println!("  eps: {}", report.eps);
                println!(
                    "  unknown features reported: {}",
                    weighter.unknown_features().reported()
                );
            }
        }

        Commands::Prove {
            program,
            query,
            params,
            alpha,
            eps,
        } => {
            config.validate()?;
            let graph = ProofGraph::load(&program)?;
            let weighter = build_weighter(&config, params.as_deref())?;
            let prover =
                DprProver::new(&graph, &weighter).with_max_pushes(config.prover.max_pushes);

            let cal = config.calibration();
            let alpha = alpha.unwrap_or(cal.alpha_default);
            let threshold = match eps {
                Some(eps) => ThresholdConfig::new(alpha, eps)?,
                None => ThresholdConfig::scaled(alpha, cal.alpha_default, cal.eps_default)?,
            };
            let query = Query::parse_line(&query, 0)?;

            match prover.prove_state(&threshold, &query)? {
                ProofStatus::Proved(result) => {
                    println!(
                        "Proved {query} (alpha={}, eps={}) in {} pushes",
                        threshold.alpha(),
                        threshold.eps(),
                        result.pushes
                    );
                    if result.solutions.is_empty() {
                        println!("  no solutions reached");
                    }
                    for (i, (label, score)) in result.solutions.iter().enumerate() {
                        println!("  {:>3}. {label:<40} {score:.6}", i + 1);
                    }
                }
                ProofStatus::ConvergenceFailure(failure) => {
                    println!("Could not certify {query}: {failure}");
                }
            }
        }

        Commands::Score { params, features } => {
            config.validate()?;
            let weighter = build_weighter(&config, params.as_deref())?;
            let dictionary = FeatureDictionary::from_assignments(&features)?;
            let score = weighter.score(&dictionary);
            println!("{score}");
        }
    }

    Ok(())
}

fn build_weighter(config: &TuneConfig, params: Option<&Path>) -> Result<FeatureWeighter> {
    let params = match params {
        Some(path) => read_param_vec(path)?,
        None => Default::default(),
    };
    let weighter = FeatureWeighter::from_param_vec(
        params,
        config.weighting.scheme.build(),
        config.unknown_feature_log(),
    )?;
    Ok(weighter)
}
