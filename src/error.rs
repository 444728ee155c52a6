//! Rich diagnostic error types for dpr-tune.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. A convergence failure of the prover is
//! not an error: it travels as [`ProofStatus`](crate::prove::ProofStatus).

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for dpr-tune.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the operator.
#[derive(Debug, Error, Diagnostic)]
pub enum TuneError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Prove(#[from] ProveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Coarse classification of a [`TuneError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A query line, parameter entry, or program entry failed to parse.
    MalformedInput,
    /// An input file is missing or unreadable.
    ResourceFailure,
    /// The prover rejected its inputs or hit an internal inconsistency.
    Prover,
    /// Configuration could not be loaded or is out of range.
    Configuration,
}

impl TuneError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TuneError::Feature(_) => ErrorKind::MalformedInput,
            TuneError::Input(InputError::Resource { .. }) => ErrorKind::ResourceFailure,
            TuneError::Input(_) => ErrorKind::MalformedInput,
            TuneError::Prove(ProveError::Input(e)) => match e {
                InputError::Resource { .. } => ErrorKind::ResourceFailure,
                _ => ErrorKind::MalformedInput,
            },
            TuneError::Prove(_) => ErrorKind::Prover,
            TuneError::Config(_) => ErrorKind::Configuration,
        }
    }
}

// ---------------------------------------------------------------------------
// Feature errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum FeatureError {
    #[error("empty goal expression")]
    #[diagnostic(
        code(dpr::feature::empty),
        help("A goal needs at least a functor, e.g. `edge(a,b)` or `restart`.")
    )]
    Empty,

    #[error("malformed goal \"{input}\": {message}")]
    #[diagnostic(
        code(dpr::feature::malformed),
        help(
            "Goals are written `functor(arg1,arg2,...)` or in comma form \
             `functor,arg1,arg2`. Arguments may not be nested or empty."
        )
    )]
    Malformed { input: String, message: String },
}

// ---------------------------------------------------------------------------
// Input errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InputError {
    #[error("malformed input at {path}:{line}: {message}")]
    #[diagnostic(
        code(dpr::input::malformed),
        help("The offending content was: {content}")
    )]
    Malformed {
        path: String,
        line: usize,
        content: String,
        message: String,
    },

    #[error("malformed {entry} in {path}: {message}")]
    #[diagnostic(
        code(dpr::input::malformed_entry),
        help("The offending content was: {content}")
    )]
    MalformedEntry {
        path: String,
        entry: String,
        content: String,
        message: String,
    },

    #[error("cannot read {path}: {source}")]
    #[diagnostic(
        code(dpr::input::resource),
        help("Check that the file exists and is readable.")
    )]
    Resource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid parameter \"{key}\": {message}")]
    #[diagnostic(
        code(dpr::input::parameter),
        help("Parameter keys must be well-formed goals and values finite reals.")
    )]
    Parameter { key: String, message: String },
}

// ---------------------------------------------------------------------------
// Prover errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ProveError {
    #[error("invalid threshold configuration: alpha={alpha}, eps={eps}")]
    #[diagnostic(
        code(dpr::prove::invalid_threshold),
        help("Both alpha and eps must be finite and strictly positive.")
    )]
    InvalidThreshold { alpha: f64, eps: f64 },

    #[error("query {query} has no start state in the proof graph")]
    #[diagnostic(
        code(dpr::prove::unknown_query),
        help(
            "The program has no state labelled with this goal. \
             Check the query spelling against the `from` labels in the program."
        )
    )]
    UnknownQuery { query: String },

    #[error("edge weight {weight} out of state {state} is not a finite non-negative number")]
    #[diagnostic(
        code(dpr::prove::bad_weight),
        help(
            "The weighting scheme produced a negative or non-finite edge weight. \
             Use a squashing scheme such as `sigmoid` or `exp` with signed parameters."
        )
    )]
    InvalidWeight { state: String, weight: f64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Input(#[from] InputError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(dpr::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(dpr::config::parse),
        help("Check the TOML syntax and field names in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(dpr::config::invalid))]
    Invalid { message: String },
}

/// Convenience alias for functions returning dpr-tune results.
pub type TuneResult<T> = std::result::Result<T, TuneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_error_converts_to_tune_error() {
        let err = FeatureError::Empty;
        let tune: TuneError = err.into();
        assert!(matches!(tune, TuneError::Feature(FeatureError::Empty)));
        assert_eq!(tune.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn resource_failure_is_distinct_from_malformed_input() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let resource: TuneError = InputError::Resource {
            path: "q.tsv".into(),
            source: io,
        }
        .into();
        assert_eq!(resource.kind(), ErrorKind::ResourceFailure);

        let malformed: TuneError = InputError::Malformed {
            path: "q.tsv".into(),
            line: 3,
            content: "foo((".into(),
            message: "unbalanced".into(),
        }
        .into();
        assert_eq!(malformed.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn input_error_inside_prover_keeps_its_kind() {
        let err: TuneError = ProveError::from(InputError::Parameter {
            key: "x".into(),
            message: "nan".into(),
        })
        .into();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = ProveError::InvalidThreshold {
            alpha: -0.5,
            eps: 0.001,
        };
        let msg = format!("{err}");
        assert!(msg.contains("-0.5"));
        assert!(msg.contains("0.001"));

        let err = InputError::Malformed {
            path: "queries.tsv".into(),
            line: 7,
            content: "bad".into(),
            message: "empty functor".into(),
        };
        assert!(format!("{err}").contains("queries.tsv:7"));
    }
}
