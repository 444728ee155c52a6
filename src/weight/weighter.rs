//! Feature weighter: scores proof edges and reports unknown features once.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{FeatureError, InputError};
use crate::feature::Feature;

use super::bloom::BloomFilter;
use super::{
    DEFAULT_WEIGHT, FeatureDictionary, LinearWeightingScheme, WeightVector, WeightingScheme,
};

/// Default target false-positive rate of the unknown-feature filter.
pub const UNKNOWN_FEATURE_FP_RATE: f64 = 0.01;
/// Default expected number of distinct unknown features.
pub const UNKNOWN_FEATURE_CAPACITY: usize = 100;

/// Once-per-feature diagnostics for features missing from the weight vector.
///
/// Membership is tracked in a [`BloomFilter`], so a false positive can swallow
/// the warning for a feature never seen before. Scoring never consults this
/// log, so that only ever costs a diagnostic.
#[derive(Debug)]
pub struct UnknownFeatureLog {
    seen: Mutex<BloomFilter<Feature>>,
    reported: AtomicUsize,
}

impl UnknownFeatureLog {
    pub fn new(fp_rate: f64, capacity: usize) -> Self {
        Self {
            seen: Mutex::new(BloomFilter::with_rate(fp_rate, capacity)),
            reported: AtomicUsize::new(0),
        }
    }

    /// Emit the unknown-feature warning unless `feature` was already flagged.
    ///
    /// Returns `true` if a warning was emitted.
    pub fn report(&self, feature: &Feature) -> bool {
        let mut seen = self.seen.lock().expect("unknown-feature log poisoned");
        if seen.contains(feature) {
            return false;
        }
        seen.insert(feature);
        drop(seen);

        tracing::warn!(
            feature = %feature,
            default = DEFAULT_WEIGHT,
            "using default weight for unknown feature (this message only prints once)"
        );
        self.reported.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Number of warnings emitted so far.
    pub fn reported(&self) -> usize {
        self.reported.load(Ordering::Relaxed)
    }
}

impl Default for UnknownFeatureLog {
    fn default() -> Self {
        Self::new(UNKNOWN_FEATURE_FP_RATE, UNKNOWN_FEATURE_CAPACITY)
    }
}

/// Scores proof edges from their feature counts.
///
/// Owns the learned [`WeightVector`], a [`WeightingScheme`], and the
/// [`UnknownFeatureLog`]. Read-only apart from the log, which is internally
/// synchronized, so one weighter can serve any number of proof attempts.
#[derive(Debug)]
pub struct FeatureWeighter {
    scheme: Box<dyn WeightingScheme>,
    weights: WeightVector,
    unknown: UnknownFeatureLog,
}

impl FeatureWeighter {
    pub fn new(
        scheme: Box<dyn WeightingScheme>,
        weights: WeightVector,
        unknown: UnknownFeatureLog,
    ) -> Self {
        Self {
            scheme,
            weights,
            unknown,
        }
    }

    /// Linear weighter with default diagnostics.
    pub fn linear(weights: WeightVector) -> Self {
        Self::new(
            Box::new(LinearWeightingScheme),
            weights,
            UnknownFeatureLog::default(),
        )
    }

    /// Weighter that knows no features: every feature weighs 1.0.
    pub fn uniform() -> Self {
        Self::linear(WeightVector::default())
    }

    /// Build a weighter from trained parameters keyed by goal text.
    ///
    /// Keys that normalize to the same feature (`foo(X)` and `foo(Y)`, or
    /// `foo(a)` and `foo( a )`) must agree on their weight; a disagreement is
    /// rejected naming both keys.
    pub fn from_param_vec<K: AsRef<str>>(
        params: impl IntoIterator<Item = (K, f64)>,
        scheme: Box<dyn WeightingScheme>,
        unknown: UnknownFeatureLog,
    ) -> Result<Self, InputError> {
        let mut entries: BTreeMap<Feature, (String, f64)> = BTreeMap::new();
        for (key, value) in params {
            let key = key.as_ref();
            let feature = Feature::parse(key).map_err(|e| InputError::Parameter {
                key: key.to_string(),
                message: feature_message(e),
            })?;
            if !value.is_finite() {
                return Err(InputError::Parameter {
                    key: key.to_string(),
                    message: format!("weight {value} is not finite"),
                });
            }
            if let Some((first, weight)) = entries.get(&feature) {
                if *weight != value {
                    return Err(InputError::Parameter {
                        key: key.to_string(),
                        message: format!(
                            "same feature {feature} as \"{first}\" but weight {value} != {weight}"
                        ),
                    });
                }
                continue;
            }
            entries.insert(feature, (key.to_string(), value));
        }
        tracing::debug!(
            params = entries.len(),
            scheme = scheme.name(),
            "built feature weighter from parameter vector"
        );
        let weights = entries.into_iter().map(|(feature, (_, value))| (feature, value));
        Ok(Self::new(scheme, WeightVector::new(weights), unknown))
    }

    /// [`from_param_vec`](Self::from_param_vec) with the linear scheme and
    /// default diagnostics.
    pub fn from_params(params: &[(String, f64)]) -> Result<Self, InputError> {
        Self::from_param_vec(
            params.iter().map(|(k, v)| (k.as_str(), *v)),
            Box::new(LinearWeightingScheme),
            UnknownFeatureLog::default(),
        )
    }

    /// Scalar weight of one proof edge.
    ///
    /// Unknown features are reported at most once each; the result does not
    /// depend on whether a report fires.
    pub fn score(&self, dictionary: &FeatureDictionary) -> f64 {
        for feature in dictionary.features() {
            if !self.weights.contains(feature) {
                self.unknown.report(feature);
            }
        }
        self.scheme.combine(dictionary, &self.weights)
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn scheme(&self) -> &dyn WeightingScheme {
        self.scheme.as_ref()
    }

    pub fn unknown_features(&self) -> &UnknownFeatureLog {
        &self.unknown
    }
}

fn feature_message(err: FeatureError) -> String {
    match err {
        FeatureError::Empty => "empty goal".into(),
        FeatureError::Malformed { message, .. } => message,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::params::parse_param_vec;
    use crate::weight::SigmoidWeightingScheme;

    fn f(s: &str) -> Feature {
        Feature::parse(s).unwrap()
    }

    #[test]
    fn pattern_weight_and_default_combine() {
        let params = [("foo(X)".to_string(), 2.0)];
        let weighter = FeatureWeighter::from_params(&params).unwrap();
        let dict = FeatureDictionary::new()
            .with(f("foo(a)"), 1.0)
            .with(f("bar(b)"), 3.0);

        let score = weighter.score(&dict);
        assert!((score - 5.0).abs() < 1e-12);
        assert_eq!(weighter.unknown_features().reported(), 1);
    }

    #[test]
    fn unknown_feature_reported_once_across_calls() {
        let weighter = FeatureWeighter::uniform();
        let dict = FeatureDictionary::new().with(f("mystery(q)"), 1.0);
        for _ in 0..25 {
            weighter.score(&dict);
        }
        assert_eq!(weighter.unknown_features().reported(), 1);
    }

    #[test]
    fn score_is_independent_of_report_state() {
        let weighter = FeatureWeighter::linear(WeightVector::new([(f("k"), 0.25)]));
        let dict = FeatureDictionary::new()
            .with(f("k"), 4.0)
            .with(f("u(x)"), 2.0);
        let first = weighter.score(&dict);
        let second = weighter.score(&dict);
        assert_eq!(first.to_bits(), second.to_bits());

        let fresh = FeatureWeighter::linear(WeightVector::new([(f("k"), 0.25)]));
        assert_eq!(fresh.score(&dict).to_bits(), first.to_bits());
    }

    #[test]
    fn known_features_are_never_reported() {
        let weighter = FeatureWeighter::linear(WeightVector::new([(f("r(X,Y)"), 0.5)]));
        weighter.score(&FeatureDictionary::new().with(f("r(a,b)"), 1.0));
        assert_eq!(weighter.unknown_features().reported(), 0);
    }

    #[test]
    fn separate_weighters_have_isolated_logs() {
        let dict = FeatureDictionary::new().with(f("new(feature)"), 1.0);
        let a = FeatureWeighter::uniform();
        let b = FeatureWeighter::uniform();
        a.score(&dict);
        b.score(&dict);
        assert_eq!(a.unknown_features().reported(), 1);
        assert_eq!(b.unknown_features().reported(), 1);
    }

    #[test]
    fn malformed_parameter_key_is_rejected() {
        let err = FeatureWeighter::from_params(&[("foo(a".to_string(), 1.0)]).unwrap_err();
        assert!(matches!(err, InputError::Parameter { ref key, .. } if key == "foo(a"));

        let err = FeatureWeighter::from_params(&[("ok".to_string(), f64::NAN)]).unwrap_err();
        assert!(matches!(err, InputError::Parameter { .. }));
    }

    #[test]
    fn equivalent_keys_with_different_weights_are_rejected() {
        for text in ["foo(X)\t1.0\nfoo(Y)\t4.0\n", "foo(a)\t1.0\nfoo( a )\t2.0\n"] {
            let params = parse_param_vec(text.as_bytes(), "params.tsv").unwrap();
            match FeatureWeighter::from_params(&params).unwrap_err() {
                InputError::Parameter { key, message } => {
                    assert_eq!(key, params[1].0);
                    assert!(message.contains(&params[0].0), "{message}");
                }
                other => panic!("expected a parameter error, got {other:?}"),
            }
        }
    }

    #[test]
    fn equivalent_keys_that_agree_build_the_same_weights_every_time() {
        let params =
            parse_param_vec("foo(X)\t4.0\nfoo(Y)\t4.0\nbar(a)\t0.5\n".as_bytes(), "p").unwrap();
        for _ in 0..50 {
            let weighter = FeatureWeighter::from_params(&params).unwrap();
            assert_eq!(weighter.weights().len(), 2);
            assert_eq!(weighter.weights().get(&f("foo(a)")), Some(4.0));
        }
    }

    #[test]
    fn custom_scheme_is_used() {
        let weighter = FeatureWeighter::from_param_vec(
            [("a", 0.0)],
            Box::new(SigmoidWeightingScheme),
            UnknownFeatureLog::default(),
        )
        .unwrap();
        let score = weighter.score(&FeatureDictionary::new().with(f("a"), 1.0));
        assert!((score - 0.5).abs() < 1e-12);
        assert_eq!(weighter.scheme().name(), "sigmoid");
    }

    #[test]
    fn shared_weighter_reports_once_across_threads() {
        let weighter = Arc::new(FeatureWeighter::uniform());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let w = Arc::clone(&weighter);
                std::thread::spawn(move || {
                    let dict =
                        FeatureDictionary::new().with(Feature::ground("shared", &["x"]), 1.0);
                    for _ in 0..100 {
                        assert_eq!(w.score(&dict), 1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(weighter.unknown_features().reported(), 1);
    }
}
