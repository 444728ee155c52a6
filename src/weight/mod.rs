//! Edge weighting: learned weight vectors and the laws that combine them with
//! per-edge feature counts.
//!
//! A [`WeightingScheme`] is a pure function of a [`FeatureDictionary`] and a
//! [`WeightVector`]. The [`FeatureWeighter`](weighter::FeatureWeighter) owns the
//! vector and a scheme and is what the prover calls once per candidate edge.

pub mod bloom;
pub mod weighter;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FeatureError;
use crate::feature::Feature;

/// Weight applied to any feature the vector does not know.
pub const DEFAULT_WEIGHT: f64 = 1.0;

// ---------------------------------------------------------------------------
// Feature dictionary
// ---------------------------------------------------------------------------

/// Feature counts observed on one proof edge.
///
/// Ordered by feature so that summing over it is bit-for-bit reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureDictionary {
    counts: BTreeMap<Feature, f64>,
}

impl FeatureDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the count for a feature, replacing any previous count.
    pub fn insert(&mut self, feature: Feature, count: f64) {
        self.counts.insert(feature, count);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, feature: Feature, count: f64) -> Self {
        self.insert(feature, count);
        self
    }

    /// Parse textual keys into a dictionary.
    pub fn parse<'a>(
        entries: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Self, FeatureError> {
        entries
            .into_iter()
            .map(|(k, v)| Feature::parse(k).map(|f| (f, v)))
            .collect()
    }

    /// Parse `goal=count` assignments separated by commas outside parentheses,
    /// e.g. `foo(a)=1,edge(a,b)=2.5`. A bare goal counts once.
    pub fn from_assignments(text: &str) -> Result<Self, FeatureError> {
        let mut entries = Vec::new();
        let mut depth = 0usize;
        let mut begin = 0;
        for (i, c) in text.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    entries.push(&text[begin..i]);
                    begin = i + 1;
                }
                _ => {}
            }
        }
        entries.push(&text[begin..]);

        entries
            .into_iter()
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| -> Result<(Feature, f64), FeatureError> {
                let (goal, count) = match entry.rsplit_once('=') {
                    Some((goal, count)) => {
                        let count: f64 =
                            count.trim().parse().map_err(|_| FeatureError::Malformed {
                                input: entry.trim().to_string(),
                                message: format!("bad count \"{}\"", count.trim()),
                            })?;
                        (goal, count)
                    }
                    None => (entry, 1.0),
                };
                Ok((Feature::parse(goal)?, count))
            })
            .collect()
    }

    pub fn get(&self, feature: &Feature) -> Option<f64> {
        self.counts.get(feature).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Feature, f64)> {
        self.counts.iter().map(|(f, c)| (f, *c))
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.counts.keys()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(Feature, f64)> for FeatureDictionary {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Weight vector
// ---------------------------------------------------------------------------

/// Immutable map from features to learned weights.
///
/// Entries whose feature contains variables act as patterns: a ground feature
/// with no exact entry takes the weight of the most specific matching pattern.
/// Features matching nothing are unknown; unknown features are weighted with
/// [`DEFAULT_WEIGHT`] at lookup time and never inserted.
#[derive(Debug, Clone, Default)]
pub struct WeightVector {
    exact: HashMap<Feature, f64>,
    /// (functor, arity) → patterns, most specific first.
    patterns: HashMap<(String, usize), Vec<(Feature, f64)>>,
}

impl WeightVector {
    pub fn new(weights: impl IntoIterator<Item = (Feature, f64)>) -> Self {
        // Later duplicates overwrite earlier ones.
        let exact: HashMap<Feature, f64> = weights.into_iter().collect();

        let mut patterns: HashMap<(String, usize), Vec<(Feature, f64)>> = HashMap::new();
        for (feature, weight) in exact.iter().filter(|(f, _)| !f.is_ground()) {
            patterns
                .entry((feature.functor().to_string(), feature.arity()))
                .or_default()
                .push((feature.clone(), *weight));
        }
        for bucket in patterns.values_mut() {
            bucket.sort_by(|(a, _), (b, _)| {
                a.variable_count()
                    .cmp(&b.variable_count())
                    .then_with(|| a.to_string().cmp(&b.to_string()))
            });
        }
        Self { exact, patterns }
    }

    /// Learned weight for `feature`, or `None` if it is unknown.
    pub fn get(&self, feature: &Feature) -> Option<f64> {
        if let Some(w) = self.exact.get(feature) {
            return Some(*w);
        }
        self.patterns
            .get(&(feature.functor().to_string(), feature.arity()))?
            .iter()
            .find(|(pattern, _)| pattern.matches(feature))
            .map(|(_, w)| *w)
    }

    /// Learned weight for `feature`, falling back to [`DEFAULT_WEIGHT`].
    pub fn weight_or_default(&self, feature: &Feature) -> f64 {
        self.get(feature).unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn contains(&self, feature: &Feature) -> bool {
        self.get(feature).is_some()
    }

    /// Number of stored entries (patterns included).
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Weighting schemes
// ---------------------------------------------------------------------------

/// Combination law turning feature counts and learned weights into one edge
/// weight.
///
/// Implementations must be total and free of side effects: a missing weight
/// means [`DEFAULT_WEIGHT`], never an error.
pub trait WeightingScheme: Send + Sync + fmt::Debug {
    fn combine(&self, dictionary: &FeatureDictionary, weights: &WeightVector) -> f64;

    /// Short name used in configuration and logs.
    fn name(&self) -> &'static str;
}

/// `Σ count(f) · weight(f)` over the dictionary.
pub fn inner_product(dictionary: &FeatureDictionary, weights: &WeightVector) -> f64 {
    dictionary
        .iter()
        .map(|(feature, count)| count * weights.weight_or_default(feature))
        .sum()
}

/// Plain inner product.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearWeightingScheme;

impl WeightingScheme for LinearWeightingScheme {
    fn combine(&self, dictionary: &FeatureDictionary, weights: &WeightVector) -> f64 {
        inner_product(dictionary, weights)
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Logistic squashing of the inner product.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigmoidWeightingScheme;

impl WeightingScheme for SigmoidWeightingScheme {
    fn combine(&self, dictionary: &FeatureDictionary, weights: &WeightVector) -> f64 {
        1.0 / (1.0 + (-inner_product(dictionary, weights)).exp())
    }

    fn name(&self) -> &'static str {
        "sigmoid"
    }
}

/// Hyperbolic tangent of the inner product.
#[derive(Debug, Clone, Copy, Default)]
pub struct TanhWeightingScheme;

impl WeightingScheme for TanhWeightingScheme {
    fn combine(&self, dictionary: &FeatureDictionary, weights: &WeightVector) -> f64 {
        inner_product(dictionary, weights).tanh()
    }

    fn name(&self) -> &'static str {
        "tanh"
    }
}

/// Exponential of the inner product; always positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpWeightingScheme;

impl WeightingScheme for ExpWeightingScheme {
    fn combine(&self, dictionary: &FeatureDictionary, weights: &WeightVector) -> f64 {
        inner_product(dictionary, weights).exp()
    }

    fn name(&self) -> &'static str {
        "exp"
    }
}

/// Built-in schemes selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    #[default]
    Linear,
    Sigmoid,
    Tanh,
    Exp,
}

impl SchemeKind {
    /// Instantiate the scheme.
    pub fn build(self) -> Box<dyn WeightingScheme> {
        match self {
            SchemeKind::Linear => Box::new(LinearWeightingScheme),
            SchemeKind::Sigmoid => Box::new(SigmoidWeightingScheme),
            SchemeKind::Tanh => Box::new(TanhWeightingScheme),
            SchemeKind::Exp => Box::new(ExpWeightingScheme),
        }
    }
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemeKind::Linear => write!(f, "linear"),
            SchemeKind::Sigmoid => write!(f, "sigmoid"),
            SchemeKind::Tanh => write!(f, "tanh"),
            SchemeKind::Exp => write!(f, "exp"),
        }
    }
}

impl FromStr for SchemeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(SchemeKind::Linear),
            "sigmoid" => Ok(SchemeKind::Sigmoid),
            "tanh" => Ok(SchemeKind::Tanh),
            "exp" => Ok(SchemeKind::Exp),
            other => Err(format!(
                "unknown weighting scheme \"{other}\" (expected linear, sigmoid, tanh or exp)"
            )),
        }
    }
}
