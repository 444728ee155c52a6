//! Feature identifiers for proof-graph edges.
//!
//! A [`Feature`] is a parsed goal: a functor applied to an ordered list of
//! arguments. Equality and hashing are derived from the normalized parse, never
//! from the source text, so `foo( a ,b)` and `foo(a,b)` are the same key, and
//! variables are renamed by first occurrence so `p(X,Y,X)` equals `p(A,B,A)`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FeatureError;

/// Result type for feature parsing.
pub type FeatureResult<T> = std::result::Result<T, FeatureError>;

static RE_GOAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\s(),]+)\s*(?:\((.*)\))?$").unwrap()
});

/// One argument of a goal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Argument {
    /// A constant symbol such as `a` or `42`.
    Constant(String),
    /// A variable, numbered from 1 by order of first occurrence.
    Variable(u32),
}

impl Argument {
    pub fn is_variable(&self) -> bool {
        matches!(self, Argument::Variable(_))
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Constant(c) => write!(f, "{c}"),
            Argument::Variable(i) => write!(f, "X{i}"),
        }
    }
}

/// A grounded (or partially grounded) predicate application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Feature {
    functor: String,
    args: Vec<Argument>,
}

impl Feature {
    /// Parse a goal in functional form: `functor(arg1,arg2)` or bare `functor`.
    pub fn parse(input: &str) -> FeatureResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FeatureError::Empty);
        }
        let caps = RE_GOAL.captures(trimmed).ok_or_else(|| FeatureError::Malformed {
            input: input.to_string(),
            message: "expected `functor` or `functor(args)`".into(),
        })?;
        let functor = &caps[1];
        match caps.get(2) {
            Some(inner) if !inner.as_str().trim().is_empty() => {
                Self::from_parts(input, functor, inner.as_str().split(','))
            }
            _ => Self::from_parts(input, functor, std::iter::empty()),
        }
    }

    /// Parse a goal in comma form: `functor,arg1,arg2`.
    ///
    /// This is the form query files use once parentheses are normalized away.
    pub fn parse_comma_form(input: &str) -> FeatureResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FeatureError::Empty);
        }
        let mut parts = trimmed.split(',');
        let functor = parts.next().unwrap_or_default();
        Self::from_parts(input, functor, parts)
    }

    fn from_parts<'a>(
        input: &str,
        functor: &str,
        raw_args: impl Iterator<Item = &'a str>,
    ) -> FeatureResult<Self> {
        let malformed = |message: &str| FeatureError::Malformed {
            input: input.to_string(),
            message: message.to_string(),
        };

        let functor = functor.trim();
        if functor.is_empty() {
            return Err(malformed("empty functor"));
        }
        if !is_plain_token(functor) {
            return Err(malformed("functor contains whitespace or parentheses"));
        }

        let mut vars: HashMap<&str, u32> = HashMap::new();
        let mut next_var = 1;
        let mut args = Vec::new();
        for raw in raw_args {
            let tok = raw.trim();
            if tok.is_empty() {
                return Err(malformed("empty argument"));
            }
            if !is_plain_token(tok) {
                return Err(malformed("nested or spaced arguments are not supported"));
            }
            let arg = if tok == "_" {
                // Anonymous variables never co-refer.
                next_var += 1;
                Argument::Variable(next_var - 1)
            } else if is_variable_token(tok) {
                let id = *vars.entry(tok).or_insert_with(|| {
                    next_var += 1;
                    next_var - 1
                });
                Argument::Variable(id)
            } else {
                Argument::Constant(tok.to_string())
            };
            args.push(arg);
        }

        Ok(Self {
            functor: functor.to_string(),
            args,
        })
    }

    /// Build a ground feature directly from a functor and constants.
    ///
    /// Constants must be non-empty plain tokens that do not read as variables
    /// (no leading uppercase letter or `_`); otherwise the display form would
    /// parse back as a different feature. [`try_ground`](Self::try_ground)
    /// checks this for untrusted input.
    pub fn ground(functor: impl Into<String>, constants: &[&str]) -> Self {
        debug_assert!(
            constants.iter().all(|c| is_constant_token(c)),
            "ground constants must not read as variables: {constants:?}"
        );
        Self {
            functor: functor.into(),
            args: constants
                .iter()
                .map(|c| Argument::Constant((*c).to_string()))
                .collect(),
        }
    }

    /// Checked [`ground`](Self::ground).
    pub fn try_ground(functor: &str, constants: &[&str]) -> FeatureResult<Self> {
        let malformed = |message: String| FeatureError::Malformed {
            input: format!("{functor}({})", constants.join(",")),
            message,
        };
        if functor.is_empty() || !is_plain_token(functor) {
            return Err(malformed(format!("bad functor \"{functor}\"")));
        }
        if let Some(bad) = constants.iter().find(|c| !is_constant_token(c)) {
            return Err(malformed(format!(
                "\"{bad}\" is not a constant (empty, spaced, or variable-like)"
            )));
        }
        Ok(Self::ground(functor, constants))
    }

    pub fn functor(&self) -> &str {
        &self.functor
    }

    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Number of distinct variables.
    pub fn variable_count(&self) -> usize {
        let mut ids: Vec<u32> = self
            .args
            .iter()
            .filter_map(|a| match a {
                Argument::Variable(i) => Some(*i),
                Argument::Constant(_) => None,
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    pub fn is_ground(&self) -> bool {
        self.args.iter().all(|a| !a.is_variable())
    }

    /// Whether this feature, read as a pattern, matches `other`.
    ///
    /// Constants must be equal; each variable binds one argument of `other`
    /// and every occurrence of the same variable must bind the same one.
    pub fn matches(&self, other: &Feature) -> bool {
        if self.functor != other.functor || self.args.len() != other.args.len() {
            return false;
        }
        let mut bindings: HashMap<u32, &Argument> = HashMap::new();
        self.args.iter().zip(&other.args).all(|(pat, arg)| match pat {
            Argument::Constant(_) => pat == arg,
            Argument::Variable(i) => *bindings.entry(*i).or_insert(arg) == arg,
        })
    }
}

fn is_plain_token(tok: &str) -> bool {
    !tok.chars().any(|c| c.is_whitespace() || c == '(' || c == ')' || c == ',')
}

fn is_constant_token(tok: &str) -> bool {
    !tok.is_empty() && is_plain_token(tok) && !is_variable_token(tok)
}

fn is_variable_token(tok: &str) -> bool {
    tok.chars()
        .next()
        .is_some_and(|c| c.is_uppercase() || c == '_')
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.functor)?;
        if !self.args.is_empty() {
            write!(f, "(")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl FromStr for Feature {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::parse(s)
    }
}

impl TryFrom<String> for Feature {
    type Error = FeatureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Feature::parse(&value)
    }
}

impl From<Feature> for String {
    fn from(value: Feature) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn parses_functional_form() {
        let f = Feature::parse("edge(a,b)").unwrap();
        assert_eq!(f.functor(), "edge");
        assert_eq!(f.arity(), 2);
        assert!(f.is_ground());
        assert_eq!(f.to_string(), "edge(a,b)");
    }

    #[test]
    fn bare_functor_has_arity_zero() {
        let f = Feature::parse("restart").unwrap();
        assert_eq!(f.arity(), 0);
        assert_eq!(f.to_string(), "restart");
        assert_eq!(Feature::parse("restart()").unwrap(), f);
    }

    #[test]
    fn whitespace_does_not_create_distinct_keys() {
        let a = Feature::parse("edge(a,b)").unwrap();
        let b = Feature::parse("  edge ( a , b ) ").unwrap();
        assert_eq!(a, b);

        let set: HashSet<Feature> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn comma_form_matches_functional_form() {
        let a = Feature::parse_comma_form("samebib,class_338,Y").unwrap();
        let b = Feature::parse("samebib(class_338,Y)").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn variables_are_renamed_by_first_occurrence() {
        let a = Feature::parse("p(X,Y,X)").unwrap();
        let b = Feature::parse("p(Foo,Bar,Foo)").unwrap();
        let c = Feature::parse("p(X,Y,Y)").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.variable_count(), 2);
        assert_eq!(a.to_string(), "p(X1,X2,X1)");
    }

    #[test]
    fn display_reparses_to_same_feature() {
        let f = Feature::parse("p(Q,b,Q)").unwrap();
        assert_eq!(Feature::parse(&f.to_string()).unwrap(), f);
    }

    #[test]
    fn anonymous_variables_never_co_refer() {
        let f = Feature::parse("p(_,_)").unwrap();
        assert_eq!(f.variable_count(), 2);
        assert!(f.matches(&Feature::ground("p", &["a", "b"])));
    }

    #[test]
    fn rejects_malformed_goals() {
        assert!(matches!(Feature::parse("   "), Err(FeatureError::Empty)));
        assert!(matches!(
            Feature::parse("foo(a,,b)"),
            Err(FeatureError::Malformed { .. })
        ));
        assert!(matches!(
            Feature::parse("foo(g(a))"),
            Err(FeatureError::Malformed { .. })
        ));
        assert!(matches!(
            Feature::parse("foo(a"),
            Err(FeatureError::Malformed { .. })
        ));
        assert!(matches!(
            Feature::parse_comma_form(",a"),
            Err(FeatureError::Malformed { .. })
        ));
    }

    #[test]
    fn pattern_matching_respects_bindings() {
        let pat = Feature::parse("link(X,X)").unwrap();
        assert!(pat.matches(&Feature::ground("link", &["a", "a"])));
        assert!(!pat.matches(&Feature::ground("link", &["a", "b"])));
        assert!(!pat.matches(&Feature::ground("link", &["a"])));
        assert!(!pat.matches(&Feature::ground("other", &["a", "a"])));

        let half = Feature::parse("link(a,Y)").unwrap();
        assert!(half.matches(&Feature::ground("link", &["a", "z"])));
        assert!(!half.matches(&Feature::ground("link", &["b", "z"])));
    }

    #[test]
    fn try_ground_rejects_constants_that_read_as_variables() {
        for bad in ["Abc", "_x", "a b", ""] {
            assert!(
                matches!(Feature::try_ground("p", &[bad]), Err(FeatureError::Malformed { .. })),
                "{bad:?}"
            );
        }
        assert!(Feature::try_ground("p q", &["a"]).is_err());

        let f = Feature::try_ground("p", &["abc", "42"]).unwrap();
        assert!(f.is_ground());
        assert_eq!(Feature::parse(&f.to_string()).unwrap(), f);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "must not read as variables")]
    fn ground_asserts_on_variable_like_constants() {
        let _ = Feature::ground("p", &["Abc"]);
    }

    #[test]
    fn serde_uses_display_form() {
        let f = Feature::parse("foo( a )").unwrap();
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, "\"foo(a)\"");
        let back: Feature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
