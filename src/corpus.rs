//! Query corpus: the held-out goals a calibration run proves on every trial.
//!
//! The file format is line oriented. The first tab-delimited field of each line
//! is a goal; any later fields (expected solutions, labels) are ignored here.
//! Parentheses are normalized to comma form before parsing, so `p(a,B)` and
//! `p,a,B` are the same query. Blank lines are skipped.

use std::fmt;
use std::io::BufRead;
use std::path::Path;

use crate::error::InputError;
use crate::feature::{Feature, FeatureResult};

/// One query goal and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    goal: Feature,
    /// 1-based source line, 0 for queries built in code.
    line: usize,
}

impl Query {
    pub fn new(goal: Feature) -> Self {
        Self { goal, line: 0 }
    }

    /// Parse one corpus line.
    pub fn parse_line(text: &str, line: usize) -> FeatureResult<Self> {
        let first = text.split('\t').next().unwrap_or_default();
        let normalized = first.replace('(', ",").replace(')', "");
        let goal = Feature::parse_comma_form(normalized.trim())?;
        Ok(Self { goal, line })
    }

    pub fn goal(&self) -> &Feature {
        &self.goal
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.goal)
    }
}

/// All queries of one corpus file, parsed up front.
#[derive(Debug, Clone, Default)]
pub struct QueryCorpus {
    source: String,
    queries: Vec<Query>,
}

impl QueryCorpus {
    /// Read and parse a corpus file.
    pub fn load(path: &Path) -> Result<Self, InputError> {
        let file = std::fs::File::open(path).map_err(|source| InputError::Resource {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(std::io::BufReader::new(file), &path.display().to_string())
    }

    /// Parse a corpus from any buffered reader; `source` names it in errors.
    pub fn from_reader(reader: impl BufRead, source: &str) -> Result<Self, InputError> {
        let mut queries = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let text = line.map_err(|e| InputError::Resource {
                path: source.to_string(),
                source: e,
            })?;
            if text.trim().is_empty() {
                continue;
            }
            let query = Query::parse_line(&text, line_no).map_err(|e| InputError::Malformed {
                path: source.to_string(),
                line: line_no,
                content: text.clone(),
                message: e.to_string(),
            })?;
            queries.push(query);
        }
        tracing::debug!(source, queries = queries.len(), "loaded query corpus");
        Ok(Self {
            source: source.to_string(),
            queries,
        })
    }

    pub fn from_queries(queries: Vec<Query>) -> Self {
        Self {
            source: "<memory>".into(),
            queries,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Query> {
        self.queries.iter()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl<'a> IntoIterator for &'a QueryCorpus {
    type Item = &'a Query;
    type IntoIter = std::slice::Iter<'a, Query>;

    fn into_iter(self) -> Self::IntoIter {
        self.queries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_field_is_the_goal() {
        let q = Query::parse_line("samebib(class_338,Y)\t+samebib(class_338,class_92)", 4).unwrap();
        assert_eq!(q.goal(), &Feature::parse("samebib(class_338,Y)").unwrap());
        assert_eq!(q.line(), 4);
    }

    #[test]
    fn parentheses_and_comma_form_agree() {
        let a = Query::parse_line("p(a, B)", 1).unwrap();
        let b = Query::parse_line("p,a,B", 2).unwrap();
        assert_eq!(a.goal(), b.goal());
    }

    #[test]
    fn reader_skips_blank_lines_and_counts_lines() {
        let text = "p(a)\n\n  \nq(b,c)\textra\tfields\n";
        let corpus = QueryCorpus::from_reader(text.as_bytes(), "inline").unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.queries()[1].line(), 4);
        assert_eq!(corpus.queries()[1].to_string(), "q(b,c)");
    }

    #[test]
    fn malformed_line_reports_position_and_content() {
        let text = "p(a)\n,oops\n";
        let err = QueryCorpus::from_reader(text.as_bytes(), "queries.tsv").unwrap_err();
        match err {
            InputError::Malformed {
                path,
                line,
                content,
                ..
            } => {
                assert_eq!(path, "queries.tsv");
                assert_eq!(line, 2);
                assert_eq!(content, ",oops");
            }
            other => panic!("expected malformed input, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_resource_failure() {
        let err = QueryCorpus::load(Path::new("/nonexistent/dpr-tune/queries.tsv")).unwrap_err();
        assert!(matches!(err, InputError::Resource { .. }));
    }
}
