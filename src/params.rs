//! Learned parameter vectors in tab-separated form.
//!
//! One `goal<TAB>weight` pair per line. Blank lines and lines starting with `#`
//! are skipped. Keys stay textual here and entries keep file order; they are
//! parsed into features when a
//! [`FeatureWeighter`](crate::weight::weighter::FeatureWeighter) is built.

use std::io::BufRead;
use std::path::Path;

use crate::error::InputError;

/// Read a parameter vector file.
pub fn read_param_vec(path: &Path) -> Result<Vec<(String, f64)>, InputError> {
    let file = std::fs::File::open(path).map_err(|source| InputError::Resource {
        path: path.display().to_string(),
        source,
    })?;
    parse_param_vec(std::io::BufReader::new(file), &path.display().to_string())
}

/// Parse a parameter vector from any buffered reader.
pub fn parse_param_vec(
    reader: impl BufRead,
    source: &str,
) -> Result<Vec<(String, f64)>, InputError> {
    let mut params = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let text = line.map_err(|e| InputError::Resource {
            path: source.to_string(),
            source: e,
        })?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let malformed = |message: String| InputError::Malformed {
            path: source.to_string(),
            line: idx + 1,
            content: text.clone(),
            message,
        };
        let (key, value) = trimmed
            .split_once('\t')
            .ok_or_else(|| malformed("expected `goal<TAB>weight`".into()))?;
        let weight: f64 = value
            .trim()
            .parse()
            .map_err(|e| malformed(format!("bad weight \"{}\": {e}", value.trim())))?;
        params.push((key.trim().to_string(), weight));
    }
    Ok(params)
}
