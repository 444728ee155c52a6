//! Ground proof graphs.
//!
//! Stands in for a compiled logic program: states are opaque labels, each edge
//! carries the feature counts the weighter turns into a transition weight, and
//! some states are marked as solutions. Loaded from JSON:
//!
//! ```json
//! {
//!   "restart": { "id(restart)": 1.0 },
//!   "edges": [
//!     { "from": "samebib(a,Y)", "to": "author(a,X),author(Y,X)",
//!       "features": { "id(r1)": 1.0 } }
//!   ],
//!   "solutions": ["samebib(a,b)"]
//! }
//! ```
//!
//! Labels that parse as a single goal are stored in normalized form, so the
//! query `samebib(a, Y)` finds the state written `samebib(a,Y)`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Deserialize;

use crate::corpus::Query;
use crate::error::InputError;
use crate::feature::Feature;
use crate::weight::FeatureDictionary;

/// Node payload.
#[derive(Debug, Clone)]
pub struct ProofState {
    pub label: String,
    pub solution: bool,
}

/// Edge payload: feature counts of one transition.
#[derive(Debug, Clone)]
pub struct ProofEdge {
    pub features: FeatureDictionary,
}

/// Directed proof graph backed by petgraph.
#[derive(Debug, Clone)]
pub struct ProofGraph {
    graph: DiGraph<ProofState, ProofEdge>,
    index: HashMap<String, NodeIndex>,
    restart: FeatureDictionary,
}

#[derive(Debug, Deserialize)]
struct ProgramFile {
    #[serde(default)]
    restart: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    edges: Vec<EdgeSpec>,
    #[serde(default)]
    solutions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EdgeSpec {
    from: String,
    to: String,
    #[serde(default)]
    features: BTreeMap<String, f64>,
}

/// Feature set of the restart edge when a program does not name one.
pub fn default_restart_features() -> FeatureDictionary {
    FeatureDictionary::new().with(Feature::ground("id", &["restart"]), 1.0)
}

/// Canonical form of a state label.
pub fn normalize_label(label: &str) -> String {
    Feature::parse(label)
        .map(|f| f.to_string())
        .unwrap_or_else(|_| label.trim().to_string())
}

/// Feature counts of one program entry; `entry` names it in errors.
fn parse_counts(
    source: &str,
    entry: &str,
    entries: BTreeMap<String, f64>,
) -> Result<FeatureDictionary, InputError> {
    entries
        .into_iter()
        .map(|(key, count)| -> Result<(Feature, f64), InputError> {
            let malformed = |message: String| InputError::MalformedEntry {
                path: source.to_string(),
                entry: entry.to_string(),
                content: key.clone(),
                message,
            };
            if !count.is_finite() || count < 0.0 {
                return Err(malformed(format!("feature count {count} must be non-negative")));
            }
            let feature = Feature::parse(&key).map_err(|e| malformed(e.to_string()))?;
            Ok((feature, count))
        })
        .collect()
}

impl ProofGraph {
    pub fn new(restart: FeatureDictionary) -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            restart,
        }
    }

    /// Load a program file.
    pub fn load(path: &Path) -> Result<Self, InputError> {
        let text = std::fs::read_to_string(path).map_err(|source| InputError::Resource {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text, &path.display().to_string())
    }

    /// Parse a program from JSON text; `source` names it in errors.
    pub fn from_json_str(text: &str, source: &str) -> Result<Self, InputError> {
        let file: ProgramFile = serde_json::from_str(text).map_err(|e| InputError::Malformed {
            path: source.to_string(),
            line: e.line(),
            content: text
                .lines()
                .nth(e.line().saturating_sub(1))
                .unwrap_or_default()
                .to_string(),
            message: e.to_string(),
        })?;

        let restart = match file.restart {
            Some(entries) => parse_counts(source, "restart features", entries)?,
            None => default_restart_features(),
        };
        let mut graph = Self::new(restart);
        for (i, edge) in file.edges.into_iter().enumerate() {
            let entry = format!("features of edge {i} ({} -> {})", edge.from, edge.to);
            let features = parse_counts(source, &entry, edge.features)?;
            graph.add_edge(&edge.from, &edge.to, features);
        }
        for label in &file.solutions {
            graph.mark_solution(label);
        }
        tracing::debug!(
            source,
            states = graph.state_count(),
            edges = graph.edge_count(),
            "loaded proof graph"
        );
        Ok(graph)
    }

    fn ensure_state(&mut self, label: &str) -> NodeIndex {
        let label = normalize_label(label);
        if let Some(idx) = self.index.get(&label) {
            return *idx;
        }
        let idx = self.graph.add_node(ProofState {
            label: label.clone(),
            solution: false,
        });
        self.index.insert(label, idx);
        idx
    }

    /// Add a transition, creating both states if needed.
    pub fn add_edge(&mut self, from: &str, to: &str, features: FeatureDictionary) {
        let a = self.ensure_state(from);
        let b = self.ensure_state(to);
        self.graph.add_edge(a, b, ProofEdge { features });
    }

    /// Mark a state as a solution, creating it if needed.
    pub fn mark_solution(&mut self, label: &str) {
        let idx = self.ensure_state(label);
        self.graph[idx].solution = true;
    }

    pub fn state(&self, label: &str) -> Option<NodeIndex> {
        self.index.get(&normalize_label(label)).copied()
    }

    /// State a query starts from.
    pub fn start_state(&self, query: &Query) -> Option<NodeIndex> {
        self.index.get(&query.goal().to_string()).copied()
    }

    /// Outgoing transitions of `state`.
    pub fn outlinks(
        &self,
        state: NodeIndex,
    ) -> impl Iterator<Item = (NodeIndex, &FeatureDictionary)> {
        self.graph
            .edges_directed(state, Direction::Outgoing)
            .map(|e| (e.target(), &e.weight().features))
    }

    pub fn out_degree(&self, state: NodeIndex) -> usize {
        self.graph.edges_directed(state, Direction::Outgoing).count()
    }

    pub fn label(&self, state: NodeIndex) -> &str {
        &self.graph[state].label
    }

    pub fn is_solution(&self, state: NodeIndex) -> bool {
        self.graph[state].solution
    }

    pub fn restart_features(&self) -> &FeatureDictionary {
        &self.restart
    }

    pub fn state_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
