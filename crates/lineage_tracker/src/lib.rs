//! Upstream/downstream lineage between emitted entities.
//!
//! Edges are stored once. The tracker keeps a forward index (source → edges)
//! and a reverse index (target → edges) into that single list, so both
//! directions are answered by lookup rather than by scanning.

use indexmap::{IndexMap, IndexSet};
use llm_structs::{EdgeType, JsonMap, LineageEdge};
use serde::Serialize;

/// Snapshot of every node and edge recorded so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineageGraph {
    /// Node ids in first-seen order.
    pub nodes: Vec<String>,
    /// Edges in insertion order.
    pub edges: Vec<LineageEdge>,
}

/// Lineage for a single emission pass.
#[derive(Debug, Clone, Default)]
pub struct LineageTracker {
    edges: Vec<LineageEdge>,
    nodes: IndexSet<String>,
    downstream: IndexMap<String, Vec<usize>>,
    upstream: IndexMap<String, Vec<usize>>,
}

impl LineageTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a tracker from edges recorded by an earlier pass.
    #[must_use]
    pub fn from_edges(edges: impl IntoIterator<Item = LineageEdge>) -> Self {
        let mut tracker = Self::new();
        for edge in edges {
            tracker.push(edge);
        }
        tracker
    }

    /// Records a directed edge from `source` to `target`.
    ///
    /// Self-edges are accepted as given.
    pub fn add_edge(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: EdgeType,
        metadata: Option<JsonMap>,
    ) {
        self.push(LineageEdge {
            source_id: source.into(),
            target_id: target.into(),
            edge_type,
            metadata,
        });
    }

    fn push(&mut self, edge: LineageEdge) {
        let index = self.edges.len();

        self.nodes.insert(edge.source_id.clone());
        self.nodes.insert(edge.target_id.clone());
        self.downstream
            .entry(edge.source_id.clone())
            .or_default()
            .push(index);
        self.upstream
            .entry(edge.target_id.clone())
            .or_default()
            .push(index);
        self.edges.push(edge);
    }

    /// Edges pointing into `id`.
    #[must_use]
    pub fn upstream(&self, id: &str) -> Vec<&LineageEdge> {
        self.resolve(self.upstream.get(id))
    }

    /// Edges leaving `id`.
    #[must_use]
    pub fn downstream(&self, id: &str) -> Vec<&LineageEdge> {
        self.resolve(self.downstream.get(id))
    }

    fn resolve(&self, indices: Option<&Vec<usize>>) -> Vec<&LineageEdge> {
        indices
            .map(|indices| indices.iter().filter_map(|&i| self.edges.get(i)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn edges(&self) -> &[LineageEdge] {
        &self.edges
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn graph(&self) -> LineageGraph {
        LineageGraph {
            nodes: self.nodes.iter().cloned().collect(),
            edges: self.edges.clone(),
        }
    }
}
