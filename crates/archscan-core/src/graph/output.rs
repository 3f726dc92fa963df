//! Pass output: the facts one pass contributes to the store.

use crate::ontology::{EdgeTarget, Evidence, Feature, GraphEdge, GraphNode, NodeType};

/// Request to point an existing edge at a resolved node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRewrite {
    pub edge_id: String,
    pub target: String,
}

/// Result of running a pass.
///
/// Passes never touch the store; they return this and the pipeline merges it.
#[derive(Debug, Default, Clone)]
pub struct PassOutput {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub evidence: Vec<Evidence>,
    /// Edge target rewrites, applied after this output's edges are merged.
    pub rewrites: Vec<TargetRewrite>,
    /// Features (only the feature pass produces these).
    pub features: Vec<Feature>,
    /// Non-fatal issues: unparseable fragments, malformed manifests.
    pub warnings: Vec<String>,
}

impl PassOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
    }

    pub fn add_evidence(&mut self, evidence: Evidence) {
        self.evidence.push(evidence);
    }

    /// Add an edge together with the citation that backs it. The citation's
    /// ID is recorded on the edge.
    pub fn add_cited_edge(&mut self, edge: GraphEdge, evidence: Evidence) {
        let edge = edge.with_evidence(evidence.id.clone());
        self.edges.push(edge);
        self.evidence.push(evidence);
    }

    pub fn rewrite_target(&mut self, edge_id: impl Into<String>, target: impl Into<String>) {
        self.rewrites.push(TargetRewrite {
            edge_id: edge_id.into(),
            target: target.into(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Append another output, preserving order.
    pub fn extend(&mut self, other: PassOutput) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
        self.evidence.extend(other.evidence);
        self.rewrites.extend(other.rewrites);
        self.features.extend(other.features);
        self.warnings.extend(other.warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.edges.is_empty()
            && self.evidence.is_empty()
            && self.rewrites.is_empty()
            && self.features.is_empty()
    }

    /// Nodes of a given type in this output.
    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &GraphNode> {
        self.nodes
            .iter()
            .filter(move |n| n.node_type() == node_type)
    }

    /// Edges whose target is still a placeholder.
    pub fn placeholder_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges
            .iter()
            .filter(|e| matches!(e.target, EdgeTarget::Placeholder(_)))
    }
}

impl FromIterator<PassOutput> for PassOutput {
    fn from_iter<I: IntoIterator<Item = PassOutput>>(iter: I) -> Self {
        let mut merged = PassOutput::new();
        for output in iter {
            merged.extend(output);
        }
        merged
    }
}

/// Counts describing a merge into the store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    pub nodes_added: usize,
    /// Nodes dropped because their ID already existed (first write wins).
    pub nodes_skipped: usize,
    pub edges_added: usize,
    /// Edges whose ID already existed; their evidence IDs were unioned.
    pub edges_merged: usize,
    pub evidence_added: usize,
    pub targets_rewritten: usize,
    pub warnings: usize,
}

impl std::fmt::Display for MergeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "+{} nodes ({} dup), +{} edges ({} merged), +{} evidence, {} resolved, {} warnings",
            self.nodes_added,
            self.nodes_skipped,
            self.edges_added,
            self.edges_merged,
            self.evidence_added,
            self.targets_rewritten,
            self.warnings
        )
    }
}
