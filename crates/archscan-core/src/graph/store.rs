//! In-memory node/edge/evidence store.

use indexmap::IndexMap;

use super::output::{MergeStats, PassOutput};
use crate::ontology::{EdgeTarget, EdgeType, Evidence, GraphEdge, GraphNode, NodeType};

/// The graph being assembled, keyed by deterministic IDs.
///
/// Insertion order is preserved so serialized output is stable across runs.
/// Only [`GraphStore::merge`] mutates it.
#[derive(Debug, Default, Clone)]
pub struct GraphStore {
    nodes: IndexMap<String, GraphNode>,
    edges: IndexMap<String, GraphEdge>,
    evidence: IndexMap<String, Evidence>,
    warnings: Vec<String>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a pass's output.
    ///
    /// Nodes are first-write-wins. An edge whose ID already exists keeps its
    /// first shape and gains the newcomer's evidence IDs. Target rewrites are
    /// applied last, so a pass may rewrite edges it emitted itself.
    pub fn merge(&mut self, output: PassOutput) -> MergeStats {
        let mut stats = MergeStats::default();

        for node in output.nodes {
            if self.nodes.contains_key(&node.id) {
                stats.nodes_skipped += 1;
                continue;
            }
            self.nodes.insert(node.id.clone(), node);
            stats.nodes_added += 1;
        }

        for edge in output.edges {
            match self.edges.get_mut(&edge.id) {
                Some(existing) => {
                    for evidence_id in edge.evidence_ids {
                        if !existing.evidence_ids.contains(&evidence_id) {
                            existing.evidence_ids.push(evidence_id);
                        }
                    }
                    stats.edges_merged += 1;
                }
                None => {
                    self.edges.insert(edge.id.clone(), edge);
                    stats.edges_added += 1;
                }
            }
        }

        for evidence in output.evidence {
            if !self.evidence.contains_key(&evidence.id) {
                self.evidence.insert(evidence.id.clone(), evidence);
                stats.evidence_added += 1;
            }
        }

        for rewrite in output.rewrites {
            if let Some(edge) = self.edges.get_mut(&rewrite.edge_id) {
                edge.target = EdgeTarget::Node(rewrite.target);
                stats.targets_rewritten += 1;
            }
        }

        stats.warnings = output.warnings.len();
        self.warnings.extend(output.warnings);

        stats
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    pub fn evidence(&self) -> impl Iterator<Item = &Evidence> {
        self.evidence.values()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn evidence_count(&self) -> usize {
        self.evidence.len()
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &GraphNode> {
        self.nodes
            .values()
            .filter(move |n| n.node_type() == node_type)
    }

    pub fn edges_of_type(&self, edge_type: EdgeType) -> impl Iterator<Item = &GraphEdge> {
        self.edges
            .values()
            .filter(move |e| e.edge_type == edge_type)
    }

    pub fn edges_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a GraphEdge> {
        self.edges.values().filter(move |e| e.source == source)
    }

    /// Citations attached to a node itself (not to one of its edges).
    pub fn evidence_for_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Evidence> {
        self.evidence
            .values()
            .filter(move |ev| ev.node_id == node_id && ev.edge_id.is_none())
    }

    /// Edges whose target is neither a known node nor resolved.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values().filter(move |e| match &e.target {
            EdgeTarget::Placeholder(_) => true,
            EdgeTarget::Node(id) => !self.nodes.contains_key(id),
        })
    }

    /// Consume the store into its collections, in insertion order.
    pub fn into_parts(self) -> (Vec<GraphNode>, Vec<GraphEdge>, Vec<Evidence>) {
        (
            self.nodes.into_values().collect(),
            self.edges.into_values().collect(),
            self.evidence.into_values().collect(),
        )
    }
}
