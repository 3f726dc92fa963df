//! Counts and coverage ratios derived from an assembled graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::graph::GraphStore;
use crate::ontology::{Confidence, EdgeType, EvidenceKind, Feature, NodeType};

/// `covered` of `total`, with the ratio precomputed (0 when `total` is 0).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub covered: usize,
    pub total: usize,
    pub ratio: f64,
}

impl Coverage {
    pub fn new(covered: usize, total: usize) -> Self {
        let ratio = if total == 0 {
            0.0
        } else {
            covered as f64 / total as f64
        };
        Self {
            covered,
            total,
            ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    /// Screens with at least one resolved `calls` edge.
    pub screens_with_calls: Coverage,
    /// Endpoints with at least one `reads` or `writes` edge.
    pub endpoints_with_data_access: Coverage,
    pub tables_with_rls: Coverage,
    /// Screens that belong to some feature.
    pub screens_in_features: Coverage,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    pub edges_by_type: BTreeMap<EdgeType, usize>,
    pub edges_by_confidence: BTreeMap<Confidence, usize>,
    pub evidence_by_kind: BTreeMap<EvidenceKind, usize>,
    pub evidence_total: usize,
    pub feature_count: usize,
    /// Edges still pointing at a placeholder or an unknown node.
    pub dangling_edges: usize,
    pub coverage: CoverageSummary,
    pub warnings: Vec<String>,
}

impl GraphSummary {
    pub fn from_graph(store: &GraphStore, features: &[Feature]) -> Self {
        let mut summary = Self {
            evidence_total: store.evidence_count(),
            feature_count: features.len(),
            dangling_edges: store.dangling_edges().count(),
            warnings: store.warnings().to_vec(),
            ..Default::default()
        };

        for node in store.nodes() {
            *summary.nodes_by_type.entry(node.node_type()).or_insert(0) += 1;
        }
        for edge in store.edges() {
            *summary.edges_by_type.entry(edge.edge_type).or_insert(0) += 1;
            *summary.edges_by_confidence.entry(edge.confidence).or_insert(0) += 1;
        }
        for evidence in store.evidence() {
            *summary.evidence_by_kind.entry(evidence.kind).or_insert(0) += 1;
        }

        let screens: Vec<&str> = store
            .nodes_of_type(NodeType::Screen)
            .map(|n| n.id.as_str())
            .collect();
        let calling = screens
            .iter()
            .filter(|id| {
                store.edges_from(id).any(|e| {
                    e.edge_type == EdgeType::Calls
                        && e.target_id().map_or(false, |t| store.contains_node(t))
                })
            })
            .count();

        let endpoints: Vec<&str> = store
            .nodes_of_type(NodeType::Endpoint)
            .map(|n| n.id.as_str())
            .collect();
        let accessing = endpoints
            .iter()
            .filter(|id| {
                store
                    .edges_from(id)
                    .any(|e| matches!(e.edge_type, EdgeType::Reads | EdgeType::Writes))
            })
            .count();

        let tables: Vec<bool> = store
            .nodes_of_type(NodeType::Table)
            .filter_map(|n| n.as_table().map(|t| t.has_rls))
            .collect();

        let featured: BTreeSet<&str> = features
            .iter()
            .flat_map(|f| f.screens.iter().map(String::as_str))
            .collect();
        let in_features = screens.iter().filter(|id| featured.contains(**id)).count();

        summary.coverage = CoverageSummary {
            screens_with_calls: Coverage::new(calling, screens.len()),
            endpoints_with_data_access: Coverage::new(accessing, endpoints.len()),
            tables_with_rls: Coverage::new(tables.iter().filter(|rls| **rls).count(), tables.len()),
            screens_in_features: Coverage::new(in_features, screens.len()),
        };
        summary
    }

    pub fn nodes_of(&self, node_type: NodeType) -> usize {
        self.nodes_by_type.get(&node_type).copied().unwrap_or(0)
    }
}

impl std::fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Nodes:")?;
        for (node_type, count) in &self.nodes_by_type {
            writeln!(f, "  {:<18} {}", node_type.as_str(), count)?;
        }
        writeln!(f, "Edges:")?;
        for (edge_type, count) in &self.edges_by_type {
            writeln!(f, "  {:<18} {}", edge_type.as_str(), count)?;
        }
        writeln!(f, "Confidence:")?;
        for (confidence, count) in &self.edges_by_confidence {
            writeln!(f, "  {:<18} {}", confidence.as_str(), count)?;
        }
        writeln!(f, "Evidence: {}", self.evidence_total)?;
        writeln!(f, "Features: {}", self.feature_count)?;
        writeln!(f, "Dangling edges: {}", self.dangling_edges)?;

        let coverage = [
            ("screens calling endpoints", &self.coverage.screens_with_calls),
            ("endpoints touching data", &self.coverage.endpoints_with_data_access),
            ("tables with RLS", &self.coverage.tables_with_rls),
            ("screens in features", &self.coverage.screens_in_features),
        ];
        writeln!(f, "Coverage:")?;
        for (label, c) in coverage {
            writeln!(f, "  {:<26} {}/{} ({:.0}%)", label, c.covered, c.total, c.ratio * 100.0)?;
        }
        write!(f, "Warnings: {}", self.warnings.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_ratio() {
        assert_eq!(Coverage::new(0, 0).ratio, 0.0);
        assert_eq!(Coverage::new(1, 4).ratio, 0.25);
    }

    #[test]
    fn test_empty_graph_summary() {
        let summary = GraphSummary::from_graph(&GraphStore::new(), &[]);
        assert_eq!(summary.evidence_total, 0);
        assert_eq!(summary.nodes_of(NodeType::Screen), 0);
        assert_eq!(summary.coverage.screens_with_calls.total, 0);
        assert!(summary.to_string().contains("Dangling edges: 0"));
    }

    #[test]
    fn test_summary_serializes_type_keys() {
        let mut summary = GraphSummary::default();
        summary.nodes_by_type.insert(NodeType::ExternalService, 2);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["nodesByType"]["external_service"], 2);
    }
}
