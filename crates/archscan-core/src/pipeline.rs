//! The graph assembler: runs the passes in order over one corpus and merges
//! each pass's output before the next one starts.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::DiscoveryConfig;
use crate::corpus::AnalysisInput;
use crate::error::ArchscanError;
use crate::graph::GraphStore;
use crate::ontology::{EdgeType, Evidence, Feature, GraphEdge, GraphNode, NodeType};
use crate::passes::{default_passes, AnalysisPass, PassContext};
use crate::summary::GraphSummary;

/// Result of one "analyze this project" run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutput {
    pub project_id: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub evidence: Vec<Evidence>,
    pub features: Vec<Feature>,
    pub summary: GraphSummary,
}

impl AnalysisOutput {
    pub fn to_json(&self) -> Result<String, ArchscanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(move |n| n.node_type() == node_type)
    }

    pub fn edges_of_type(&self, edge_type: EdgeType) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.edge_type == edge_type)
    }

    pub fn feature(&self, slug: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.slug == slug)
    }
}

/// Runs analysis passes sequentially against a shared store.
///
/// Each pass sees an immutable view of everything merged so far; the
/// pipeline alone mutates the store.
pub struct Pipeline {
    config: DiscoveryConfig,
    passes: Vec<Box<dyn AnalysisPass>>,
}

impl Pipeline {
    /// A pipeline with the standard passes.
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            passes: default_passes(),
        }
    }

    /// Like [`Pipeline::new`], but rejects a configuration that fails
    /// [`DiscoveryConfig::validate`]. Use this for configs built in code.
    pub fn try_new(config: DiscoveryConfig) -> Result<Self, ArchscanError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Replace the pass list, e.g. to run a subset.
    pub fn with_passes(mut self, passes: Vec<Box<dyn AnalysisPass>>) -> Self {
        self.passes = passes;
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Analyze `input`. Never fails; problems surface as summary warnings.
    pub fn run(&self, input: &AnalysisInput) -> AnalysisOutput {
        let threads = self.config.analysis.worker_threads;
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| self.run_passes(input)),
            Err(e) => {
                tracing::warn!("Could not build worker pool, using the global one: {}", e);
                self.run_passes(input)
            }
        }
    }

    fn run_passes(&self, input: &AnalysisInput) -> AnalysisOutput {
        let ctx = PassContext::new(input, &self.config);
        let mut store = GraphStore::new();
        let mut features = Vec::new();

        tracing::info!(
            "Analyzing project {} ({} repositories, {} files with content)",
            input.project_id,
            input.repositories.len(),
            input.contents.len()
        );

        for pass in &self.passes {
            let started = Instant::now();
            let mut output = pass.run(&ctx, &store);
            features.append(&mut output.features);
            let stats = store.merge(output);
            tracing::info!(
                "Pass {} finished in {}ms: {}",
                pass.name(),
                started.elapsed().as_millis(),
                stats
            );
        }

        let summary = GraphSummary::from_graph(&store, &features);
        tracing::info!(
            "Graph assembled: {} nodes, {} edges ({} dangling), {} evidence, {} features",
            store.node_count(),
            store.edge_count(),
            summary.dangling_edges,
            store.evidence_count(),
            features.len()
        );

        let (nodes, edges, evidence) = store.into_parts();
        AnalysisOutput {
            project_id: input.project_id.clone(),
            nodes,
            edges,
            evidence,
            features,
            summary,
        }
    }
}
