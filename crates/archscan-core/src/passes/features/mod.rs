//! Feature-extraction pass.
//!
//! Stage one matches the catalog against discovered screens, endpoints and
//! tables; a definition with no matching screen has no entry point and is
//! not emitted. Stage two groups the screens no catalog feature covers by
//! their first two route segments and names sufficiently large groups.
//!
//! Flows are ordered screens first (shallowest route first), each followed
//! by its calls into the feature's endpoints, then per endpoint its table
//! operations and external calls.

mod catalog;

pub use catalog::{FeatureDefinition, FEATURE_CATALOG};

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use super::routing::{depth, route_regex, segments, strip_api_prefix, title_case};
use super::{AnalysisPass, PassContext};
use crate::config::{FeatureConfig, MAX_SCREEN_EVIDENCE_CAP, MAX_STEP_EVIDENCE_CAP};
use crate::graph::{GraphStore, PassOutput};
use crate::ontology::{
    EdgeType, Feature, FeatureSource, FlowStep, GraphEdge, GraphNode, NodeType, StepKind,
};

pub struct FeaturePass {
    catalog: &'static [FeatureDefinition],
}

impl Default for FeaturePass {
    fn default() -> Self {
        Self::with_catalog(FEATURE_CATALOG)
    }
}

impl FeaturePass {
    pub fn with_catalog(catalog: &'static [FeatureDefinition]) -> Self {
        Self { catalog }
    }
}

impl AnalysisPass for FeaturePass {
    fn name(&self) -> &'static str {
        "features"
    }

    fn run(&self, ctx: &PassContext<'_>, store: &GraphStore) -> PassOutput {
        let caps = &ctx.config.features;
        let screens: Vec<&GraphNode> = store.nodes_of_type(NodeType::Screen).collect();
        let endpoints: Vec<&GraphNode> = store.nodes_of_type(NodeType::Endpoint).collect();
        let tables: Vec<&GraphNode> = store.nodes_of_type(NodeType::Table).collect();

        let mut output = PassOutput::new();
        let mut covered: BTreeSet<&str> = BTreeSet::new();

        for def in self.catalog {
            let route_matchers = matchers(def.routes);
            let matched_screens: Vec<&GraphNode> = screens
                .iter()
                .copied()
                .filter(|s| matches_route(&route_matchers, s))
                .collect();
            if matched_screens.is_empty() {
                tracing::debug!("Feature {} has no matching screen, skipped", def.slug);
                continue;
            }

            let endpoint_matchers = matchers(def.endpoints);
            let matched_endpoints: Vec<&GraphNode> = endpoints
                .iter()
                .copied()
                .filter(|e| matches_route(&endpoint_matchers, e))
                .collect();
            let matched_tables: Vec<&GraphNode> = tables
                .iter()
                .copied()
                .filter(|t| def.tables.contains(&t.label.as_str()))
                .collect();

            let mut feature =
                Feature::new(def.slug, def.name, def.description, FeatureSource::Catalog);
            feature.tables = matched_tables.iter().map(|t| t.id.clone()).collect();
            let table_ids: BTreeSet<&str> = matched_tables.iter().map(|t| t.id.as_str()).collect();
            build_flow(
                &mut feature,
                store,
                &matched_screens,
                &matched_endpoints,
                TableScope::Only(&table_ids),
                caps,
            );

            covered.extend(matched_screens.iter().map(|s| s.id.as_str()));
            output.features.push(feature);
        }

        self.auto_detect(&mut output, store, &screens, &endpoints, &covered, caps);

        tracing::debug!("{} features extracted", output.features.len());
        output
    }
}

impl FeaturePass {
    /// Stage two: uncovered screens grouped by their first two segments.
    fn auto_detect(
        &self,
        output: &mut PassOutput,
        store: &GraphStore,
        screens: &[&GraphNode],
        endpoints: &[&GraphNode],
        covered: &BTreeSet<&str>,
        caps: &FeatureConfig,
    ) {
        let mut groups: BTreeMap<String, Vec<&GraphNode>> = BTreeMap::new();
        for screen in screens.iter().copied().filter(|s| !covered.contains(s.id.as_str())) {
            let route = screen.route().unwrap_or("/");
            let prefix: Vec<&str> = segments(route).take(2).collect();
            groups
                .entry(format!("/{}", prefix.join("/")))
                .or_default()
                .push(screen);
        }

        for (prefix, group) in groups {
            if group.len() < caps.min_auto_feature_screens.max(1) {
                continue;
            }
            let slug = slug_for_prefix(&prefix);
            if output.features.iter().any(|f| f.slug == slug) {
                tracing::debug!("Auto feature {} collides with a catalog feature, skipped", slug);
                continue;
            }

            // The root group owns no endpoints.
            let matched_endpoints: Vec<&GraphNode> = endpoints
                .iter()
                .copied()
                .filter(|e| {
                    let route = strip_api_prefix(e.route().unwrap_or(""));
                    prefix != "/" && is_under_route(route, &prefix)
                })
                .collect();

            let mut feature = Feature::new(
                slug.clone(),
                title_case(&slug),
                format!("{} screens under {}", group.len(), prefix),
                FeatureSource::AutoDetected,
            );
            build_flow(&mut feature, store, &group, &matched_endpoints, TableScope::Any, caps);
            output.features.push(feature);
        }
    }
}

/// Which tables count as part of a feature's data flow.
#[derive(Clone, Copy)]
enum TableScope<'a> {
    Only(&'a BTreeSet<&'a str>),
    /// Every table the feature's endpoints touch; these become members.
    Any,
}

fn build_flow(
    feature: &mut Feature,
    store: &GraphStore,
    screens: &[&GraphNode],
    endpoints: &[&GraphNode],
    tables: TableScope<'_>,
    caps: &FeatureConfig,
) {
    let mut ordered: Vec<&GraphNode> = screens.to_vec();
    ordered.sort_by(|a, b| {
        let (ra, rb) = (a.route().unwrap_or(""), b.route().unwrap_or(""));
        depth(ra).cmp(&depth(rb)).then_with(|| ra.cmp(rb))
    });
    let endpoint_ids: BTreeSet<&str> = endpoints.iter().map(|e| e.id.as_str()).collect();

    for screen in &ordered {
        feature.flow.push(FlowStep {
            kind: StepKind::Screen,
            node_id: screen.id.clone(),
            edge_id: None,
            evidence_ids: store
                .evidence_for_node(&screen.id)
                .take(caps.screen_evidence_cap.min(MAX_SCREEN_EVIDENCE_CAP))
                .map(|ev| ev.id.clone())
                .collect(),
        });

        for edge in store.edges_from(&screen.id) {
            if edge.edge_type != EdgeType::Calls {
                continue;
            }
            if let Some(target) = edge.target_id().filter(|t| endpoint_ids.contains(t)) {
                feature.flow.push(edge_step(StepKind::ApiCall, target, edge, caps));
            }
        }
    }

    for endpoint in endpoints {
        for edge in store.edges_from(&endpoint.id) {
            let Some(target) = edge.target_id() else { continue };
            match edge.edge_type {
                EdgeType::Reads | EdgeType::Writes => {
                    let in_scope = match tables {
                        TableScope::Only(allowed) => allowed.contains(target),
                        TableScope::Any => store
                            .node(target)
                            .map(|n| n.node_type() == NodeType::Table)
                            .unwrap_or(false),
                    };
                    if !in_scope {
                        continue;
                    }
                    if matches!(tables, TableScope::Any) {
                        push_unique(&mut feature.tables, target);
                    }
                    feature.flow.push(edge_step(StepKind::DbOperation, target, edge, caps));
                }
                EdgeType::CallsExternal => {
                    push_unique(&mut feature.services, target);
                    feature.flow.push(edge_step(StepKind::ExternalCall, target, edge, caps));
                }
                _ => {}
            }
        }
    }

    feature.screens = ordered.iter().map(|s| s.id.clone()).collect();
    feature.endpoints = endpoints.iter().map(|e| e.id.clone()).collect();
}

fn edge_step(kind: StepKind, target: &str, edge: &GraphEdge, caps: &FeatureConfig) -> FlowStep {
    FlowStep {
        kind,
        node_id: target.to_string(),
        edge_id: Some(edge.id.clone()),
        evidence_ids: edge
            .evidence_ids
            .iter()
            .take(caps.step_evidence_cap.min(MAX_STEP_EVIDENCE_CAP))
            .cloned()
            .collect(),
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn matchers(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| route_regex(p)).collect()
}

fn matches_route(matchers: &[Regex], node: &GraphNode) -> bool {
    node.route()
        .map(|route| matchers.iter().any(|m| m.is_match(route)))
        .unwrap_or(false)
}

fn is_under_route(route: &str, prefix: &str) -> bool {
    route == prefix
        || route
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

/// `"/reports/[id]"` → `"reports-id"`; the root group is `"home"`.
fn slug_for_prefix(prefix: &str) -> String {
    let parts: Vec<String> = segments(prefix)
        .map(|s| {
            s.trim_matches(|c: char| matches!(c, '[' | ']' | '.' | '(' | ')' | ':'))
                .to_lowercase()
        })
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        "home".to_string()
    } else {
        parts.join("-")
    }
}
