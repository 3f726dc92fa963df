//! The six analysis passes.
//!
//! Each pass reads the corpus plus an immutable view of the store so far and
//! returns a [`PassOutput`]; the pipeline merges it before the next pass runs.
//! Per-file extraction inside a pass runs on the rayon pool and is collected
//! in file order.

mod data_model;
mod deployment;
mod endpoints;
mod features;
mod inventory;
pub mod patterns;
mod routes;
pub mod routing;
mod text;

pub use data_model::DataModelPass;
pub use deployment::DeploymentPass;
pub use endpoints::EndpointPass;
pub use features::{FeatureDefinition, FeaturePass, FEATURE_CATALOG};
pub use inventory::InventoryPass;
pub use routes::RoutePass;

use crate::config::DiscoveryConfig;
use crate::corpus::AnalysisInput;
use crate::graph::{GraphStore, PassOutput};
use crate::ids;
use crate::ontology::{ExternalServiceMeta, GraphNode, NodeMetadata, NodeType};
use patterns::ServiceDef;

/// Read-only inputs shared by every pass.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    pub input: &'a AnalysisInput,
    pub config: &'a DiscoveryConfig,
}

impl<'a> PassContext<'a> {
    pub fn new(input: &'a AnalysisInput, config: &'a DiscoveryConfig) -> Self {
        Self { input, config }
    }
}

/// One stage of architecture discovery.
pub trait AnalysisPass: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Analyze the corpus. Never fails: unparseable fragments are skipped
    /// and reported through [`PassOutput::warnings`].
    fn run(&self, ctx: &PassContext<'_>, store: &GraphStore) -> PassOutput;
}

/// The passes in the order they must run.
pub fn default_passes() -> Vec<Box<dyn AnalysisPass>> {
    vec![
        Box::new(InventoryPass),
        Box::new(RoutePass),
        Box::new(EndpointPass),
        Box::new(DataModelPass),
        Box::new(DeploymentPass),
        Box::new(FeaturePass::default()),
    ]
}

/// App roots of one repository, for attributing files to apps.
#[derive(Debug, Clone, Default)]
pub struct AppIndex {
    /// `(root, app id)`, longest root first.
    apps: Vec<(String, String)>,
}

impl AppIndex {
    /// Apps the store holds for `repo_node_id`.
    pub fn for_repo(store: &GraphStore, repo_node_id: &str) -> Self {
        let mut apps: Vec<(String, String)> = store
            .nodes_of_type(NodeType::App)
            .filter(|n| n.owning_repo_id.as_deref() == Some(repo_node_id))
            .filter_map(|n| n.as_app().map(|a| (a.root.clone(), n.id.clone())))
            .collect();
        apps.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { apps }
    }

    /// The app whose root is the longest prefix of `path`.
    pub fn owner_of(&self, path: &str) -> Option<&str> {
        self.apps
            .iter()
            .find(|(root, _)| text::is_under(path, root))
            .map(|(_, id)| id.as_str())
    }

    /// The app rooted exactly at `dir`.
    pub fn rooted_at(&self, dir: &str) -> Option<&str> {
        let dir = if dir.is_empty() { "." } else { dir };
        self.apps
            .iter()
            .find(|(root, _)| root == dir)
            .map(|(_, id)| id.as_str())
    }

    /// App IDs ordered by root.
    pub fn ids(&self) -> Vec<&str> {
        let mut apps: Vec<&(String, String)> = self.apps.iter().collect();
        apps.sort_by(|a, b| a.0.cmp(&b.0));
        apps.into_iter().map(|(_, id)| id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// Node for a catalogued external service.
fn service_node(def: &ServiceDef, host: Option<&str>) -> GraphNode {
    GraphNode::new(
        ids::external_service_id(def.slug),
        def.name,
        NodeMetadata::ExternalService(ExternalServiceMeta {
            service: def.slug.to_string(),
            category: def.category.to_string(),
            host: host.map(str::to_string),
        }),
    )
}

/// Node for an uncatalogued host, keyed by the host itself.
fn host_node(host: &str) -> GraphNode {
    GraphNode::new(
        ids::external_service_id(host),
        host,
        NodeMetadata::ExternalService(ExternalServiceMeta {
            service: host.to_string(),
            category: "http".to_string(),
            host: Some(host.to_string()),
        }),
    )
}
