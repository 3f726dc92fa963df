//! Node types for the architecture graph.
//!
//! A [`GraphNode`] carries the fields every node shares; everything that
//! depends on the node's kind lives in [`NodeMetadata`], a closed union with
//! exactly one shape per [`NodeType`]. The node's type is derived from the
//! metadata variant, so the two can never disagree.

use serde::{Deserialize, Serialize};

use super::{HttpMethod, NodeType};

/// A typed fact about the analyzed system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Deterministic identifier, see [`crate::ids`].
    pub id: String,

    /// Display name.
    pub label: String,

    /// Repository the node was discovered in, when it belongs to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owning_repo_id: Option<String>,

    /// Type tag plus type-specific metadata.
    #[serde(flatten)]
    pub metadata: NodeMetadata,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, metadata: NodeMetadata) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            owning_repo_id: None,
            metadata,
        }
    }

    pub fn with_repo(mut self, repo_id: impl Into<String>) -> Self {
        self.owning_repo_id = Some(repo_id.into());
        self
    }

    pub fn node_type(&self) -> NodeType {
        self.metadata.node_type()
    }

    /// Route pattern for screens and endpoints.
    pub fn route(&self) -> Option<&str> {
        match &self.metadata {
            NodeMetadata::Screen(s) => Some(&s.route),
            NodeMetadata::Endpoint(e) => Some(&e.route),
            _ => None,
        }
    }

    pub fn as_endpoint(&self) -> Option<&EndpointMeta> {
        match &self.metadata {
            NodeMetadata::Endpoint(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableMeta> {
        match &self.metadata {
            NodeMetadata::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_app(&self) -> Option<&AppMeta> {
        match &self.metadata {
            NodeMetadata::App(a) => Some(a),
            _ => None,
        }
    }
}

/// Type-specific node metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "metadata", rename_all = "snake_case")]
pub enum NodeMetadata {
    Repo(RepoMeta),
    App(AppMeta),
    Screen(ScreenMeta),
    Endpoint(EndpointMeta),
    Worker(WorkerMeta),
    Table(TableMeta),
    Function(FunctionMeta),
    Storage(StorageMeta),
    Auth(AuthMeta),
    ExternalService(ExternalServiceMeta),
    Deployment(DeploymentMeta),
    Package(PackageMeta),
}

impl NodeMetadata {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Repo(_) => NodeType::Repo,
            Self::App(_) => NodeType::App,
            Self::Screen(_) => NodeType::Screen,
            Self::Endpoint(_) => NodeType::Endpoint,
            Self::Worker(_) => NodeType::Worker,
            Self::Table(_) => NodeType::Table,
            Self::Function(_) => NodeType::Function,
            Self::Storage(_) => NodeType::Storage,
            Self::Auth(_) => NodeType::Auth,
            Self::ExternalService(_) => NodeType::ExternalService,
            Self::Deployment(_) => NodeType::Deployment,
            Self::Package(_) => NodeType::Package,
        }
    }
}

// =============================================================================
// STRUCTURE
// =============================================================================

/// A source repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoMeta {
    pub owner: String,
    pub name: String,
    pub provider: String,
    pub default_branch: String,
    /// Detected frameworks, sorted.
    pub frameworks: Vec<String>,
    /// Dominant language by file count. Absent when nothing recognisable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub monorepo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monorepo_tool: Option<String>,
}

/// A deployable unit inside a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMeta {
    /// Directory relative to the repo root ("" for single-app repos).
    pub root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A dependency declared in a manifest, or a workspace package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// "npm" for registry dependencies, "workspace" for monorepo packages.
    pub ecosystem: String,
}

// =============================================================================
// UI & API
// =============================================================================

/// Routing convention a screen was discovered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterKind {
    AppRouter,
    PagesRouter,
    SvelteKit,
}

/// A user-facing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenMeta {
    /// Route pattern, e.g. "/projects/[id]".
    pub route: String,
    pub file_path: String,
    pub is_dynamic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    /// Nearest layout file wrapping this page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    pub router: RouterKind,
}

/// Convention an endpoint handler was discovered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    RouteHandler,
    PagesApi,
    SvelteKitServer,
    EdgeFunction,
}

/// A server route handler for one HTTP method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMeta {
    pub method: HttpMethod,
    /// Route pattern, e.g. "/api/users/[id]".
    pub route: String,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    pub handler: HandlerKind,
}

/// A scheduled background job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Path the job invokes.
    pub path: String,
    pub file_path: String,
}

// =============================================================================
// DATA
// =============================================================================

/// A database table parsed from migrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    pub schema: String,
    pub columns: Vec<Column>,
    pub has_rls: bool,
    /// Names of row-level-security policies on this table.
    pub policies: Vec<String>,
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub foreign_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<ColumnReference>,
}

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// A database function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionMeta {
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub security_definer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
}

/// Object storage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageMeta {
    pub buckets: Vec<String>,
}

/// The authentication subsystem.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

// =============================================================================
// INFRASTRUCTURE
// =============================================================================

/// A third-party service the system talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalServiceMeta {
    /// Stable service slug, e.g. "stripe", or the host for unknown services.
    pub service: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// A deployment target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentMeta {
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    /// True when no platform config exists and the platform was inferred.
    pub inferred: bool,
    /// Environment variables referenced by the repository, sorted and unique.
    pub env_vars: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_follows_metadata() {
        let node = GraphNode::new(
            "auth_1",
            "Auth",
            NodeMetadata::Auth(AuthMeta::default()),
        );
        assert_eq!(node.node_type(), NodeType::Auth);
        assert!(node.route().is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let node = GraphNode::new(
            "endpoint_1",
            "GET /api/projects",
            NodeMetadata::Endpoint(EndpointMeta {
                method: HttpMethod::Get,
                route: "/api/projects".to_string(),
                file_path: "app/api/projects/route.ts".to_string(),
                feature: None,
                handler: HandlerKind::RouteHandler,
            }),
        )
        .with_repo("repo_1");

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "endpoint");
        assert_eq!(json["owningRepoId"], "repo_1");
        assert_eq!(json["metadata"]["method"], "GET");
        assert_eq!(json["metadata"]["filePath"], "app/api/projects/route.ts");
    }
}
