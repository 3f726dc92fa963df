//! Architecture graph ontology.
//!
//! Defines the typed vocabulary the passes emit: nodes (screens, endpoints,
//! tables, services...), directed edges between them, and the evidence
//! citations backing each inferred fact.
//!
//! ## Modules
//!
//! - `nodes` - [`GraphNode`] with one metadata shape per [`NodeType`]
//! - `edges` - [`GraphEdge`], [`EdgeTarget`] placeholders and edge metadata
//! - `evidence` - [`Evidence`] citations and excerpt bounds
//! - `features` - [`Feature`] clusters with ordered flows

pub mod edges;
pub mod evidence;
pub mod features;
pub mod nodes;

pub use edges::*;
pub use evidence::*;
pub use features::*;
pub use nodes::*;

use serde::{Deserialize, Serialize};

/// Kinds of node in the architecture graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Repo,
    App,
    Screen,
    Endpoint,
    Worker,
    Table,
    Function,
    Storage,
    Auth,
    ExternalService,
    Deployment,
    Package,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repo => "repo",
            Self::App => "app",
            Self::Screen => "screen",
            Self::Endpoint => "endpoint",
            Self::Worker => "worker",
            Self::Table => "table",
            Self::Function => "function",
            Self::Storage => "storage",
            Self::Auth => "auth",
            Self::ExternalService => "external_service",
            Self::Deployment => "deployment",
            Self::Package => "package",
        }
    }
}

/// Kinds of directed relation between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// A structurally contains B (repo contains app, app contains screen)
    Contains,
    /// Screen A links or redirects to screen B
    NavigatesTo,
    /// A issues an HTTP call to endpoint B
    Calls,
    /// A reads table B (or references it through a foreign key)
    Reads,
    /// A inserts, updates, deletes or upserts rows of B
    Writes,
    /// A invokes database function B
    UsesFunction,
    /// A performs authentication or session calls against B
    Authenticates,
    /// A reads or writes objects in storage B
    Stores,
    /// A is deployed to B
    DeploysTo,
    /// A declares a dependency on package B
    DependsOn,
    /// A calls external service B
    CallsExternal,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::NavigatesTo => "navigates_to",
            Self::Calls => "calls",
            Self::Reads => "reads",
            Self::Writes => "writes",
            Self::UsesFunction => "uses_function",
            Self::Authenticates => "authenticates",
            Self::Stores => "stores",
            Self::DeploysTo => "deploys_to",
            Self::DependsOn => "depends_on",
            Self::CallsExternal => "calls_external",
        }
    }
}

/// Certainty attached to an inferred fact.
///
/// Ordered so that `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// HTTP method served by an endpoint or used by a call.
///
/// `All` marks a catch-all handler whose method could not be identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    All,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::All => "ALL",
        }
    }

    /// Parse a method name, case-insensitively. `ALL` is never parsed.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    /// Whether an endpoint serving `self` accepts a call made with `call`.
    pub fn accepts(&self, call: HttpMethod) -> bool {
        *self == HttpMethod::All || *self == call
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!(HttpMethod::parse("post"), Some(HttpMethod::Post));
        assert_eq!(HttpMethod::parse("Delete"), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::parse("ALL"), None);
    }

    #[test]
    fn test_catch_all_accepts_any_method() {
        assert!(HttpMethod::All.accepts(HttpMethod::Post));
        assert!(HttpMethod::Get.accepts(HttpMethod::Get));
        assert!(!HttpMethod::Get.accepts(HttpMethod::Post));
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }
}
