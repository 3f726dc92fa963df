//! Edge types (relationships) for the architecture graph.
//!
//! An edge's target is either a real node ID or a placeholder standing in for
//! a node a later pass will discover. Placeholders serialize to the plain
//! `"api:<path>"` string form; real IDs never contain a colon.

use serde::{Deserialize, Serialize};

use super::{Confidence, EdgeType, HttpMethod};
use crate::ids;

/// Prefix marking a placeholder target.
pub const PLACEHOLDER_PREFIX: &str = "api:";

/// Target of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EdgeTarget {
    /// A real node ID.
    Node(String),
    /// An API path awaiting resolution to an endpoint node.
    Placeholder(String),
}

impl EdgeTarget {
    pub fn node(id: impl Into<String>) -> Self {
        Self::Node(id.into())
    }

    pub fn placeholder(path: impl Into<String>) -> Self {
        Self::Placeholder(path.into())
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    /// The node ID, if resolved.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::Node(id) => Some(id),
            Self::Placeholder(_) => None,
        }
    }

    /// The wire form: the node ID, or `"api:" + path`.
    pub fn as_wire(&self) -> String {
        match self {
            Self::Node(id) => id.clone(),
            Self::Placeholder(path) => format!("{}{}", PLACEHOLDER_PREFIX, path),
        }
    }
}

impl From<EdgeTarget> for String {
    fn from(target: EdgeTarget) -> Self {
        target.as_wire()
    }
}

impl From<String> for EdgeTarget {
    fn from(raw: String) -> Self {
        match raw.strip_prefix(PLACEHOLDER_PREFIX) {
            Some(path) => Self::Placeholder(path.to_string()),
            None => Self::Node(raw),
        }
    }
}

impl std::fmt::Display for EdgeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_wire())
    }
}

/// A typed, directed, confidence-scored relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Derived from type, source, the original target and a discriminator.
    /// Stays stable when a placeholder target is resolved.
    pub id: String,
    pub source: String,
    pub target: EdgeTarget,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub confidence: Confidence,
    pub evidence_ids: Vec<String>,
    pub metadata: EdgeMetadata,
}

impl GraphEdge {
    /// Create an edge. `discriminator` separates edges sharing type, source and
    /// target (e.g. the HTTP method of a call, the column of a foreign key).
    pub fn new(
        edge_type: EdgeType,
        source: impl Into<String>,
        target: EdgeTarget,
        discriminator: &str,
    ) -> Self {
        let source = source.into();
        let id = ids::edge_id(edge_type, &source, &target.as_wire(), discriminator);
        Self {
            id,
            source,
            target,
            edge_type,
            confidence: Confidence::High,
            evidence_ids: Vec::new(),
            metadata: EdgeMetadata::None,
        }
    }

    /// A structural `contains` edge. Carries no evidence.
    pub fn contains(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(EdgeType::Contains, source, EdgeTarget::node(target), "")
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_metadata(mut self, metadata: EdgeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_evidence(mut self, evidence_id: impl Into<String>) -> Self {
        self.evidence_ids.push(evidence_id.into());
        self
    }

    /// Node ID of the target, if resolved.
    pub fn target_id(&self) -> Option<&str> {
        self.target.node_id()
    }
}

/// Database operation disambiguated from a query-builder chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbOperation {
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
}

impl DbOperation {
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "select" => Some(Self::Select),
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "upsert" => Some(Self::Upsert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Upsert => "upsert",
        }
    }

    /// `reads` for selects, `writes` for everything else.
    pub fn edge_type(&self) -> EdgeType {
        match self {
            Self::Select => EdgeType::Reads,
            _ => EdgeType::Writes,
        }
    }
}

/// Type-specific edge metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeMetadata {
    /// Structural edges and edges with nothing further to say.
    #[default]
    None,
    HttpCall {
        method: HttpMethod,
        path: String,
        client: String,
    },
    Navigation {
        path: String,
        via: String,
    },
    DataAccess {
        operation: DbOperation,
        table: String,
    },
    Rpc {
        function: String,
    },
    ExternalCall {
        host: Option<String>,
        via: String,
    },
    AuthCall {
        call: String,
    },
    StorageAccess {
        bucket: String,
    },
    ForeignKey {
        column: String,
        references: String,
    },
    Trigger {
        trigger: String,
    },
    Dependency {
        version: Option<String>,
    },
    Cron {
        schedule: Option<String>,
    },
    EnvVar {
        variables: Vec<String>,
    },
}

impl EdgeMetadata {
    /// Method recorded on an HTTP call edge.
    pub fn http_method(&self) -> Option<HttpMethod> {
        match self {
            Self::HttpCall { method, .. } => Some(*method),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_wire_form_round_trips() {
        let target = EdgeTarget::placeholder("/api/users/42");
        let wire: String = target.clone().into();
        assert_eq!(wire, "api:/api/users/42");
        assert_eq!(EdgeTarget::from(wire), target);
        assert_eq!(
            EdgeTarget::from("endpoint_abc".to_string()),
            EdgeTarget::node("endpoint_abc")
        );
    }

    #[test]
    fn test_edge_id_is_stable_across_resolution() {
        let mut edge = GraphEdge::new(
            EdgeType::Calls,
            "screen_1",
            EdgeTarget::placeholder("/api/projects"),
            "GET",
        );
        let before = edge.id.clone();
        edge.target = EdgeTarget::node("endpoint_1");
        assert_eq!(edge.id, before);
        assert_eq!(edge.target_id(), Some("endpoint_1"));
    }

    #[test]
    fn test_db_operation_edge_type() {
        assert_eq!(DbOperation::Select.edge_type(), EdgeType::Reads);
        assert_eq!(DbOperation::Upsert.edge_type(), EdgeType::Writes);
    }

    #[test]
    fn test_serialized_target_is_string() {
        let edge = GraphEdge::new(
            EdgeType::Calls,
            "screen_1",
            EdgeTarget::placeholder("/api/x"),
            "",
        );
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["target"], "api:/api/x");
        assert_eq!(json["type"], "calls");
        assert_eq!(json["metadata"]["kind"], "none");
    }
}
