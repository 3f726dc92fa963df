//! Evidence citations.
//!
//! Every inferred node or edge points at one or more [`Evidence`] records in
//! the ledger. Excerpts are bounded: [`LINE_EXCERPT_CAP`] characters for a
//! single source line, [`BLOCK_EXCERPT_CAP`] for whole SQL statements.

use serde::{Deserialize, Serialize};

use super::Confidence;
use crate::ids;

/// Maximum characters in a line-level excerpt.
pub const LINE_EXCERPT_CAP: usize = 300;

/// Maximum characters in a table/function statement excerpt.
pub const BLOCK_EXCERPT_CAP: usize = 500;

/// What kind of source construct a citation points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    RouteDefinition,
    Handler,
    PageComponent,
    DbTable,
    DbFunction,
    SqlMigration,
    EnvVar,
    FetchCall,
    BackendClientCall,
    DeploymentConfig,
    PackageDependency,
    ImportStatement,
    ExternalApiCall,
    ComponentUsage,
    RlsPolicy,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RouteDefinition => "route_definition",
            Self::Handler => "handler",
            Self::PageComponent => "page_component",
            Self::DbTable => "db_table",
            Self::DbFunction => "db_function",
            Self::SqlMigration => "sql_migration",
            Self::EnvVar => "env_var",
            Self::FetchCall => "fetch_call",
            Self::BackendClientCall => "backend_client_call",
            Self::DeploymentConfig => "deployment_config",
            Self::PackageDependency => "package_dependency",
            Self::ImportStatement => "import_statement",
            Self::ExternalApiCall => "external_api_call",
            Self::ComponentUsage => "component_usage",
            Self::RlsPolicy => "rls_policy",
        }
    }
}

/// A citation tying a fact to a source location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: String,
    pub kind: EvidenceKind,
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
    /// Absent only when a migration fact could not be traced to one file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    pub excerpt: String,
    pub confidence: Confidence,
}

impl Evidence {
    /// Start a citation for `node_id`.
    pub fn builder(kind: EvidenceKind, node_id: impl Into<String>) -> EvidenceBuilder {
        EvidenceBuilder {
            kind,
            node_id: node_id.into(),
            edge_id: None,
            file_path: None,
            line_start: None,
            line_end: None,
            excerpt: String::new(),
            confidence: Confidence::High,
        }
    }
}

/// Builder for [`Evidence`]; the ID is derived from the content in `build`.
#[derive(Debug, Clone)]
pub struct EvidenceBuilder {
    kind: EvidenceKind,
    node_id: String,
    edge_id: Option<String>,
    file_path: Option<String>,
    line_start: Option<u32>,
    line_end: Option<u32>,
    excerpt: String,
    confidence: Confidence,
}

impl EvidenceBuilder {
    pub fn edge(mut self, edge_id: impl Into<String>) -> Self {
        self.edge_id = Some(edge_id.into());
        self
    }

    pub fn file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Single 1-based line.
    pub fn line(mut self, line: u32) -> Self {
        self.line_start = Some(line);
        self.line_end = Some(line);
        self
    }

    pub fn lines(mut self, start: u32, end: u32) -> Self {
        self.line_start = Some(start);
        self.line_end = Some(end.max(start));
        self
    }

    /// Line-level excerpt, trimmed and capped at [`LINE_EXCERPT_CAP`].
    pub fn excerpt(mut self, text: &str) -> Self {
        self.excerpt = bound_excerpt(text.trim(), LINE_EXCERPT_CAP);
        self
    }

    /// Statement excerpt, capped at [`BLOCK_EXCERPT_CAP`].
    pub fn block_excerpt(mut self, text: &str) -> Self {
        self.excerpt = bound_excerpt(text.trim(), BLOCK_EXCERPT_CAP);
        self
    }

    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn build(self) -> Evidence {
        let line = self.line_start.map(|l| l.to_string()).unwrap_or_default();
        let id = ids::evidence_id(&[
            self.kind.as_str(),
            &self.node_id,
            self.edge_id.as_deref().unwrap_or(""),
            self.file_path.as_deref().unwrap_or(""),
            &line,
            &self.excerpt,
        ]);
        Evidence {
            id,
            kind: self.kind,
            node_id: self.node_id,
            edge_id: self.edge_id,
            file_path: self.file_path,
            line_start: self.line_start,
            line_end: self.line_end,
            excerpt: self.excerpt,
            confidence: self.confidence,
        }
    }
}

/// Truncate `text` to at most `cap` characters, on a char boundary.
pub fn bound_excerpt(text: &str, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
