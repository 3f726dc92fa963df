//! Features: named clusters of nodes with an ordered user flow.

use serde::{Deserialize, Serialize};

/// Where a feature definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSource {
    Catalog,
    AutoDetected,
}

/// What a flow step points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Screen,
    ApiCall,
    DbOperation,
    ExternalCall,
}

/// One step in a feature flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    pub kind: StepKind,
    /// The screen, endpoint, table or service this step lands on.
    pub node_id: String,
    /// The edge walked to reach this step (none for screens).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
    pub evidence_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub source: FeatureSource,
    pub flow: Vec<FlowStep>,
    pub screens: Vec<String>,
    pub endpoints: Vec<String>,
    pub tables: Vec<String>,
    pub services: Vec<String>,
}

impl Feature {
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        source: FeatureSource,
    ) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            description: description.into(),
            source,
            flow: Vec::new(),
            screens: Vec::new(),
            endpoints: Vec::new(),
            tables: Vec::new(),
            services: Vec::new(),
        }
    }

    /// Steps of one kind, in flow order.
    pub fn steps(&self, kind: StepKind) -> impl Iterator<Item = &FlowStep> {
        self.flow.iter().filter(move |s| s.kind == kind)
    }
}
