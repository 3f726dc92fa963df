//! Architecture discovery for web application repositories.
//!
//! Six sequential passes turn a corpus of repository files into a typed
//! graph of repos, apps, screens, endpoints, tables, services and
//! deployments, with every inferred fact backed by evidence citations.
//!
//! ```no_run
//! use archscan_core::{load_repository, AnalysisInput, DiscoveryConfig, Pipeline};
//!
//! let config = DiscoveryConfig::load()?;
//! let loaded = load_repository("./my-app", &config.corpus)?;
//! let mut input = AnalysisInput::new("my-app");
//! input.add_loaded(loaded);
//! let output = Pipeline::new(config).run(&input);
//! println!("{}", output.summary);
//! # Ok::<(), archscan_core::ArchscanError>(())
//! ```

pub mod config;
pub mod corpus;
pub mod error;
pub mod graph;
pub mod ids;
pub mod ontology;
pub mod passes;
pub mod pipeline;
pub mod summary;

pub use config::{ConfigError, DiscoveryConfig};
pub use corpus::{
    load_repository, AnalysisInput, CorpusLoader, LoadedRepository, RepoFile, Repository,
};
pub use error::ArchscanError;
pub use graph::{GraphStore, MergeStats, PassOutput};
pub use ontology::{
    Confidence, EdgeTarget, EdgeType, Evidence, EvidenceKind, Feature, GraphEdge, GraphNode,
    HttpMethod, NodeMetadata, NodeType,
};
pub use passes::{default_passes, AnalysisPass, PassContext};
pub use pipeline::{AnalysisOutput, Pipeline};
pub use summary::GraphSummary;
