//! Deterministic identifiers.
//!
//! Node IDs are a pure function of the node type and its discriminating keys,
//! so independent passes (and repeated runs over unchanged input) produce the
//! same ID for the same logical entity. This is what lets the route pass point
//! at endpoints and the endpoint pass point at tables before those nodes exist.
//!
//! IDs have the form `<type>_<16 hex chars>`, where the hex is a truncated
//! SHA-256 over the type tag and the normalized discriminators.

use sha2::{Digest, Sha256};

use crate::ontology::{EdgeType, HttpMethod, NodeType};

/// Unit separator between hashed parts, so ("ab","c") and ("a","bc") differ.
const SEPARATOR: &[u8] = b"\x1f";

/// Normalize a discriminator so cosmetic differences do not fork entities.
///
/// Trims whitespace, lower-cases, converts backslashes to forward slashes and
/// strips trailing slashes.
pub fn normalize_discriminator(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace('\\', "/");
    lowered
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

/// Generate the stable ID of a node.
pub fn generate_node_id(node_type: NodeType, discriminators: &[&str]) -> String {
    let normalized: Vec<String> = discriminators
        .iter()
        .map(|d| normalize_discriminator(d))
        .collect();
    hashed_id(node_type.as_str(), normalized.iter().map(String::as_str))
}

/// Generate the stable ID of an edge.
pub fn edge_id(edge_type: EdgeType, source: &str, target: &str, discriminator: &str) -> String {
    let discriminator = normalize_discriminator(discriminator);
    hashed_id(
        "edge",
        [edge_type.as_str(), source, target, discriminator.as_str()].into_iter(),
    )
}

/// Generate the stable ID of an evidence record from its content.
pub fn evidence_id(parts: &[&str]) -> String {
    hashed_id("ev", parts.iter().copied())
}

fn hashed_id<'a>(prefix: &str, parts: impl Iterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    for part in parts {
        hasher.update(SEPARATOR);
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    format!("{}_{}", prefix, hex::encode(&digest[..8]))
}

// --- Per-type helpers ---
//
// Every pass derives IDs through these so that forward references agree on
// the discriminators.

pub fn repo_id(repo: &str) -> String {
    generate_node_id(NodeType::Repo, &[repo])
}

pub fn app_id(repo_id: &str, root: &str) -> String {
    generate_node_id(NodeType::App, &[repo_id, root])
}

pub fn screen_id(repo_id: &str, route: &str) -> String {
    generate_node_id(NodeType::Screen, &[repo_id, route])
}

pub fn endpoint_id(repo_id: &str, method: HttpMethod, route: &str) -> String {
    generate_node_id(NodeType::Endpoint, &[repo_id, method.as_str(), route])
}

pub fn worker_id(repo_id: &str, path: &str, schedule: &str) -> String {
    generate_node_id(NodeType::Worker, &[repo_id, path, schedule])
}

/// Tables are project-wide: a handler in one repo may use a table whose
/// migration lives in another.
pub fn table_id(schema: &str, name: &str) -> String {
    generate_node_id(NodeType::Table, &[schema, name])
}

pub fn function_id(schema: &str, name: &str) -> String {
    generate_node_id(NodeType::Function, &[schema, name])
}

pub fn auth_id() -> String {
    generate_node_id(NodeType::Auth, &["auth"])
}

pub fn storage_id() -> String {
    generate_node_id(NodeType::Storage, &["storage"])
}

pub fn external_service_id(service: &str) -> String {
    generate_node_id(NodeType::ExternalService, &[service])
}

pub fn deployment_id(repo_id: &str, platform: &str) -> String {
    generate_node_id(NodeType::Deployment, &[repo_id, platform])
}

pub fn package_id(ecosystem: &str, name: &str) -> String {
    generate_node_id(NodeType::Package, &[ecosystem, name])
}
