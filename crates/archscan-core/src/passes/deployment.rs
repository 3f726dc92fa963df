//! Deployment pass: platforms, environment variables, the external services
//! they imply, and scheduled jobs.

use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::patterns::{
    service_def, service_for_env, CONFIG_DIRS, ENV_ASSIGNMENT_RE, FRAMEWORK_CONFIG_PREFIXES,
    INFERRED_PLATFORMS, PLATFORM_CONFIGS, PUBLIC_ENV_RE, SECRET_ENV_RE, SINGLETON_SERVICES,
};
use super::routing::{normalize_path, RouteIndex};
use super::text::{file_name, find_line, first_line, parent_dir};
use super::{service_node, AnalysisPass, AppIndex, PassContext};
use crate::corpus::RepoView;
use crate::graph::{GraphStore, PassOutput};
use crate::ids;
use crate::ontology::{
    Confidence, DeploymentMeta, EdgeMetadata, EdgeTarget, EdgeType, Evidence, EvidenceKind,
    GraphEdge, GraphNode, HttpMethod, NodeMetadata, NodeType, WorkerMeta,
};

pub struct DeploymentPass;

impl AnalysisPass for DeploymentPass {
    fn name(&self) -> &'static str {
        "deployment"
    }

    fn run(&self, ctx: &PassContext<'_>, store: &GraphStore) -> PassOutput {
        let endpoints = RouteIndex::from_nodes(store.nodes_of_type(NodeType::Endpoint));
        let repos: Vec<RepoView<'_>> = ctx.input.repos().collect();
        let outputs: Vec<PassOutput> = repos
            .par_iter()
            .map(|repo| deployment_for_repo(*repo, store, &endpoints))
            .collect();
        outputs.into_iter().collect()
    }
}

/// A platform detected in one repository.
struct Platform<'a> {
    id: String,
    name: &'static str,
    /// Config files, or the framework config the platform was inferred from.
    configs: Vec<&'a str>,
    inferred: bool,
}

/// First sighting of an environment variable.
#[derive(Debug, Clone, Copy)]
struct EnvRef<'a> {
    path: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VercelConfig {
    crons: Vec<VercelCron>,
}

#[derive(Debug, Deserialize)]
struct VercelCron {
    path: String,
    schedule: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PackageDependencies {
    dependencies: BTreeMap<String, serde_json::Value>,
    dev_dependencies: BTreeMap<String, serde_json::Value>,
}

fn deployment_for_repo(
    repo: RepoView<'_>,
    store: &GraphStore,
    endpoints: &RouteIndex,
) -> PassOutput {
    let mut output = PassOutput::new();
    let repo_node_id = repo.repo_node_id();
    let apps = AppIndex::for_repo(store, &repo_node_id);
    let paths: Vec<&str> = repo.paths().collect();

    let platforms = detect_platforms(&repo_node_id, &paths);
    let env = collect_env_vars(repo, &paths);
    let env_vars: Vec<String> = env.keys().cloned().collect();

    for platform in &platforms {
        add_deployment(&mut output, repo, &repo_node_id, &apps, platform, &env_vars);
    }

    // Services named by env vars hang off the first deployment, else the
    // first app, else the repo itself.
    let source = platforms
        .first()
        .map(|p| p.id.clone())
        .or_else(|| apps.ids().first().map(|id| id.to_string()))
        .unwrap_or_else(|| repo_node_id.clone());
    add_env_services(&mut output, &source, &env);

    add_singleton_services(&mut output, repo, &paths);

    if let Some(vercel) = platforms.iter().find(|p| p.name == "Vercel" && !p.inferred) {
        add_crons(&mut output, repo, &repo_node_id, &apps, vercel, endpoints);
    }

    tracing::debug!(
        "{}: {} platforms, {} env vars",
        repo.repo.name,
        platforms.len(),
        env_vars.len()
    );
    output
}

/// One platform per recognized config name; with none, a platform inferred
/// from a framework config.
fn detect_platforms<'a>(repo_node_id: &str, paths: &[&'a str]) -> Vec<Platform<'a>> {
    let mut platforms: Vec<Platform<'a>> = Vec::new();
    for path in paths.iter().copied() {
        let name = file_name(path);
        let Some((_, platform)) = PLATFORM_CONFIGS.iter().find(|(config, _)| *config == name) else {
            continue;
        };
        match platforms.iter_mut().find(|p| p.name == *platform) {
            Some(existing) => existing.configs.push(path),
            None => platforms.push(Platform {
                id: ids::deployment_id(repo_node_id, platform),
                name: *platform,
                configs: vec![path],
                inferred: false,
            }),
        }
    }
    if !platforms.is_empty() {
        return platforms;
    }

    for (prefix, platform) in INFERRED_PLATFORMS {
        let configs: Vec<&str> = paths
            .iter()
            .copied()
            .filter(|p| file_name(p).starts_with(prefix))
            .collect();
        if !configs.is_empty() {
            platforms.push(Platform {
                id: ids::deployment_id(repo_node_id, platform),
                name: *platform,
                configs,
                inferred: true,
            });
        }
    }
    platforms
}

fn add_deployment(
    output: &mut PassOutput,
    repo: RepoView<'_>,
    repo_node_id: &str,
    apps: &AppIndex,
    platform: &Platform<'_>,
    env_vars: &[String],
) {
    let confidence = if platform.inferred {
        Confidence::Medium
    } else {
        Confidence::High
    };
    output.add_node(
        GraphNode::new(
            platform.id.clone(),
            platform.name,
            NodeMetadata::Deployment(DeploymentMeta {
                platform: platform.name.to_string(),
                config_file: (!platform.inferred)
                    .then(|| platform.configs.first().map(|c| c.to_string()))
                    .flatten(),
                inferred: platform.inferred,
                env_vars: env_vars.to_vec(),
            }),
        )
        .with_repo(repo_node_id),
    );

    for config in &platform.configs {
        let dir = parent_dir(config);
        // A root config deploys every app; otherwise only the app it sits in.
        let linked: Vec<&str> = if dir.is_empty() {
            apps.ids()
        } else {
            apps.rooted_at(dir).or_else(|| apps.owner_of(config)).into_iter().collect()
        };

        for app_id in linked {
            let edge = GraphEdge::new(
                EdgeType::DeploysTo,
                app_id,
                EdgeTarget::node(platform.id.clone()),
                "",
            )
            .with_confidence(confidence);
            let mut evidence =
                Evidence::builder(EvidenceKind::DeploymentConfig, platform.id.clone())
                    .edge(edge.id.clone())
                    .file(*config)
                    .confidence(confidence);
            evidence = match repo.content(config).and_then(first_line) {
                Some((line, text)) => evidence.line(line).excerpt(text),
                None => evidence.excerpt(file_name(config)),
            };
            output.add_cited_edge(edge, evidence.build());
        }
    }
}

fn is_env_candidate(path: &str) -> bool {
    let name = file_name(path);
    name.starts_with(".env")
        || name.starts_with("env.")
        || PLATFORM_CONFIGS.iter().any(|(config, _)| *config == name)
        || FRAMEWORK_CONFIG_PREFIXES.iter().any(|p| name.starts_with(p))
        || path
            .split('/')
            .rev()
            .skip(1)
            .any(|dir| CONFIG_DIRS.contains(&dir))
}

/// Every variable referenced by the candidate files, sorted by name, with
/// the first file mentioning it.
fn collect_env_vars<'a>(repo: RepoView<'a>, paths: &[&'a str]) -> BTreeMap<String, EnvRef<'a>> {
    let mut found: BTreeMap<String, EnvRef<'a>> = BTreeMap::new();
    for path in paths.iter().copied().filter(|p| is_env_candidate(p)) {
        let Some(content) = repo.content(path) else { continue };
        let mut record = |name: &str| {
            found
                .entry(name.to_string())
                .or_insert(EnvRef { path });
        };

        if file_name(path).starts_with(".env") {
            for line in content.lines() {
                if let Some(cap) = ENV_ASSIGNMENT_RE.captures(line) {
                    record(&cap[1]);
                }
            }
        } else {
            for cap in SECRET_ENV_RE.captures_iter(content) {
                record(&cap[1]);
            }
            for cap in PUBLIC_ENV_RE.captures_iter(content) {
                record(&cap[1]);
            }
        }
    }
    found
}

/// One `calls_external` edge per service, citing each variable that maps to it.
fn add_env_services(output: &mut PassOutput, source: &str, env: &BTreeMap<String, EnvRef<'_>>) {
    let mut by_service: BTreeMap<&'static str, Vec<(&str, EnvRef<'_>)>> = BTreeMap::new();
    for (name, found) in env {
        if let Some(def) = service_for_env(name) {
            by_service.entry(def.slug).or_default().push((name.as_str(), *found));
        }
    }

    for (slug, variables) in by_service {
        let Some(def) = service_def(slug) else { continue };
        let node = service_node(def, None);
        let mut edge = GraphEdge::new(
            EdgeType::CallsExternal,
            source,
            EdgeTarget::node(node.id.clone()),
            "env",
        )
        .with_metadata(EdgeMetadata::EnvVar {
            variables: variables.iter().map(|(name, _)| name.to_string()).collect(),
        });
        output.add_node(node);

        for (name, found) in &variables {
            let evidence = Evidence::builder(EvidenceKind::EnvVar, source)
                .edge(edge.id.clone())
                .file(found.path)
                .excerpt(name)
                .build();
            edge = edge.with_evidence(evidence.id.clone());
            output.add_evidence(evidence);
        }
        output.add_edge(edge);
    }
}

/// Platform services whose client package appears in any manifest. Their
/// IDs are global, so several repos yield one node.
fn add_singleton_services(output: &mut PassOutput, repo: RepoView<'_>, paths: &[&str]) {
    for path in paths.iter().copied().filter(|p| file_name(p) == "package.json") {
        let Some(content) = repo.content(path) else { continue };
        let Ok(manifest) = serde_json::from_str::<PackageDependencies>(content) else {
            // Already reported by the inventory pass.
            continue;
        };
        let names: Vec<&str> = manifest
            .dependencies
            .keys()
            .chain(manifest.dev_dependencies.keys())
            .map(String::as_str)
            .collect();

        for (prefix, slug) in SINGLETON_SERVICES {
            let Some(package) = names.iter().find(|n| n.starts_with(prefix)) else {
                continue;
            };
            let Some(def) = service_def(slug) else { continue };
            let node = service_node(def, None);
            let mut evidence =
                Evidence::builder(EvidenceKind::PackageDependency, node.id.clone()).file(path);
            evidence = match find_line(content, &format!("\"{}\"", package)) {
                Some((line, text)) => evidence.line(line).excerpt(text),
                None => evidence.excerpt(package),
            };
            output.add_node(node);
            output.add_evidence(evidence.build());
        }
    }
}

/// `vercel.json` crons become workers that call the endpoint at their path.
fn add_crons(
    output: &mut PassOutput,
    repo: RepoView<'_>,
    repo_node_id: &str,
    apps: &AppIndex,
    vercel: &Platform<'_>,
    endpoints: &RouteIndex,
) {
    for config in vercel.configs.iter().copied() {
        let Some(content) = repo.content(config) else { continue };
        let parsed = match serde_json::from_str::<VercelConfig>(content) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Skipping malformed {}: {}", config, e);
                output.warn(format!("{}: malformed vercel.json: {}", config, e));
                continue;
            }
        };

        for cron in parsed.crons {
            let route = normalize_path(&cron.path);
            let schedule = cron.schedule.clone().unwrap_or_default();
            let worker_id = ids::worker_id(repo_node_id, &route, &schedule);
            output.add_node(
                GraphNode::new(
                    worker_id.clone(),
                    format!("cron {}", route),
                    NodeMetadata::Worker(WorkerMeta {
                        schedule: cron.schedule.clone(),
                        path: route.clone(),
                        file_path: config.to_string(),
                    }),
                )
                .with_repo(repo_node_id),
            );

            let cite = |node_id: &str, edge_id: &str| {
                let evidence = Evidence::builder(EvidenceKind::DeploymentConfig, node_id)
                    .edge(edge_id)
                    .file(config);
                let evidence = match find_line(content, &cron.path) {
                    Some((line, text)) => evidence.line(line).excerpt(text),
                    None => evidence.excerpt(&cron.path),
                };
                evidence.build()
            };

            let resolved = endpoints.resolve(&route, Some(HttpMethod::Get), Some(repo_node_id));
            let target = match resolved {
                Some(endpoint_id) => EdgeTarget::node(endpoint_id),
                None => EdgeTarget::placeholder(route.clone()),
            };
            let calls = GraphEdge::new(EdgeType::Calls, worker_id.clone(), target, "cron")
                .with_metadata(EdgeMetadata::Cron {
                    schedule: cron.schedule.clone(),
                });
            let evidence = cite(&worker_id, &calls.id);
            output.add_cited_edge(calls, evidence);

            let deploys = GraphEdge::new(
                EdgeType::DeploysTo,
                worker_id.clone(),
                EdgeTarget::node(vercel.id.clone()),
                "",
            );
            let evidence = cite(&worker_id, &deploys.id);
            output.add_cited_edge(deploys, evidence);

            let owner = match parent_dir(config) {
                "" => apps.rooted_at(""),
                dir => apps.rooted_at(dir).or_else(|| apps.owner_of(config)),
            };
            if let Some(app_id) = owner {
                output.add_edge(GraphEdge::contains(app_id, worker_id.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::corpus::{AnalysisInput, Repository};
    use crate::ontology::{AppMeta, EndpointMeta, HandlerKind};

    fn store_with_apps(roots: &[&str]) -> GraphStore {
        let repo_node_id = ids::repo_id("r1");
        let mut output = PassOutput::new();
        for root in roots {
            output.add_node(
                GraphNode::new(
                    ids::app_id(&repo_node_id, root),
                    *root,
                    NodeMetadata::App(AppMeta {
                        root: root.to_string(),
                        framework: None,
                        language: None,
                    }),
                )
                .with_repo(repo_node_id.clone()),
            );
        }
        let mut store = GraphStore::new();
        store.merge(output);
        store
    }

    fn run(files: &[(&str, &str)], store: &GraphStore) -> PassOutput {
        let repo = Repository::new("r1", "acme", "web").with_files(files.iter().map(|(p, _)| *p));
        let mut input = AnalysisInput::new("p").with_repository(repo);
        for (path, content) in files {
            input = input.with_content(*path, *content);
        }
        let config = DiscoveryConfig::default();
        DeploymentPass.run(&PassContext::new(&input, &config), store)
    }

    fn deployments(output: &PassOutput) -> Vec<&DeploymentMeta> {
        output
            .nodes
            .iter()
            .filter_map(|n| match &n.metadata {
                NodeMetadata::Deployment(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_inferred_vercel_with_env_services() {
        let store = store_with_apps(&["."]);
        let output = run(
            &[
                ("next.config.js", "module.exports = {}"),
                (
                    ".env.example",
                    "STRIPE_SECRET_KEY=\nNEXT_PUBLIC_SUPABASE_URL=\nUNRELATED_FLAG=1\n",
                ),
                ("lib/openai.ts", "const key = process.env.OPENAI_API_KEY;"),
            ],
            &store,
        );

        let deployment = deployments(&output)[0];
        assert_eq!(deployment.platform, "Vercel");
        assert!(deployment.inferred);
        assert_eq!(
            deployment.env_vars,
            vec![
                "NEXT_PUBLIC_SUPABASE_URL",
                "OPENAI_API_KEY",
                "STRIPE_SECRET_KEY",
                "UNRELATED_FLAG"
            ]
        );

        let deploys = output
            .edges
            .iter()
            .find(|e| e.edge_type == EdgeType::DeploysTo)
            .unwrap();
        assert_eq!(deploys.confidence, Confidence::Medium);

        let services: Vec<&str> = output
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::CallsExternal)
            .filter_map(|e| e.target_id())
            .collect();
        assert_eq!(services.len(), 3);
        assert!(output.edges.iter().all(|e| e.confidence == Confidence::High
            || e.edge_type == EdgeType::DeploysTo));

        let env_evidence: Vec<&Evidence> = output
            .evidence
            .iter()
            .filter(|e| e.kind == EvidenceKind::EnvVar)
            .collect();
        assert_eq!(env_evidence.len(), 3);
        assert!(env_evidence.iter().all(|e| e.line_start.is_none()));
    }

    #[test]
    fn test_app_scoped_config() {
        let store = store_with_apps(&["apps/web", "apps/admin"]);
        let output = run(
            &[
                ("apps/web/netlify.toml", "[build]\ncommand = \"npm run build\""),
                ("apps/admin/package.json", "{}"),
            ],
            &store,
        );
        let deploys: Vec<&GraphEdge> = output
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::DeploysTo)
            .collect();
        assert_eq!(deploys.len(), 1);
        assert_eq!(deploys[0].source, ids::app_id(&ids::repo_id("r1"), "apps/web"));
        assert_eq!(deployments(&output)[0].config_file.as_deref(), Some("apps/web/netlify.toml"));
    }

    #[test]
    fn test_root_config_links_every_app() {
        let store = store_with_apps(&["apps/web", "apps/admin"]);
        let output = run(&[("fly.toml", "app = \"acme\"")], &store);
        assert_eq!(
            output
                .edges
                .iter()
                .filter(|e| e.edge_type == EdgeType::DeploysTo)
                .count(),
            2
        );
    }

    #[test]
    fn test_singletons_dedupe_by_id() {
        let store = store_with_apps(&["."]);
        let output = run(
            &[
                (
                    "package.json",
                    concat!(
                        r#"{"dependencies": {"@supabase/supabase-js": "^2", "#,
                        r#""@supabase/ssr": "^0.1", "@anthropic-ai/sdk": "^0.20"}}"#,
                    ),
                ),
                (
                    "apps/x/package.json",
                    r#"{"dependencies": {"@supabase/auth-helpers-nextjs": "^0.8"}}"#,
                ),
            ],
            &store,
        );
        let mut store = GraphStore::new();
        store.merge(output);
        let services: Vec<&str> = store
            .nodes_of_type(NodeType::ExternalService)
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(services, vec!["Supabase", "Anthropic"]);
    }

    #[test]
    fn test_crons_resolve_to_endpoints() {
        let repo_node_id = ids::repo_id("r1");
        let mut store = store_with_apps(&["."]);
        let mut endpoints = PassOutput::new();
        let endpoint_id = ids::endpoint_id(&repo_node_id, HttpMethod::Get, "/api/cron/digest");
        endpoints.add_node(
            GraphNode::new(
                endpoint_id.clone(),
                "GET /api/cron/digest",
                NodeMetadata::Endpoint(EndpointMeta {
                    method: HttpMethod::Get,
                    route: "/api/cron/digest".to_string(),
                    file_path: "app/api/cron/digest/route.ts".to_string(),
                    feature: None,
                    handler: HandlerKind::RouteHandler,
                }),
            )
            .with_repo(repo_node_id.clone()),
        );
        store.merge(endpoints);

        let vercel = r#"{
  "crons": [
    { "path": "/api/cron/digest", "schedule": "0 9 * * *" },
    { "path": "/api/cron/cleanup", "schedule": "0 0 * * 0" }
  ]
}"#;
        let output = run(&[("vercel.json", vercel)], &store);

        let workers: Vec<&GraphNode> = output
            .nodes
            .iter()
            .filter(|n| n.node_type() == NodeType::Worker)
            .collect();
        assert_eq!(workers.len(), 2);

        let calls: Vec<&GraphEdge> = output
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Calls)
            .collect();
        assert_eq!(calls[0].target_id(), Some(endpoint_id.as_str()));
        assert!(calls[1].target.is_placeholder());

        let worker_deploys = output
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::DeploysTo && e.source == workers[0].id)
            .count();
        assert_eq!(worker_deploys, 1);
    }

    #[test]
    fn test_malformed_vercel_json_warns() {
        let output = run(&[("vercel.json", "{ crons: ")], &store_with_apps(&["."]));
        assert_eq!(deployments(&output).len(), 1);
        assert_eq!(output.warnings.len(), 1);
    }
}
