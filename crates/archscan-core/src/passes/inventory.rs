//! Inventory pass: repositories, deployable apps, and notable packages.

use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::patterns::{
    language_for_path, DEFAULT_WORKSPACE_GLOBS, FRAMEWORK_MARKERS, LIBRARY_WORKSPACE_DIRS,
    MANIFEST_FRAMEWORKS, MONOREPO_MARKERS, NON_CODE_LANGUAGES, NOTABLE_PACKAGES,
};
use super::text::{file_name, find_line, is_under, parent_dir};
use super::{AnalysisPass, PassContext};
use crate::corpus::RepoView;
use crate::graph::{GraphStore, PassOutput};
use crate::ids;
use crate::ontology::{
    AppMeta, EdgeMetadata, EdgeTarget, EdgeType, Evidence, EvidenceKind, GraphEdge, GraphNode,
    NodeMetadata, PackageMeta, RepoMeta,
};

/// Detects frameworks, languages and monorepo layout.
pub struct InventoryPass;

impl AnalysisPass for InventoryPass {
    fn name(&self) -> &'static str {
        "inventory"
    }

    fn run(&self, ctx: &PassContext<'_>, _store: &GraphStore) -> PassOutput {
        let repos: Vec<RepoView<'_>> = ctx.input.repos().collect();
        let outputs: Vec<PassOutput> = repos.par_iter().map(|repo| inventory_repo(*repo)).collect();
        outputs.into_iter().collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    dependencies: BTreeMap<String, serde_json::Value>,
    dev_dependencies: BTreeMap<String, serde_json::Value>,
    workspaces: Option<Workspaces>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Workspaces {
    List(Vec<String>),
    Object { packages: Vec<String> },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PnpmWorkspace {
    packages: Vec<String>,
}

/// A parsed `package.json`.
struct Manifest<'a> {
    path: &'a str,
    dir: &'a str,
    content: &'a str,
    package: PackageJson,
}

impl Manifest<'_> {
    /// Runtime and dev dependencies with their version specs, by name.
    fn dependencies(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.package
            .dependencies
            .iter()
            .chain(self.package.dev_dependencies.iter())
            .map(|(name, version)| (name.as_str(), version.as_str()))
    }

    fn has_dependency(&self, name: &str) -> bool {
        self.package.dependencies.contains_key(name)
            || self.package.dev_dependencies.contains_key(name)
    }

    fn workspace_globs(&self) -> Vec<String> {
        match &self.package.workspaces {
            Some(Workspaces::List(globs)) => globs.clone(),
            Some(Workspaces::Object { packages }) => packages.clone(),
            None => Vec::new(),
        }
    }
}

fn inventory_repo(repo: RepoView<'_>) -> PassOutput {
    let mut output = PassOutput::new();
    let repo_node_id = repo.repo_node_id();
    let paths: Vec<&str> = repo.paths().collect();

    let manifests = parse_manifests(repo, &paths, &mut output);
    let cargo_deps = parse_cargo_dependencies(repo, &paths, &mut output);

    // Monorepo layout
    let root_manifest = manifests.iter().find(|m| m.dir.is_empty());
    let mut tool = MONOREPO_MARKERS
        .iter()
        .find(|(marker, _)| repo.has_file(marker))
        .map(|(_, tool)| tool.to_string());

    let mut globs = Vec::new();
    if let Some(content) = repo.content("pnpm-workspace.yaml") {
        match serde_yaml::from_str::<PnpmWorkspace>(content) {
            Ok(workspace) => globs.extend(workspace.packages),
            Err(e) => {
                tracing::warn!("Malformed pnpm-workspace.yaml in {}: {}", repo.repo.name, e);
                output.warn(format!("{}: malformed pnpm-workspace.yaml: {}", repo.repo.name, e));
            }
        }
    }
    if let Some(root) = root_manifest {
        let declared = root.workspace_globs();
        if !declared.is_empty() && tool.is_none() {
            tool = Some("workspaces".to_string());
        }
        globs.extend(declared);
    }
    if globs.is_empty() {
        globs = DEFAULT_WORKSPACE_GLOBS.iter().map(|g| g.to_string()).collect();
    }

    let members: Vec<&Manifest<'_>> = manifests
        .iter()
        .filter(|m| !m.dir.is_empty() && globs.iter().any(|g| glob_matches(g, m.dir)))
        .collect();
    let (libraries, apps): (Vec<&Manifest<'_>>, Vec<&Manifest<'_>>) = members
        .into_iter()
        .partition(|m| {
            LIBRARY_WORKSPACE_DIRS
                .iter()
                .any(|d| m.dir.starts_with(&format!("{}/", d)))
        });
    let monorepo = tool.is_some() || !apps.is_empty() || !libraries.is_empty();

    // Repo node
    let frameworks = detect_frameworks(&paths, &manifests, &cargo_deps, "");
    let repo_meta = RepoMeta {
        owner: repo.repo.owner.clone(),
        name: repo.repo.name.clone(),
        provider: repo.repo.provider.clone(),
        default_branch: repo.repo.default_branch.clone(),
        frameworks: frameworks.clone(),
        language: dominant_language(repo, ""),
        monorepo,
        monorepo_tool: tool,
    };
    output.add_node(GraphNode::new(
        repo_node_id.clone(),
        format!("{}/{}", repo.repo.owner, repo.repo.name),
        NodeMetadata::Repo(repo_meta),
    ));

    // App nodes
    if apps.is_empty() {
        let label = root_manifest
            .and_then(|m| m.package.name.clone())
            .unwrap_or_else(|| repo.repo.name.clone());
        let framework = frameworks.first().cloned();
        let language = dominant_language(repo, ".");
        add_app(&mut output, &repo_node_id, ".", label, framework, language);
    } else {
        for app in &apps {
            let label = app
                .package
                .name
                .clone()
                .unwrap_or_else(|| file_name(app.dir).to_string());
            let framework = detect_frameworks(&paths, &manifests, &cargo_deps, app.dir)
                .into_iter()
                .next();
            let language = dominant_language(repo, app.dir);
            add_app(&mut output, &repo_node_id, app.dir, label, framework, language);
        }
    }

    // Workspace libraries
    for library in &libraries {
        let name = library
            .package
            .name
            .clone()
            .unwrap_or_else(|| file_name(library.dir).to_string());
        let package_id = ids::package_id("workspace", &name);
        output.add_node(
            GraphNode::new(
                package_id.clone(),
                name.clone(),
                NodeMetadata::Package(PackageMeta {
                    name,
                    version: library.package.version.clone(),
                    ecosystem: "workspace".to_string(),
                }),
            )
            .with_repo(repo_node_id.clone()),
        );
        output.add_edge(GraphEdge::contains(repo_node_id.clone(), package_id));
    }

    // Notable dependencies
    for manifest in &manifests {
        for (name, version) in manifest.dependencies() {
            if !NOTABLE_PACKAGES.contains(&name) {
                continue;
            }
            add_dependency(&mut output, &repo_node_id, manifest, name, version);
        }
    }

    output
}

fn add_app(
    output: &mut PassOutput,
    repo_node_id: &str,
    root: &str,
    label: String,
    framework: Option<String>,
    language: Option<String>,
) {
    let app_id = ids::app_id(repo_node_id, root);
    output.add_node(
        GraphNode::new(
            app_id.clone(),
            label,
            NodeMetadata::App(AppMeta {
                root: root.to_string(),
                framework,
                language,
            }),
        )
        .with_repo(repo_node_id),
    );
    output.add_edge(GraphEdge::contains(repo_node_id, app_id));
}

fn add_dependency(
    output: &mut PassOutput,
    repo_node_id: &str,
    manifest: &Manifest<'_>,
    name: &str,
    version: Option<&str>,
) {
    let package_id = ids::package_id("npm", name);
    output.add_node(GraphNode::new(
        package_id.clone(),
        name,
        NodeMetadata::Package(PackageMeta {
            name: name.to_string(),
            version: version.map(str::to_string),
            ecosystem: "npm".to_string(),
        }),
    ));

    let edge = GraphEdge::new(
        EdgeType::DependsOn,
        repo_node_id,
        EdgeTarget::node(package_id.clone()),
        "",
    )
    .with_metadata(EdgeMetadata::Dependency {
        version: version.map(str::to_string),
    });

    let mut evidence = Evidence::builder(EvidenceKind::PackageDependency, package_id)
        .edge(edge.id.clone())
        .file(manifest.path);
    evidence = match find_line(manifest.content, &format!("\"{}\"", name)) {
        Some((line, text)) => evidence.line(line).excerpt(text),
        None => evidence.excerpt(&format!("{}: {}", name, version.unwrap_or("*"))),
    };
    output.add_cited_edge(edge, evidence.build());
}

fn parse_manifests<'a>(
    repo: RepoView<'a>,
    paths: &[&'a str],
    output: &mut PassOutput,
) -> Vec<Manifest<'a>> {
    paths
        .iter()
        .copied()
        .filter(|path| file_name(path) == "package.json")
        .filter_map(|path| {
            let content = repo.content(path)?;
            match serde_json::from_str::<PackageJson>(content) {
                Ok(package) => Some(Manifest {
                    path,
                    dir: parent_dir(path),
                    content,
                    package,
                }),
                Err(e) => {
                    tracing::warn!("Skipping malformed manifest {}: {}", path, e);
                    output.warn(format!("{}: malformed package.json: {}", path, e));
                    None
                }
            }
        })
        .collect()
}

/// Dependency names of every `Cargo.toml`, keyed by the manifest's directory.
fn parse_cargo_dependencies<'a>(
    repo: RepoView<'a>,
    paths: &[&'a str],
    output: &mut PassOutput,
) -> Vec<(&'a str, Vec<String>)> {
    paths
        .iter()
        .copied()
        .filter(|path| file_name(path) == "Cargo.toml")
        .filter_map(|path| {
            let content = repo.content(path)?;
            match content.parse::<toml::Table>() {
                Ok(table) => {
                    let deps = table
                        .get("dependencies")
                        .and_then(|d| d.as_table())
                        .map(|d| d.keys().cloned().collect())
                        .unwrap_or_default();
                    Some((parent_dir(path), deps))
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed manifest {}: {}", path, e);
                    output.warn(format!("{}: malformed Cargo.toml: {}", path, e));
                    None
                }
            }
        })
        .collect()
}

/// Frameworks of the files under `scope` (`""` for the whole repo).
///
/// Marker files first; declared manifest dependencies only when no marker
/// is present.
fn detect_frameworks(
    paths: &[&str],
    manifests: &[Manifest<'_>],
    cargo_deps: &[(&str, Vec<String>)],
    scope: &str,
) -> Vec<String> {
    let scoped: Vec<&str> = paths.iter().copied().filter(|p| is_under(p, scope)).collect();

    let mut found: Vec<String> = Vec::new();
    for (marker, framework) in FRAMEWORK_MARKERS {
        if scoped.iter().any(|p| file_name(p).starts_with(marker)) {
            push_unique(&mut found, framework);
        }
    }
    if !found.is_empty() {
        return found;
    }

    for (dependency, framework) in MANIFEST_FRAMEWORKS {
        let in_npm = manifests
            .iter()
            .filter(|m| is_under(m.path, scope))
            .any(|m| m.has_dependency(dependency));
        let in_cargo = cargo_deps
            .iter()
            .filter(|(dir, _)| scope.is_empty() || dir.starts_with(scope))
            .any(|(_, deps)| deps.iter().any(|d| d.as_str() == *dependency));
        if in_npm || in_cargo {
            push_unique(&mut found, framework);
        }
    }
    found
}

fn push_unique(found: &mut Vec<String>, value: &str) {
    if !found.iter().any(|f| f == value) {
        found.push(value.to_string());
    }
}

/// Most common code language under `scope`; ties break alphabetically.
fn dominant_language(repo: RepoView<'_>, scope: &str) -> Option<String> {
    let mut histogram: BTreeMap<&str, usize> = BTreeMap::new();
    for file in repo.repo.files.iter().filter(|f| is_under(&f.path, scope)) {
        let language = file
            .language
            .as_deref()
            .or_else(|| language_for_path(&file.path));
        if let Some(language) = language {
            if !NON_CODE_LANGUAGES.contains(&language) {
                *histogram.entry(language).or_insert(0) += 1;
            }
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (language, count) in histogram {
        if best.map(|(_, c)| count > c).unwrap_or(true) {
            best = Some((language, count));
        }
    }
    best.map(|(language, _)| language.to_string())
}

/// Minimal workspace glob: `*` is one segment, `**` any remainder.
fn glob_matches(glob: &str, dir: &str) -> bool {
    if glob.starts_with('!') {
        return false;
    }
    let glob = glob.trim_start_matches("./").trim_end_matches('/');
    let mut pattern = glob.split('/');
    let mut parts = dir.split('/');
    loop {
        match (pattern.next(), parts.next()) {
            (Some("**"), _) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(d)) if p == d => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
