//! Route pass: UI screens, their outbound API calls and navigation.

use rayon::prelude::*;
use std::collections::HashSet;

use super::patterns::{
    AUTH_CALL_RE, AXIOS_RE, FETCH_METHOD_RE, FETCH_RE, FUNCTIONS_INVOKE_RE, LINK_HREF_RE,
    NAVIGATE_RE, REDIRECT_RE, ROUTER_NAV_RE, RPC_RE, STORAGE_FROM_RE, TABLE_FROM_RE,
};
use super::routing::{feature_tag, is_dynamic, normalize_path, screen_route, RouteIndex, ScreenFile};
use super::text::{find_line, first_line, parent_dir, window};
use super::{AnalysisPass, AppIndex, PassContext};
use crate::config::AnalysisConfig;
use crate::corpus::RepoView;
use crate::graph::{GraphStore, PassOutput};
use crate::ids;
use crate::ontology::{
    Confidence, EdgeMetadata, EdgeTarget, EdgeType, Evidence, EvidenceKind, GraphEdge, GraphNode,
    HttpMethod, NodeMetadata, RouterKind, ScreenMeta,
};

const LAYOUT_EXTENSIONS: &[&str] = &["tsx", "jsx", "ts", "js"];

/// Detects screens from routing conventions and scans each page's source.
pub struct RoutePass;

impl AnalysisPass for RoutePass {
    fn name(&self) -> &'static str {
        "routes"
    }

    fn run(&self, ctx: &PassContext<'_>, store: &GraphStore) -> PassOutput {
        ctx.input
            .repos()
            .map(|repo| routes_for_repo(repo, &ctx.config.analysis, store))
            .collect()
    }
}

/// What a page extractor needs beyond its own file.
struct PageScope<'a> {
    repo: RepoView<'a>,
    repo_node_id: &'a str,
    apps: &'a AppIndex,
    screens: &'a RouteIndex,
    config: &'a AnalysisConfig,
}

fn routes_for_repo(repo: RepoView<'_>, config: &AnalysisConfig, store: &GraphStore) -> PassOutput {
    let repo_node_id = repo.repo_node_id();
    let apps = AppIndex::for_repo(store, &repo_node_id);
    let files: HashSet<&str> = repo.paths().collect();

    let screens: Vec<(&str, GraphNode)> = repo
        .paths()
        .filter_map(|path| screen_route(path).map(|file| (path, file)))
        .map(|(path, file)| {
            let node = screen_node(&repo_node_id, path, &file, &files);
            (path, node)
        })
        .collect();

    // Every screen of the repo is indexed before any page is scanned, so a
    // link can resolve to a page listed after it.
    let index = RouteIndex::from_nodes(screens.iter().map(|(_, node)| node));

    let scope = PageScope {
        repo,
        repo_node_id: &repo_node_id,
        apps: &apps,
        screens: &index,
        config,
    };

    let outputs: Vec<PassOutput> = screens
        .par_iter()
        .map(|(path, node)| extract_page(&scope, path, node.clone()))
        .collect();

    tracing::debug!("{} screens in {}", screens.len(), repo.repo.name);
    outputs.into_iter().collect()
}

fn screen_node(
    repo_node_id: &str,
    path: &str,
    file: &ScreenFile,
    files: &HashSet<&str>,
) -> GraphNode {
    GraphNode::new(
        ids::screen_id(repo_node_id, &file.route),
        file.route.clone(),
        NodeMetadata::Screen(ScreenMeta {
            route: file.route.clone(),
            file_path: path.to_string(),
            is_dynamic: is_dynamic(&file.route),
            feature: feature_tag(&file.route),
            layout: nearest_layout(path, file, files),
            router: file.router,
        }),
    )
    .with_repo(repo_node_id)
}

/// Closest layout file between the page and its router root.
fn nearest_layout(path: &str, file: &ScreenFile, files: &HashSet<&str>) -> Option<String> {
    let candidates = |dir: &str| -> Vec<String> {
        match file.router {
            RouterKind::SvelteKit => vec![format!("{}/+layout.svelte", dir)],
            RouterKind::AppRouter => LAYOUT_EXTENSIONS
                .iter()
                .map(|ext| format!("{}/layout.{}", dir, ext))
                .collect(),
            RouterKind::PagesRouter => LAYOUT_EXTENSIONS
                .iter()
                .map(|ext| format!("{}/_app.{}", dir, ext))
                .collect(),
        }
    };

    if file.router == RouterKind::PagesRouter {
        return candidates(&file.router_dir)
            .into_iter()
            .find(|c| files.contains(c.as_str()));
    }

    let mut dir = parent_dir(path);
    loop {
        if let Some(found) = candidates(dir).into_iter().find(|c| files.contains(c.as_str())) {
            return Some(found);
        }
        if dir == file.router_dir || dir.is_empty() {
            return None;
        }
        dir = parent_dir(dir);
    }
}

fn extract_page(scope: &PageScope<'_>, path: &str, screen: GraphNode) -> PassOutput {
    let mut output = PassOutput::new();
    let screen_id = screen.id.clone();
    let content = scope.repo.content(path);

    let evidence = Evidence::builder(EvidenceKind::PageComponent, screen_id.clone()).file(path);
    let anchor = content.and_then(|c| find_line(c, "export default").or_else(|| first_line(c)));
    let evidence = match anchor {
        Some((line, text)) => evidence.line(line).excerpt(text),
        None => evidence.excerpt(path),
    };
    output.add_evidence(evidence.build());
    output.add_node(screen);

    if let Some(app_id) = scope.apps.owner_of(path) {
        output.add_edge(GraphEdge::contains(app_id, screen_id.clone()));
    }

    let Some(content) = content else {
        tracing::debug!("No content for page {}", path);
        return output;
    };

    let lines: Vec<&str> = content.lines().collect();
    for (idx, &line) in lines.iter().enumerate() {
        let line_no = idx as u32 + 1;
        let site = CallSite {
            screen_id: &screen_id,
            path,
            line_no,
            line,
        };

        for cap in FETCH_RE.captures_iter(line) {
            let (Some(whole), Some(raw)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            // Options end at the statement's semicolon or the next fetch.
            let tail = format!(
                "{}\n{}",
                &line[whole.end()..],
                window(
                    &lines,
                    idx + 1,
                    scope.config.fetch_method_lookahead.saturating_sub(1),
                    lines.len(),
                )
            );
            let options = tail.split(';').next().unwrap_or("");
            let options = options.split("fetch(").next().unwrap_or("");
            let explicit = FETCH_METHOD_RE
                .captures(options)
                .and_then(|m| HttpMethod::parse(&m[1]));
            let (method, confidence) = match explicit {
                Some(method) => (method, Confidence::High),
                None => (HttpMethod::Get, Confidence::Medium),
            };
            let route = normalize_path(raw.as_str());
            add_call(&mut output, &site, &route, method, confidence, "fetch");
        }

        for cap in AXIOS_RE.captures_iter(line) {
            if let Some(method) = HttpMethod::parse(&cap[1]) {
                let route = normalize_path(&cap[2]);
                add_call(&mut output, &site, &route, method, Confidence::High, "axios");
            }
        }

        for cap in FUNCTIONS_INVOKE_RE.captures_iter(line) {
            let route = format!("/functions/v1/{}", &cap[1]);
            add_call(&mut output, &site, &route, HttpMethod::Post, Confidence::Medium, "supabase");
        }

        for cap in LINK_HREF_RE.captures_iter(line) {
            let via = if line.contains("<Link") { "link" } else { "href" };
            add_navigation(&mut output, scope, &site, &cap[1], via);
        }
        for cap in ROUTER_NAV_RE.captures_iter(line) {
            let via = format!("router.{}", &cap[1]);
            add_navigation(&mut output, scope, &site, &cap[2], &via);
        }
        for cap in REDIRECT_RE.captures_iter(line) {
            add_navigation(&mut output, scope, &site, &cap[2], &cap[1]);
        }
        for cap in NAVIGATE_RE.captures_iter(line) {
            add_navigation(&mut output, scope, &site, &cap[2], &cap[1]);
        }

        // The screen does not know the endpoint graph; record the call only.
        if STORAGE_FROM_RE.is_match(line)
            || TABLE_FROM_RE.is_match(line)
            || RPC_RE.is_match(line)
            || AUTH_CALL_RE.is_match(line)
        {
            output.add_evidence(
                Evidence::builder(EvidenceKind::BackendClientCall, screen_id.clone())
                    .file(path)
                    .line(line_no)
                    .excerpt(line)
                    .build(),
            );
        }
    }

    output
}

/// A source line inside a page.
struct CallSite<'a> {
    screen_id: &'a str,
    path: &'a str,
    line_no: u32,
    line: &'a str,
}

fn add_call(
    output: &mut PassOutput,
    site: &CallSite<'_>,
    api_path: &str,
    method: HttpMethod,
    confidence: Confidence,
    client: &str,
) {
    let edge = GraphEdge::new(
        EdgeType::Calls,
        site.screen_id,
        EdgeTarget::placeholder(api_path),
        method.as_str(),
    )
    .with_confidence(confidence)
    .with_metadata(EdgeMetadata::HttpCall {
        method,
        path: api_path.to_string(),
        client: client.to_string(),
    });

    let evidence = Evidence::builder(EvidenceKind::FetchCall, site.screen_id)
        .edge(edge.id.clone())
        .file(site.path)
        .line(site.line_no)
        .excerpt(site.line)
        .confidence(confidence)
        .build();
    output.add_cited_edge(edge, evidence);
}

/// Link to another screen of the same repo. Destinations matching no
/// screen are dropped.
fn add_navigation(
    output: &mut PassOutput,
    scope: &PageScope<'_>,
    site: &CallSite<'_>,
    raw: &str,
    via: &str,
) {
    let destination = normalize_path(raw);
    if destination.starts_with("/api/") {
        return;
    }
    let Some(target) = scope.screens.resolve_in_repo(&destination, scope.repo_node_id) else {
        return;
    };
    if target == site.screen_id {
        return;
    }

    let edge = GraphEdge::new(EdgeType::NavigatesTo, site.screen_id, EdgeTarget::node(target), "")
        .with_metadata(EdgeMetadata::Navigation {
            path: destination,
            via: via.to_string(),
        });
    let evidence = Evidence::builder(EvidenceKind::ComponentUsage, site.screen_id)
        .edge(edge.id.clone())
        .file(site.path)
        .line(site.line_no)
        .excerpt(site.line)
        .build();
    output.add_cited_edge(edge, evidence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::corpus::{AnalysisInput, Repository};
    use crate::ontology::NodeType;

    fn run(input: &AnalysisInput) -> PassOutput {
        let config = DiscoveryConfig::default();
        let ctx = PassContext::new(input, &config);
        RoutePass.run(&ctx, &GraphStore::new())
    }

    fn input(files: &[(&str, &str)]) -> AnalysisInput {
        let repo = Repository::new("r1", "acme", "web").with_files(files.iter().map(|(p, _)| *p));
        files
            .iter()
            .fold(AnalysisInput::new("p").with_repository(repo), |input, (path, content)| {
                input.with_content(*path, *content)
            })
    }

    #[test]
    fn test_screens_and_layouts() {
        let input = input(&[
            ("app/layout.tsx", "export default function RootLayout() {}"),
            ("app/projects/page.tsx", "export default function Projects() {}"),
            ("app/projects/[id]/page.tsx", "export default function Project() {}"),
        ]);
        let output = run(&input);

        let screens: Vec<_> = output.nodes_of_type(NodeType::Screen).collect();
        assert_eq!(screens.len(), 2);
        match &screens[1].metadata {
            NodeMetadata::Screen(meta) => {
                assert_eq!(meta.route, "/projects/[id]");
                assert!(meta.is_dynamic);
                assert_eq!(meta.feature.as_deref(), Some("projects"));
                assert_eq!(meta.layout.as_deref(), Some("app/layout.tsx"));
            }
            other => panic!("unexpected metadata {:?}", other),
        }
        assert_eq!(
            output
                .evidence
                .iter()
                .filter(|e| e.kind == EvidenceKind::PageComponent)
                .count(),
            2
        );
    }

    #[test]
    fn test_fetch_method_confidence() {
        let input = input(&[(
            "app/projects/page.tsx",
            concat!(
                "const a = await fetch('/api/projects');\n",
                "const b = await fetch(`/api/projects/${id}`, {\n",
                "  method: 'DELETE',\n",
                "});\n",
            ),
        )]);
        let output = run(&input);

        let calls: Vec<_> = output.placeholder_edges().collect();
        assert_eq!(calls.len(), 2);

        assert_eq!(calls[0].target.as_wire(), "api:/api/projects");
        assert_eq!(calls[0].metadata.http_method(), Some(HttpMethod::Get));
        assert_eq!(calls[0].confidence, Confidence::Medium);

        assert_eq!(calls[1].target.as_wire(), "api:/api/projects/:param");
        assert_eq!(calls[1].metadata.http_method(), Some(HttpMethod::Delete));
        assert_eq!(calls[1].confidence, Confidence::High);
        assert_eq!(calls[1].evidence_ids.len(), 1);
    }

    #[test]
    fn test_navigation_resolves_to_screens() {
        let input = input(&[
            (
                "app/page.tsx",
                concat!(
                    "<Link href=\"/projects/42\">Open</Link>\n",
                    "<a href=\"/nowhere\">x</a>\n",
                    "router.push('/projects')",
                ),
            ),
            ("app/projects/page.tsx", "export default function P() {}"),
            ("app/projects/[id]/page.tsx", "export default function P() {}"),
        ]);
        let output = run(&input);

        let home = ids::screen_id(&ids::repo_id("r1"), "/");
        let nav: Vec<_> = output
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::NavigatesTo)
            .collect();
        assert_eq!(nav.len(), 2);
        assert!(nav.iter().all(|e| e.source == home));
        assert_eq!(
            nav[0].target_id(),
            Some(ids::screen_id(&ids::repo_id("r1"), "/projects/[id]").as_str())
        );
        assert_eq!(
            nav[1].target_id(),
            Some(ids::screen_id(&ids::repo_id("r1"), "/projects").as_str())
        );
    }

    #[test]
    fn test_backend_client_calls_are_evidence_only() {
        let input = input(&[(
            "app/tasks/page.tsx",
            "const { data } = await supabase.from('tasks').select('*');",
        )]);
        let output = run(&input);

        assert!(output.edges.is_empty());
        assert!(output
            .evidence
            .iter()
            .any(|e| e.kind == EvidenceKind::BackendClientCall && e.line_start == Some(1)));
    }
}
