//! File-convention routing: which files are screens or handlers, what route
//! they serve, and how concrete paths are matched back to route patterns.

use regex::Regex;

use super::patterns::{FEATURE_PREFIXES, TEMPLATE_EXPR_RE};
use crate::ontology::{GraphNode, HandlerKind, HttpMethod, RouterKind};

const PAGE_EXTENSIONS: &[&str] = &["tsx", "jsx", "ts", "js", "mdx"];
const HANDLER_EXTENSIONS: &[&str] = &["ts", "js", "tsx", "jsx", "mjs"];

/// Directories under which a workspace member may hold its own routes.
const WORKSPACE_DIRS: &[&str] = &["apps", "packages", "services"];

/// Top-level directories that never host a router root.
const NON_ROUTE_DIRS: &[&str] = &[
    "components",
    "lib",
    "utils",
    "hooks",
    "styles",
    "public",
    "test",
    "tests",
    "__tests__",
    "node_modules",
];

/// A file that serves a UI route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenFile {
    pub route: String,
    pub router: RouterKind,
    /// Directory of the router root (`app`, `pages`, `src/routes`).
    pub router_dir: String,
}

/// A file that serves an HTTP route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFile {
    pub route: String,
    pub handler: HandlerKind,
}

fn split_name(file: &str) -> (&str, &str) {
    file.rsplit_once('.').unwrap_or((file, ""))
}

/// Whether the directories above a router root look like a project root,
/// optionally inside a `src/` or a workspace member.
fn is_root_prefix(prefix: &[&str]) -> bool {
    let prefix = match prefix.split_last() {
        Some((&"src", rest)) => rest,
        _ => prefix,
    };
    match prefix {
        [] => true,
        [single] => !NON_ROUTE_DIRS.contains(single),
        [workspace, _] => WORKSPACE_DIRS.contains(workspace),
        _ => false,
    }
}

fn is_group(segment: &str) -> bool {
    segment.starts_with('(') && segment.ends_with(')')
}

/// Join routable segments into a route, dropping groups and parallel slots.
fn build_route(segments: &[&str]) -> String {
    let kept: Vec<&str> = segments
        .iter()
        .copied()
        .filter(|s| !is_group(s) && !s.starts_with('@'))
        .collect();
    format!("/{}", kept.join("/"))
}

fn position_of(segments: &[&str], dir: &str) -> Option<usize> {
    segments
        .iter()
        .enumerate()
        .position(|(i, s)| *s == dir && is_root_prefix(&segments[..i]))
}

/// Classify a path as a UI route file.
pub fn screen_route(path: &str) -> Option<ScreenFile> {
    let segments: Vec<&str> = path.split('/').collect();
    let (file, dirs) = segments.split_last()?;
    let (stem, ext) = split_name(file);

    // SvelteKit
    if *file == "+page.svelte" {
        let i = position_of(dirs, "routes")?;
        if i == 0 || dirs[i - 1] != "src" {
            return None;
        }
        return Some(ScreenFile {
            route: build_route(&dirs[i + 1..]),
            router: RouterKind::SvelteKit,
            router_dir: dirs[..=i].join("/"),
        });
    }

    if !PAGE_EXTENSIONS.contains(&ext) {
        return None;
    }

    // Next.js app router
    if stem == "page" {
        if let Some(i) = position_of(dirs, "app") {
            let route_dirs = &dirs[i + 1..];
            if route_dirs.iter().any(|s| s.starts_with('_')) {
                return None;
            }
            return Some(ScreenFile {
                route: build_route(route_dirs),
                router: RouterKind::AppRouter,
                router_dir: dirs[..=i].join("/"),
            });
        }
    }

    // Next.js pages router
    let i = position_of(dirs, "pages")?;
    let route_dirs = &dirs[i + 1..];
    if route_dirs.first() == Some(&"api") || stem.starts_with('_') {
        return None;
    }
    let mut parts: Vec<&str> = route_dirs.to_vec();
    if stem != "index" {
        parts.push(stem);
    }
    Some(ScreenFile {
        route: build_route(&parts),
        router: RouterKind::PagesRouter,
        router_dir: dirs[..=i].join("/"),
    })
}

/// Classify a path as a server handler file.
pub fn handler_route(path: &str) -> Option<HandlerFile> {
    let segments: Vec<&str> = path.split('/').collect();
    let (file, dirs) = segments.split_last()?;
    let (stem, ext) = split_name(file);
    if !HANDLER_EXTENSIONS.contains(&ext) {
        return None;
    }

    // Supabase edge functions
    if stem == "index" {
        if let [prefix @ .., "supabase", "functions", name] = dirs {
            if is_root_prefix(prefix) && !name.starts_with('_') {
                return Some(HandlerFile {
                    route: format!("/functions/v1/{}", name),
                    handler: HandlerKind::EdgeFunction,
                });
            }
        }
    }

    // SvelteKit
    if stem == "+server" {
        let i = position_of(dirs, "routes")?;
        if i == 0 || dirs[i - 1] != "src" {
            return None;
        }
        return Some(HandlerFile {
            route: build_route(&dirs[i + 1..]),
            handler: HandlerKind::SvelteKitServer,
        });
    }

    // Next.js app router
    if stem == "route" {
        if let Some(i) = position_of(dirs, "app") {
            let route_dirs = &dirs[i + 1..];
            if route_dirs.iter().any(|s| s.starts_with('_')) {
                return None;
            }
            return Some(HandlerFile {
                route: build_route(route_dirs),
                handler: HandlerKind::RouteHandler,
            });
        }
    }

    // Next.js pages API
    let i = position_of(dirs, "pages")?;
    let route_dirs = &dirs[i + 1..];
    if route_dirs.first() != Some(&"api") || stem.starts_with('_') {
        return None;
    }
    let mut parts: Vec<&str> = route_dirs.to_vec();
    if stem != "index" {
        parts.push(stem);
    }
    Some(HandlerFile {
        route: build_route(&parts),
        handler: HandlerKind::PagesApi,
    })
}

/// Convert a route pattern into an anchored matcher.
///
/// `[x]` matches one segment, `[...x]` one or more, `[[...x]]` zero or more.
pub fn route_regex(pattern: &str) -> Option<Regex> {
    let mut source = String::from("^");
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        if segment.starts_with("[[...") && segment.ends_with("]]") {
            source.push_str("(?:/.*)?");
        } else if segment.starts_with("[...") && segment.ends_with(']') {
            source.push_str("/.+");
        } else if (segment.starts_with('[') && segment.ends_with(']')) || segment.starts_with(':') {
            source.push_str("/[^/]+");
        } else {
            source.push('/');
            source.push_str(&regex::escape(segment));
        }
    }
    source.push_str("/?$");
    Regex::new(&source).ok()
}

/// Normalize a path found in source: template expressions become `:param`,
/// query and fragment are dropped, trailing slashes removed.
pub fn normalize_path(raw: &str) -> String {
    let replaced = TEMPLATE_EXPR_RE.replace_all(raw.trim(), ":param");
    let path = replaced
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .trim_end_matches('/');
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

pub fn segments(route: &str) -> impl Iterator<Item = &str> {
    route.split('/').filter(|s| !s.is_empty())
}

/// Number of non-empty segments.
pub fn depth(route: &str) -> usize {
    segments(route).count()
}

pub fn dynamic_segments(route: &str) -> usize {
    segments(route).filter(|s| s.starts_with('[')).count()
}

pub fn catch_all_segments(route: &str) -> usize {
    segments(route).filter(|s| s.contains("...")).count()
}

pub fn is_dynamic(route: &str) -> bool {
    dynamic_segments(route) > 0
}

/// Strip `/api` and `/functions/v1` mounts so handlers and screens share
/// one route namespace.
pub fn strip_api_prefix(route: &str) -> &str {
    for mount in ["/api", "/functions/v1"] {
        if let Some(rest) = route.strip_prefix(mount) {
            if rest.is_empty() || rest.starts_with('/') {
                return if rest.is_empty() { "/" } else { rest };
            }
        }
    }
    route
}

/// Feature tag from the first route segment.
pub fn feature_tag(route: &str) -> Option<String> {
    let first = segments(strip_api_prefix(route)).next()?;
    let key = format!("/{}", first.to_lowercase());
    FEATURE_PREFIXES
        .iter()
        .find(|(prefix, _)| *prefix == key)
        .map(|(_, feature)| feature.to_string())
}

/// `"team-settings"` → `"Team Settings"`.
pub fn title_case(slug: &str) -> String {
    slug.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

struct RouteEntry {
    id: String,
    repo: Option<String>,
    method: Option<HttpMethod>,
    route: String,
    matcher: Regex,
}

impl RouteEntry {
    fn new(node: &GraphNode, method: Option<HttpMethod>) -> Option<Self> {
        let route = node.route()?.to_string();
        Some(Self {
            id: node.id.clone(),
            repo: node.owning_repo_id.clone(),
            method,
            matcher: route_regex(&route)?,
            route,
        })
    }

    /// Lower is better: exact route, same repo, fewer dynamic then fewer
    /// catch-all segments, then ID.
    fn rank(&self, path: &str, repo: Option<&str>) -> (bool, bool, usize, usize, &str) {
        (
            self.route != path,
            repo.is_some() && self.repo.as_deref() != repo,
            dynamic_segments(&self.route),
            catch_all_segments(&self.route),
            &self.id,
        )
    }
}

/// Resolves concrete paths to route-bearing nodes (screens or endpoints).
#[derive(Default)]
pub struct RouteIndex {
    entries: Vec<RouteEntry>,
}

impl RouteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every screen or endpoint node; other nodes are ignored.
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a GraphNode>) -> Self {
        let mut index = Self::new();
        for node in nodes {
            index.insert(node);
        }
        index
    }

    pub fn insert(&mut self, node: &GraphNode) {
        if self.entries.iter().any(|e| e.id == node.id) {
            return;
        }
        let method = node.as_endpoint().map(|e| e.method);
        if let Some(entry) = RouteEntry::new(node, method) {
            self.entries.push(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best node for `path`. Endpoints must accept `method` when one is given;
    /// `repo` only ranks candidates, it never excludes them.
    pub fn resolve(
        &self,
        path: &str,
        method: Option<HttpMethod>,
        repo: Option<&str>,
    ) -> Option<&str> {
        self.entries
            .iter()
            .filter(|e| e.matcher.is_match(path))
            .filter(|e| match (e.method, method) {
                (Some(served), Some(call)) => served.accepts(call),
                _ => true,
            })
            .min_by(|a, b| a.rank(path, repo).cmp(&b.rank(path, repo)))
            .map(|e| e.id.as_str())
    }

    /// Like [`RouteIndex::resolve`] but only among nodes owned by `repo`.
    pub fn resolve_in_repo(&self, path: &str, repo: &str) -> Option<&str> {
        self.entries
            .iter()
            .filter(|e| e.repo.as_deref() == Some(repo) && e.matcher.is_match(path))
            .min_by(|a, b| a.rank(path, Some(repo)).cmp(&b.rank(path, Some(repo))))
            .map(|e| e.id.as_str())
    }
}
