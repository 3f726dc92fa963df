//! Endpoint pass: server handlers, what their bodies touch, and resolution
//! of the route pass's placeholder call targets.

use rayon::prelude::*;
use std::ops::Range;

use super::patterns::{
    service_def, service_for_host, AUTH_CALL_RE, DB_OP_RE, ENV_REF_RE, EXPORT_CONST_METHOD_RE,
    EXPORT_FUNCTION_METHOD_RE, EXPORT_LIST_RE, EXTERNAL_URL_RE, LOCAL_HOSTS,
    REQ_METHOD_RE, RPC_RE, SDK_CONSTRUCTOR_RE, SDK_SERVICES, STORAGE_FROM_RE, TABLE_FROM_RE,
    URL_HOST_RE,
};
use super::routing::{feature_tag, handler_route, HandlerFile, RouteIndex};
use super::text::{line_at, window};
use super::{host_node, service_node, AnalysisPass, AppIndex, PassContext};
use crate::corpus::RepoView;
use crate::graph::{GraphStore, PassOutput};
use crate::ids;
use crate::ontology::{
    Confidence, DbOperation, EdgeMetadata, EdgeTarget, EdgeType, EndpointMeta, Evidence,
    EvidenceKind, GraphEdge, GraphNode, HttpMethod, NodeMetadata, NodeType,
};

/// Detects HTTP handlers and statically analyzes their bodies.
pub struct EndpointPass;

impl AnalysisPass for EndpointPass {
    fn name(&self) -> &'static str {
        "endpoints"
    }

    fn run(&self, ctx: &PassContext<'_>, store: &GraphStore) -> PassOutput {
        let lookahead = ctx.config.analysis.table_op_lookahead;
        let mut output: PassOutput = ctx
            .input
            .repos()
            .map(|repo| endpoints_for_repo(repo, lookahead, store))
            .collect();
        resolve_placeholders(&mut output, store);
        output
    }
}

/// A method export found in a handler file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MethodExport {
    method: HttpMethod,
    /// 0-based line of the export.
    line: usize,
    confidence: Confidence,
}

fn endpoints_for_repo(repo: RepoView<'_>, lookahead: usize, store: &GraphStore) -> PassOutput {
    let repo_node_id = repo.repo_node_id();
    let apps = AppIndex::for_repo(store, &repo_node_id);

    let handlers: Vec<(&str, HandlerFile)> = repo
        .paths()
        .filter_map(|path| handler_route(path).map(|file| (path, file)))
        .collect();

    let outputs: Vec<PassOutput> = handlers
        .par_iter()
        .map(|(path, file)| {
            let mut output = PassOutput::new();
            let content = repo.content(path);
            if content.is_none() {
                tracing::debug!("No content for handler {}", path);
            }
            extract_handler(&mut output, &repo_node_id, &apps, path, file, content, lookahead);
            output
        })
        .collect();

    tracing::debug!("{} handler files in {}", handlers.len(), repo.repo.name);
    outputs.into_iter().collect()
}

/// Exported HTTP methods, in file order. A file with no recognizable export
/// serves every method.
fn detect_methods(content: &str) -> Vec<MethodExport> {
    let mut exports = Vec::new();
    let explicit = |method: &str, offset: usize| {
        HttpMethod::parse(method).map(|method| MethodExport {
            method,
            line: line_at(content, offset) as usize - 1,
            confidence: Confidence::High,
        })
    };

    for cap in EXPORT_FUNCTION_METHOD_RE
        .captures_iter(content)
        .chain(EXPORT_CONST_METHOD_RE.captures_iter(content))
    {
        if let Some(m) = cap.get(1) {
            exports.extend(explicit(m.as_str(), m.start()));
        }
    }

    // export { handler as GET, POST }
    for cap in EXPORT_LIST_RE.captures_iter(content) {
        let Some(list) = cap.get(1) else { continue };
        for item in list.as_str().split(',') {
            let name = item.rsplit(" as ").next().unwrap_or(item).trim();
            if !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase()) {
                exports.extend(explicit(name, list.start()));
            }
        }
    }

    // Pages API branches on req.method; the method is inferred from the branch.
    if exports.is_empty() {
        for cap in REQ_METHOD_RE.captures_iter(content) {
            if let Some(m) = cap.get(1) {
                if let Some(method) = HttpMethod::parse(m.as_str()) {
                    exports.push(MethodExport {
                        method,
                        line: line_at(content, m.start()) as usize - 1,
                        confidence: Confidence::Medium,
                    });
                }
            }
        }
    }

    exports.sort_by_key(|e| e.line);
    let mut seen = Vec::new();
    exports.retain(|e| {
        if seen.contains(&e.method) {
            false
        } else {
            seen.push(e.method);
            true
        }
    });

    if exports.is_empty() {
        exports.push(MethodExport {
            method: HttpMethod::All,
            line: 0,
            confidence: Confidence::Medium,
        });
    }
    exports
}

fn extract_handler(
    output: &mut PassOutput,
    repo_node_id: &str,
    apps: &AppIndex,
    path: &str,
    file: &HandlerFile,
    content: Option<&str>,
    lookahead: usize,
) {
    let exports = content.map(detect_methods).unwrap_or_else(|| {
        vec![MethodExport {
            method: HttpMethod::All,
            line: 0,
            confidence: Confidence::Medium,
        }]
    });
    let lines: Vec<&str> = content.map(|c| c.lines().collect()).unwrap_or_default();
    let first_export = exports.iter().map(|e| e.line).min().unwrap_or(0);

    for (i, export) in exports.iter().enumerate() {
        let endpoint_id = ids::endpoint_id(repo_node_id, export.method, &file.route);
        output.add_node(
            GraphNode::new(
                endpoint_id.clone(),
                format!("{} {}", export.method, file.route),
                NodeMetadata::Endpoint(EndpointMeta {
                    method: export.method,
                    route: file.route.clone(),
                    file_path: path.to_string(),
                    feature: feature_tag(&file.route),
                    handler: file.handler,
                }),
            )
            .with_repo(repo_node_id),
        );

        let evidence = Evidence::builder(EvidenceKind::Handler, endpoint_id.clone())
            .file(path)
            .confidence(export.confidence);
        let evidence = match lines.get(export.line) {
            Some(line) => evidence.line(export.line as u32 + 1).excerpt(line),
            None => evidence.excerpt(path),
        };
        output.add_evidence(evidence.build());

        if let Some(app_id) = apps.owner_of(path) {
            output.add_edge(GraphEdge::contains(app_id, endpoint_id.clone()));
        }

        // Body runs to the next method export. Module-level code above the
        // first export (clients, SDK instances) belongs to every handler.
        let body = if export.method == HttpMethod::All {
            0..lines.len()
        } else {
            let end = exports.get(i + 1).map(|e| e.line).unwrap_or(lines.len());
            export.line..end
        };
        let body_scan = BodyScan {
            endpoint_id: &endpoint_id,
            path,
            lines: &lines,
            lookahead,
        };
        if export.method != HttpMethod::All && first_export > 0 {
            body_scan.scan(output, 0..first_export);
        }
        body_scan.scan(output, body);
    }
}

/// Static analysis of one handler body.
struct BodyScan<'a> {
    endpoint_id: &'a str,
    path: &'a str,
    lines: &'a [&'a str],
    lookahead: usize,
}

impl BodyScan<'_> {
    fn scan(&self, output: &mut PassOutput, range: Range<usize>) {
        let end = range.end.min(self.lines.len());
        for idx in range.start..end {
            let line = self.lines[idx];

            if let Some(cap) = STORAGE_FROM_RE.captures(line) {
                self.storage_access(output, idx, &cap[1]);
            } else {
                for cap in TABLE_FROM_RE.captures_iter(line) {
                    let Some(whole) = cap.get(0) else { continue };
                    self.table_access(output, idx, &cap[1], whole.end(), end);
                }
            }

            for cap in RPC_RE.captures_iter(line) {
                let function = cap[1].to_string();
                let edge = GraphEdge::new(
                    EdgeType::UsesFunction,
                    self.endpoint_id,
                    EdgeTarget::node(ids::function_id("public", &function)),
                    "",
                )
                .with_metadata(EdgeMetadata::Rpc { function });
                self.cite(output, idx, edge, EvidenceKind::BackendClientCall);
            }

            for cap in EXTERNAL_URL_RE.captures_iter(line) {
                self.external_call(output, idx, &cap[1], &cap[2]);
            }

            for cap in SDK_CONSTRUCTOR_RE.captures_iter(line) {
                self.sdk_client(output, idx, &cap[1]);
            }

            for cap in AUTH_CALL_RE.captures_iter(line) {
                let call = cap
                    .get(1)
                    .or_else(|| cap.get(2))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                let edge = GraphEdge::new(
                    EdgeType::Authenticates,
                    self.endpoint_id,
                    EdgeTarget::node(ids::auth_id()),
                    "",
                )
                .with_metadata(EdgeMetadata::AuthCall { call });
                self.cite(output, idx, edge, EvidenceKind::BackendClientCall);
            }

            // Env references are recorded even without an edge.
            if ENV_REF_RE.is_match(line) {
                output.add_evidence(
                    Evidence::builder(EvidenceKind::EnvVar, self.endpoint_id)
                        .file(self.path)
                        .line(idx as u32 + 1)
                        .excerpt(line)
                        .build(),
                );
            }
        }
    }

    /// `.from('table')` followed, within the lookahead window, by the
    /// operation. No operation found means a medium-confidence select.
    fn table_access(
        &self,
        output: &mut PassOutput,
        idx: usize,
        table: &str,
        after: usize,
        end: usize,
    ) {
        let line = self.lines[idx];
        let tail = format!(
            "{}\n{}",
            &line[after..],
            window(self.lines, idx + 1, self.lookahead.saturating_sub(1), end)
        );
        let chain = tail.split(".from(").next().unwrap_or("");
        let (operation, confidence) = match DB_OP_RE
            .captures(chain)
            .and_then(|m| DbOperation::parse(&m[1]))
        {
            Some(operation) => (operation, Confidence::High),
            None => (DbOperation::Select, Confidence::Medium),
        };
        self.cite(
            output,
            idx,
            edge_to_table(self.endpoint_id, table, operation, confidence),
            EvidenceKind::BackendClientCall,
        );
    }

    fn storage_access(&self, output: &mut PassOutput, idx: usize, bucket: &str) {
        let edge = GraphEdge::new(
            EdgeType::Stores,
            self.endpoint_id,
            EdgeTarget::node(ids::storage_id()),
            bucket,
        )
        .with_metadata(EdgeMetadata::StorageAccess {
            bucket: bucket.to_string(),
        });
        self.cite(output, idx, edge, EvidenceKind::BackendClientCall);
    }

    fn external_call(&self, output: &mut PassOutput, idx: usize, via: &str, url: &str) {
        let Some(host) = URL_HOST_RE.captures(url).map(|c| c[1].to_lowercase()) else {
            return;
        };
        if LOCAL_HOSTS.contains(&host.as_str()) {
            return;
        }

        let node = match service_for_host(&host) {
            Some(def) => service_node(def, Some(&host)),
            None => host_node(&host),
        };
        let edge = GraphEdge::new(
            EdgeType::CallsExternal,
            self.endpoint_id,
            EdgeTarget::node(node.id.clone()),
            &host,
        )
        .with_metadata(EdgeMetadata::ExternalCall {
            host: Some(host.clone()),
            via: via.to_string(),
        });
        output.add_node(node);
        self.cite(output, idx, edge, EvidenceKind::ExternalApiCall);
    }

    /// `new Stripe(...)`: the client is built here, the host is implied.
    fn sdk_client(&self, output: &mut PassOutput, idx: usize, class: &str) {
        let Some(def) = SDK_SERVICES
            .iter()
            .find(|(sdk, _)| *sdk == class)
            .and_then(|(_, slug)| service_def(slug))
        else {
            return;
        };
        let node = service_node(def, None);
        let edge = GraphEdge::new(
            EdgeType::CallsExternal,
            self.endpoint_id,
            EdgeTarget::node(node.id.clone()),
            "",
        )
        .with_confidence(Confidence::Medium)
        .with_metadata(EdgeMetadata::ExternalCall {
            host: None,
            via: format!("new {}", class),
        });
        output.add_node(node);
        self.cite(output, idx, edge, EvidenceKind::ExternalApiCall);
    }

    /// Add `edge` with a citation of line `idx`.
    fn cite(&self, output: &mut PassOutput, idx: usize, edge: GraphEdge, kind: EvidenceKind) {
        let evidence = Evidence::builder(kind, self.endpoint_id)
            .edge(edge.id.clone())
            .file(self.path)
            .line(idx as u32 + 1)
            .excerpt(self.lines[idx])
            .confidence(edge.confidence)
            .build();
        output.add_cited_edge(edge, evidence);
    }
}

fn edge_to_table(
    endpoint_id: &str,
    table: &str,
    operation: DbOperation,
    confidence: Confidence,
) -> GraphEdge {
    GraphEdge::new(
        operation.edge_type(),
        endpoint_id,
        EdgeTarget::node(ids::table_id("public", table)),
        operation.as_str(),
    )
    .with_confidence(confidence)
    .with_metadata(EdgeMetadata::DataAccess {
        operation,
        table: table.to_string(),
    })
}

/// Point every placeholder `calls` edge (in the store or this output) at the
/// endpoint whose route matches, when one does.
///
/// Matching requires the call's method to be served by the endpoint. Edges
/// with no match keep their placeholder.
fn resolve_placeholders(output: &mut PassOutput, store: &GraphStore) {
    let index = RouteIndex::from_nodes(
        store
            .nodes_of_type(NodeType::Endpoint)
            .chain(output.nodes_of_type(NodeType::Endpoint)),
    );
    if index.is_empty() {
        return;
    }

    let repo_of = |source: &str| -> Option<String> {
        store
            .node(source)
            .or_else(|| output.nodes.iter().find(|n| n.id == source))
            .and_then(|n| n.owning_repo_id.clone())
    };

    let mut rewrites = Vec::new();
    let mut unresolved = 0usize;
    for edge in store.edges().chain(output.edges.iter()) {
        let EdgeTarget::Placeholder(path) = &edge.target else {
            continue;
        };
        let repo = repo_of(&edge.source);
        match index.resolve(path, edge.metadata.http_method(), repo.as_deref()) {
            Some(target) => rewrites.push((edge.id.clone(), target.to_string())),
            None => unresolved += 1,
        }
    }

    tracing::debug!(
        "Resolved {} placeholder targets, {} left dangling",
        rewrites.len(),
        unresolved
    );
    for (edge_id, target) in rewrites {
        output.rewrite_target(edge_id, target);
    }
}
