use archscan_core::ids;
use archscan_core::ontology::{
    Confidence, EdgeType, EvidenceKind, FeatureSource, HttpMethod, NodeMetadata, NodeType,
    StepKind, BLOCK_EXCERPT_CAP, LINE_EXCERPT_CAP,
};
use archscan_core::passes::InventoryPass;
use archscan_core::{
    load_repository, AnalysisInput, AnalysisOutput, AnalysisPass, DiscoveryConfig, GraphStore,
    PassContext, Pipeline, Repository,
};
use std::fs;
use tempfile::TempDir;

const PROJECTS_PAGE: &str = r#"'use client';
export default function ProjectsPage() {
  useEffect(() => {
    fetch('/api/projects').then((r) => r.json()).then(setProjects);
  }, []);
  return <ProjectList projects={projects} />;
}
"#;

const PROJECTS_ROUTE: &str = r#"import { createClient } from '@/lib/supabase/server';

export async function GET() {
  const supabase = createClient();
  const { data } = await supabase.from('projects').select('*');
  return Response.json(data);
}

export async function POST(req: Request) {
  const supabase = createClient();
  const body = await req.json();
  const { data } = await supabase.from('projects').insert(body);
  return Response.json(data);
}
"#;

const INIT_SQL: &str = r#"
create table public.projects (
  id uuid primary key default gen_random_uuid(),
  name text not null
);
alter table public.projects enable row level security;
create policy "members_read" on public.projects for select using (true);
"#;

fn corpus(files: &[(&str, &str)]) -> AnalysisInput {
    let repo = Repository::new("r1", "acme", "web").with_files(files.iter().map(|(p, _)| *p));
    files
        .iter()
        .fold(AnalysisInput::new("proj").with_repository(repo), |input, (path, content)| {
            input.with_content(*path, *content)
        })
}

fn projects_corpus() -> AnalysisInput {
    corpus(&[
        (
            "package.json",
            r#"{"name":"web","dependencies":{"next":"14.1.0","@supabase/supabase-js":"^2.39.0"}}"#,
        ),
        ("next.config.js", "module.exports = {};"),
        ("app/layout.tsx", "export default function RootLayout({ children }) { return children; }"),
        ("app/projects/page.tsx", PROJECTS_PAGE),
        ("app/api/projects/route.ts", PROJECTS_ROUTE),
        ("supabase/migrations/0001_init.sql", INIT_SQL),
    ])
}

fn analyze(input: &AnalysisInput) -> AnalysisOutput {
    Pipeline::new(DiscoveryConfig::default()).run(input)
}

#[test]
fn test_projects_end_to_end() {
    let output = analyze(&projects_corpus());
    let repo = ids::repo_id("r1");

    assert_eq!(output.nodes_of_type(NodeType::Screen).count(), 1);
    assert_eq!(output.nodes_of_type(NodeType::Endpoint).count(), 2);

    let screen = ids::screen_id(&repo, "/projects");
    let get = ids::endpoint_id(&repo, HttpMethod::Get, "/api/projects");
    let post = ids::endpoint_id(&repo, HttpMethod::Post, "/api/projects");

    let calls: Vec<_> = output
        .edges_of_type(EdgeType::Calls)
        .filter(|e| e.source == screen)
        .collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target_id(), Some(get.as_str()));
    assert_eq!(calls[0].confidence, Confidence::Medium);
    assert!(!calls[0].evidence_ids.is_empty());

    let table = ids::table_id("public", "projects");
    let table_node = output.node(&table).unwrap();
    assert!(table_node.as_table().unwrap().has_rls);

    assert!(output
        .edges_of_type(EdgeType::Reads)
        .any(|e| e.source == get && e.target_id() == Some(table.as_str())));
    assert!(output
        .edges_of_type(EdgeType::Writes)
        .any(|e| e.source == post && e.target_id() == Some(table.as_str())));

    let feature = output.feature("projects").unwrap();
    assert_eq!(feature.source, FeatureSource::Catalog);
    assert_eq!(feature.screens, vec![screen.clone()]);
    assert_eq!(feature.flow[0].kind, StepKind::Screen);
    assert_eq!(feature.flow[0].node_id, screen);
    assert!(feature.steps(StepKind::ApiCall).any(|s| s.node_id == get));
    assert!(feature.steps(StepKind::DbOperation).any(|s| s.node_id == table));
    assert!(feature.tables.contains(&table));

    assert_eq!(output.summary.dangling_edges, 0);
    assert_eq!(output.summary.coverage.screens_with_calls.covered, 1);
    assert_eq!(output.summary.coverage.tables_with_rls.covered, 1);
    assert_eq!(output.summary.coverage.screens_in_features.ratio, 1.0);
}

#[test]
fn test_every_edge_and_node_is_cited() {
    let output = analyze(&projects_corpus());
    let evidence_ids: Vec<&str> = output.evidence.iter().map(|e| e.id.as_str()).collect();

    for edge in output.edges.iter().filter(|e| e.edge_type != EdgeType::Contains) {
        assert!(
            !edge.evidence_ids.is_empty(),
            "edge {:?} has no evidence",
            edge.edge_type
        );
        for id in &edge.evidence_ids {
            assert!(evidence_ids.contains(&id.as_str()));
        }
    }

    for kind in [NodeType::Screen, NodeType::Endpoint, NodeType::Table] {
        for node in output.nodes_of_type(kind) {
            assert!(
                output.evidence.iter().any(|e| e.node_id == node.id && e.edge_id.is_none()),
                "{} has no evidence",
                node.label
            );
        }
    }
}

#[test]
fn test_runs_are_deterministic() {
    let input = projects_corpus();
    let first = analyze(&input);
    let second = analyze(&input);
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());

    let mut single = DiscoveryConfig::default();
    single.analysis.worker_threads = 1;
    let mut many = DiscoveryConfig::default();
    many.analysis.worker_threads = 4;
    assert_eq!(Pipeline::new(single).run(&input), Pipeline::new(many).run(&input));
}

#[test]
fn test_inventory_merge_is_idempotent() {
    let input = projects_corpus();
    let config = DiscoveryConfig::default();
    let ctx = PassContext::new(&input, &config);

    let mut store = GraphStore::new();
    store.merge(InventoryPass.run(&ctx, &store));
    let counts = (store.node_count(), store.edge_count(), store.evidence_count());

    let stats = store.merge(InventoryPass.run(&ctx, &store));
    assert_eq!(
        (store.node_count(), store.edge_count(), store.evidence_count()),
        counts
    );
    assert_eq!(stats.nodes_added, 0);
    assert_eq!(stats.edges_added, 0);
}

#[test]
fn test_dynamic_call_resolves_and_unknown_stays_dangling() {
    let input = corpus(&[
        (
            "app/users/page.tsx",
            concat!(
                "const user = await fetch('/api/users/42');\n",
                "const gone = await fetch('/api/missing');\n",
            ),
        ),
        (
            "app/api/users/[id]/route.ts",
            concat!(
                "export async function GET(req, { params }) {\n",
                "  return Response.json({ id: params.id });\n",
                "}\n",
            ),
        ),
    ]);
    let output = analyze(&input);
    let repo = ids::repo_id("r1");
    let user = ids::endpoint_id(&repo, HttpMethod::Get, "/api/users/[id]");

    let calls: Vec<_> = output.edges_of_type(EdgeType::Calls).collect();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().any(|e| e.target_id() == Some(user.as_str())));

    let dangling: Vec<_> = calls.iter().filter(|e| e.target.is_placeholder()).collect();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].target.as_wire(), "api:/api/missing");
    assert_eq!(output.summary.dangling_edges, 1);
}

#[test]
fn test_features_need_matching_screens() {
    let input = corpus(&[
        ("app/pricing/page.tsx", "export default function Pricing() {}"),
        ("app/api/projects/route.ts", "export async function GET() {}"),
        ("app/api/dashboard/route.ts", "export async function GET() {}"),
    ]);
    let output = analyze(&input);

    let slugs: Vec<&str> = output.features.iter().map(|f| f.slug.as_str()).collect();
    assert_eq!(slugs, vec!["billing"]);
}

#[test]
fn test_uncatalogued_routes_are_grouped() {
    let input = corpus(&[
        ("app/recipes/italian/page.tsx", "export default function Italian() {}"),
        ("app/recipes/italian/[id]/page.tsx", "export default function Recipe() {}"),
        ("app/recipes/thai/page.tsx", "export default function Thai() {}"),
        ("app/api/recipes/italian/route.ts", "export async function GET() {}"),
    ]);
    let output = analyze(&input);

    assert_eq!(output.features.len(), 1);
    let feature = output.feature("recipes-italian").unwrap();
    assert_eq!(feature.source, FeatureSource::AutoDetected);
    assert_eq!(feature.name, "Recipes Italian");
    assert_eq!(feature.screens.len(), 2);
    assert_eq!(feature.endpoints.len(), 1);
}

#[test]
fn test_excerpts_are_bounded() {
    let long_line = format!(
        "const r = await fetch('/api/projects'); // {}",
        "x".repeat(LINE_EXCERPT_CAP * 2)
    );
    let columns: Vec<String> = (0..80).map(|i| format!("  column_{} text", i)).collect();
    let wide_table = format!("create table wide (\n{}\n);", columns.join(",\n"));

    let input = corpus(&[
        ("app/projects/page.tsx", long_line.as_str()),
        ("migrations/001_wide.sql", wide_table.as_str()),
    ]);
    let output = analyze(&input);

    for evidence in &output.evidence {
        assert!(evidence.excerpt.chars().count() <= BLOCK_EXCERPT_CAP);
        if evidence.kind == EvidenceKind::FetchCall {
            assert!(evidence.excerpt.chars().count() <= LINE_EXCERPT_CAP);
        }
    }
    let table = output.node(&ids::table_id("public", "wide")).unwrap();
    assert_eq!(table.as_table().unwrap().columns.len(), 80);
}

#[test]
fn test_rls_in_separate_migration() {
    let input = corpus(&[
        (
            "supabase/migrations/001_tables.sql",
            "create table public.tasks (id bigint primary key);",
        ),
        ("supabase/migrations/002_rls.sql", "alter table public.tasks enable row level security;"),
    ]);
    let output = analyze(&input);
    let tasks = output.node(&ids::table_id("public", "tasks")).unwrap();
    assert!(tasks.as_table().unwrap().has_rls);
}

#[test]
fn test_triggers_link_tables_to_functions() {
    let sql = r#"
create table public.profiles (id uuid primary key);

create or replace function public.touch_profile()
returns trigger
language plpgsql
as $$
begin
  new.updated_at = now();
  return new;
end;
$$;

create trigger profiles_touch
  before update on public.profiles
  for each row execute function public.touch_profile();
"#;
    let output = analyze(&corpus(&[("supabase/migrations/003_triggers.sql", sql)]));

    let table = ids::table_id("public", "profiles");
    let function = ids::function_id("public", "touch_profile");
    assert!(output.node(&function).is_some());
    assert!(output
        .edges_of_type(EdgeType::UsesFunction)
        .any(|e| e.source == table && e.target_id() == Some(function.as_str())));
}

#[test]
fn test_monorepo_apps_own_their_files() {
    let input = corpus(&[
        ("package.json", r#"{"name":"mono","private":true}"#),
        ("pnpm-workspace.yaml", "packages:\n  - 'apps/*'\n"),
        ("apps/web/package.json", r#"{"name":"@acme/web","dependencies":{"next":"14.0.0"}}"#),
        ("apps/web/app/tasks/page.tsx", "export default function Tasks() {}"),
        ("apps/web/app/api/tasks/route.ts", "export async function GET() {}"),
        ("apps/docs/package.json", r#"{"name":"@acme/docs","dependencies":{"vite":"5.0.0"}}"#),
        ("apps/docs/vite.config.ts", "export default {};"),
    ]);
    let output = analyze(&input);
    let repo = ids::repo_id("r1");
    let web = ids::app_id(&repo, "apps/web");

    assert_eq!(output.nodes_of_type(NodeType::App).count(), 2);
    let contained: Vec<&str> = output
        .edges_of_type(EdgeType::Contains)
        .filter(|e| e.source == web)
        .filter_map(|e| e.target_id())
        .collect();
    assert!(contained.contains(&ids::screen_id(&repo, "/tasks").as_str()));
    assert!(contained.contains(&ids::endpoint_id(&repo, HttpMethod::Get, "/api/tasks").as_str()));
}

#[test]
fn test_cron_workers_call_endpoints() {
    let vercel = r#"{ "crons": [{ "path": "/api/cron/digest", "schedule": "0 9 * * *" }] }"#;
    let input = corpus(&[
        ("package.json", r#"{"name":"web","dependencies":{"next":"14.0.0"}}"#),
        ("vercel.json", vercel),
        (
            "app/api/cron/digest/route.ts",
            "export async function GET() {\n  return new Response('ok');\n}\n",
        ),
    ]);
    let output = analyze(&input);
    let repo = ids::repo_id("r1");

    let worker = output.nodes_of_type(NodeType::Worker).next().unwrap();
    let NodeMetadata::Worker(meta) = &worker.metadata else {
        panic!("unexpected metadata {:?}", worker.metadata);
    };
    assert_eq!(meta.schedule.as_deref(), Some("0 9 * * *"));

    let endpoint = ids::endpoint_id(&repo, HttpMethod::Get, "/api/cron/digest");
    assert!(output
        .edges_of_type(EdgeType::Calls)
        .any(|e| e.source == worker.id && e.target_id() == Some(endpoint.as_str())));
    assert!(output
        .edges_of_type(EdgeType::DeploysTo)
        .any(|e| e.source == worker.id));
}

#[test]
fn test_loaded_directory_runs_through_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("app/projects")).unwrap();
    fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
    fs::write(root.join("app/projects/page.tsx"), PROJECTS_PAGE).unwrap();
    fs::write(root.join("node_modules/pkg/index.js"), "fetch('/api/ignored')").unwrap();

    let config = DiscoveryConfig::default();
    let loaded = load_repository(root, &config.corpus).unwrap();
    let mut input = AnalysisInput::new("local");
    input.add_loaded(loaded);

    let output = Pipeline::new(config).run(&input);
    assert_eq!(output.nodes_of_type(NodeType::Screen).count(), 1);
    assert!(output
        .evidence
        .iter()
        .all(|e| !e.file_path.as_deref().unwrap_or("").contains("node_modules")));
}
