//! Data-model pass: tables, policies, functions and triggers from SQL
//! migrations, plus the auth and storage subsystems they imply.
//!
//! Migration files of every repository are concatenated in path order and
//! scanned as one text with sequential regexes. An offset map translates a
//! statement back to its file; statements straddling two files are still
//! emitted, with evidence that carries no file path.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::ops::Range;

use super::patterns::{
    ADD_COLUMN_CLAUSE_RE, ALTER_TABLE_RE, AUTH_USERS_RE, BUCKET_INSERT_RE, COLUMN_TYPE_TERMINATORS,
    CREATE_FUNCTION_RE, CREATE_POLICY_RE, CREATE_TABLE_RE, CREATE_TRIGGER_RE, DOLLAR_QUOTE_RE,
    ENABLE_RLS_RE,
    FUNCTION_LANGUAGE_RE, FUNCTION_RETURNS_RE, INTERNAL_SCHEMAS, REFERENCES_RE, SECURITY_DEFINER_RE,
    SQL_TUPLE_RE, STORAGE_REF_RE, TABLE_CONSTRAINT_KEYWORDS, TABLE_FOREIGN_KEY_RE,
    TABLE_PRIMARY_KEY_RE,
};
use super::text::{line_at, unquote};
use super::{AnalysisPass, PassContext};
use crate::corpus::AnalysisInput;
use crate::graph::{GraphStore, PassOutput};
use crate::ids;
use crate::ontology::{
    AuthMeta, Column, ColumnReference, Confidence, DbOperation, EdgeMetadata, EdgeTarget, EdgeType,
    Evidence, EvidenceBuilder, EvidenceKind, FunctionMeta, GraphEdge, GraphNode, NodeMetadata,
    StorageMeta, TableMeta,
};
use regex::Captures;

const DEFAULT_SCHEMA: &str = "public";

/// Table conventionally mirroring the auth subsystem's users.
const PROFILES_TABLE: &str = "profiles";

pub struct DataModelPass;

impl AnalysisPass for DataModelPass {
    fn name(&self) -> &'static str {
        "data_model"
    }

    fn run(&self, ctx: &PassContext<'_>, store: &GraphStore) -> PassOutput {
        let migrations = MigrationText::collect(ctx.input);
        let mut output = PassOutput::new();
        if migrations.is_empty() {
            tracing::debug!("No migration files found");
        }

        let schema = Schema::parse(&migrations, &mut output);
        tracing::debug!(
            "Parsed {} tables, {} functions, {} triggers from {} migration files",
            schema.tables.len(),
            schema.functions.len(),
            schema.triggers.len(),
            migrations.segments.len()
        );

        emit_tables(&mut output, &migrations, &schema);
        emit_functions(&mut output, &migrations, &schema);
        emit_auth(&mut output, &migrations, &schema, store);
        emit_storage(&mut output, &migrations, store);
        output
    }
}

/// One migration file's slice of the concatenated text.
#[derive(Debug)]
struct Segment {
    range: Range<usize>,
    repo_node_id: String,
    path: String,
}

/// Where a statement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Location<'a> {
    repo_node_id: &'a str,
    path: &'a str,
    line_start: u32,
    line_end: u32,
}

/// Every migration file, concatenated in repository then path order.
#[derive(Debug, Default)]
struct MigrationText {
    text: String,
    segments: Vec<Segment>,
}

impl MigrationText {
    fn collect(input: &AnalysisInput) -> Self {
        let mut migrations = Self::default();
        for repo in input.repos() {
            let mut paths: Vec<&str> = repo.paths().filter(|p| is_migration(p)).collect();
            paths.sort_unstable();
            for path in paths {
                let Some(content) = repo.content(path) else {
                    tracing::debug!("No content for migration {}", path);
                    continue;
                };
                migrations.push(&repo.repo_node_id(), path, content);
            }
        }
        migrations
    }

    fn push(&mut self, repo_node_id: &str, path: &str, content: &str) {
        let start = self.text.len();
        self.text.push_str(content);
        let end = self.text.len();
        self.text.push('\n');
        self.segments.push(Segment {
            range: start..end,
            repo_node_id: repo_node_id.to_string(),
            path: path.to_string(),
        });
    }

    fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The file holding all of `range`, or `None` when it spans files.
    fn locate(&self, range: Range<usize>) -> Option<Location<'_>> {
        let segment = self
            .segments
            .iter()
            .find(|s| s.range.start <= range.start && range.start <= s.range.end)?;
        if range.end > segment.range.end {
            return None;
        }
        let content = &self.text[segment.range.clone()];
        Some(Location {
            repo_node_id: &segment.repo_node_id,
            path: &segment.path,
            line_start: line_at(content, range.start - segment.range.start),
            line_end: line_at(content, range.end - segment.range.start),
        })
    }

    /// Evidence citing `range`, with file and lines when traceable.
    fn cite(&self, kind: EvidenceKind, node_id: &str, range: Range<usize>) -> EvidenceBuilder {
        let builder = Evidence::builder(kind, node_id);
        match self.locate(range) {
            Some(loc) => builder.file(loc.path).lines(loc.line_start, loc.line_end),
            None => builder,
        }
    }

    fn repo_of(&self, range: Range<usize>) -> Option<&str> {
        self.locate(range).map(|loc| loc.repo_node_id)
    }
}

fn is_migration(path: &str) -> bool {
    path.ends_with(".sql")
        && (path.starts_with("migrations/") || path.contains("/migrations/"))
}

#[derive(Debug)]
struct TableDef {
    schema: String,
    name: String,
    columns: Vec<Column>,
    /// Statement span in the concatenated text.
    span: Range<usize>,
    /// `(column, span)` of every foreign key definition.
    fk_spans: Vec<(String, Range<usize>)>,
}

#[derive(Debug)]
struct FunctionDef {
    schema: String,
    name: String,
    meta: FunctionMeta,
    span: Range<usize>,
}

#[derive(Debug)]
struct TriggerDef {
    name: String,
    table: (String, String),
    function: (String, String),
    span: Range<usize>,
}

/// Everything recognized in the migrations.
#[derive(Debug, Default)]
struct Schema {
    tables: IndexMap<(String, String), TableDef>,
    rls: IndexMap<(String, String), Range<usize>>,
    policies: IndexMap<(String, String), Vec<(String, Range<usize>)>>,
    functions: IndexMap<(String, String), FunctionDef>,
    triggers: Vec<TriggerDef>,
}

impl Schema {
    fn parse(migrations: &MigrationText, output: &mut PassOutput) -> Self {
        let text = migrations.text.as_str();
        let mut schema = Self::default();

        for cap in CREATE_TABLE_RE.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let key = qualified(&cap, 1);
            let Some(close) = matching_paren(text, whole.end()) else {
                output.warn(format!("Unterminated CREATE TABLE {}.{}", key.0, key.1));
                continue;
            };
            if is_internal(&key) || schema.tables.contains_key(&key) {
                continue;
            }
            let span = whole.start()..statement_end(text, close);
            let (columns, fk_spans) = parse_table_body(text, whole.end()..close);
            schema.tables.insert(
                key.clone(),
                TableDef {
                    schema: key.0,
                    name: key.1,
                    columns,
                    span,
                    fk_spans,
                },
            );
        }

        for cap in ALTER_TABLE_RE.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let Some(table) = schema.tables.get_mut(&qualified(&cap, 1)) else {
                continue;
            };
            let end = statement_end(text, whole.end());
            let body_end = if text[..end].ends_with(';') { end - 1 } else { end };
            for (span, clause) in split_top_level(&text[whole.end()..body_end], whole.end()) {
                let clause = strip_comments(clause);
                let Some(def) = ADD_COLUMN_CLAUSE_RE.captures(&clause).and_then(|c| c.get(1)) else {
                    continue;
                };
                let Some(column) = parse_column(def.as_str()) else {
                    continue;
                };
                if table.columns.iter().any(|c| c.name == column.name) {
                    continue;
                }
                if column.foreign_key {
                    table.fk_spans.push((column.name.clone(), span));
                }
                table.columns.push(column);
            }
        }

        for cap in ENABLE_RLS_RE.captures_iter(text) {
            if let Some(whole) = cap.get(0) {
                schema.rls.entry(qualified(&cap, 1)).or_insert(whole.range());
            }
        }

        for cap in CREATE_POLICY_RE.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let Some(name) = cap.get(1).or_else(|| cap.get(2)) else {
                continue;
            };
            let span = whole.start()..statement_end(text, whole.end());
            let policies = schema.policies.entry(qualified(&cap, 3)).or_default();
            if !policies.iter().any(|(n, _)| n == name.as_str()) {
                policies.push((name.as_str().to_string(), span));
            }
        }

        for cap in CREATE_FUNCTION_RE.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let key = qualified(&cap, 1);
            if is_internal(&key) || schema.functions.contains_key(&key) {
                continue;
            }
            match parse_function(text, whole.start(), whole.end()) {
                Some((meta, span)) => {
                    schema.functions.insert(
                        key.clone(),
                        FunctionDef {
                            schema: key.0,
                            name: key.1,
                            meta,
                            span,
                        },
                    );
                }
                None => output.warn(format!("Unterminated CREATE FUNCTION {}.{}", key.0, key.1)),
            }
        }

        for cap in CREATE_TRIGGER_RE.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            schema.triggers.push(TriggerDef {
                name: cap[1].to_string(),
                table: qualified(&cap, 2),
                function: qualified(&cap, 4),
                span: whole.start()..statement_end(text, whole.end()),
            });
        }

        schema
    }
}

/// `(schema, name)` from the qualified-name groups starting at `group`.
fn qualified(cap: &Captures<'_>, group: usize) -> (String, String) {
    let schema = cap
        .get(group)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
    let name = cap
        .get(group + 1)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();
    (schema, name)
}

fn is_internal((schema, name): &(String, String)) -> bool {
    INTERNAL_SCHEMAS.contains(&schema.as_str()) || name.starts_with('_') || name.is_empty()
}

/// Characters of `text` outside comments, with their byte offset and
/// whether they sit inside a string literal. A line comment yields its
/// newline and a block comment a single space.
fn sql_chars(text: &str) -> impl Iterator<Item = (usize, char, bool)> + '_ {
    let mut chars = text.char_indices().peekable();
    let mut quoted = false;
    std::iter::from_fn(move || loop {
        let (idx, ch) = chars.next()?;
        if quoted {
            quoted = ch != '\'';
            return Some((idx, ch, true));
        }
        match (ch, chars.peek().map(|&(_, c)| c)) {
            ('\'', _) => {
                quoted = true;
                return Some((idx, ch, true));
            }
            ('-', Some('-')) => {
                for (end, c) in chars.by_ref() {
                    if c == '\n' {
                        return Some((end, c, false));
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for (_, c) in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                return Some((idx, ' ', false));
            }
            _ => return Some((idx, ch, false)),
        }
    })
}

/// SQL characters that are neither commented out nor quoted.
fn code_chars(text: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    sql_chars(text).filter(|(_, _, quoted)| !quoted).map(|(idx, ch, _)| (idx, ch))
}

/// Index of the `)` closing the paren opened just before `from`.
fn matching_paren(text: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (idx, ch) in code_chars(&text[from..]) {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// End of the statement containing `from`: just past the next `;`, or the
/// end of the text.
fn statement_end(text: &str, from: usize) -> usize {
    code_chars(&text[from..])
        .find(|&(_, ch)| ch == ';')
        .map(|(idx, _)| from + idx + 1)
        .unwrap_or(text.len())
}

/// Split on commas at paren depth zero, keeping each piece's offset.
fn split_top_level(text: &str, base: usize) -> Vec<(Range<usize>, &str)> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, ch) in code_chars(text) {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                items.push((base + start..base + idx, &text[start..idx]));
                start = idx + 1;
            }
            _ => {}
        }
    }
    items.push((base + start..base + text.len(), &text[start..]));
    items
}

fn parse_table_body(text: &str, body: Range<usize>) -> (Vec<Column>, Vec<(String, Range<usize>)>) {
    let mut columns: Vec<Column> = Vec::new();
    let mut fk_spans = Vec::new();

    for (span, item) in split_top_level(&text[body.clone()], body.start) {
        let item = strip_comments(item);
        let Some(keyword) = item.split_whitespace().next().map(str::to_lowercase) else {
            continue;
        };

        if TABLE_CONSTRAINT_KEYWORDS.contains(&keyword.as_str()) {
            if let Some(pk) = TABLE_PRIMARY_KEY_RE.captures(&item) {
                for name in column_list(&pk[1]) {
                    if let Some(column) = columns.iter_mut().find(|c| c.name == name) {
                        column.primary_key = true;
                        column.nullable = false;
                    }
                }
            }
            if let (Some(fk), Some(reference)) =
                (TABLE_FOREIGN_KEY_RE.captures(&item), REFERENCES_RE.captures(&item))
            {
                for name in column_list(&fk[1]) {
                    if let Some(column) = columns.iter_mut().find(|c| c.name == name) {
                        column.foreign_key = true;
                        column.references = Some(column_reference(&reference));
                        fk_spans.push((name, span.clone()));
                    }
                }
            }
            continue;
        }

        if let Some(column) = parse_column(&item) {
            if column.foreign_key {
                fk_spans.push((column.name.clone(), span));
            }
            columns.push(column);
        }
    }
    (columns, fk_spans)
}

fn strip_comments(item: &str) -> String {
    sql_chars(item).map(|(_, ch, _)| ch).collect::<String>().trim().to_string()
}

fn column_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|c| unquote(c.trim()).to_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}

fn column_reference(cap: &Captures<'_>) -> ColumnReference {
    ColumnReference {
        schema: cap.get(1).map(|m| m.as_str().to_lowercase()),
        table: cap[2].to_lowercase(),
        column: cap.get(3).map(|m| m.as_str().to_lowercase()),
    }
}

/// Parse `name type [constraints…]`.
fn parse_column(def: &str) -> Option<Column> {
    let def = strip_comments(def);
    let mut tokens = def.split_whitespace();
    let name = unquote(tokens.next()?).to_lowercase();
    let data_type = tokens
        .take_while(|t| !COLUMN_TYPE_TERMINATORS.contains(&t.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() || data_type.is_empty() {
        return None;
    }

    let lower = def.to_lowercase();
    let primary_key = lower.contains("primary key");
    let references = REFERENCES_RE.captures(&def).map(|cap| column_reference(&cap));
    Some(Column {
        name,
        data_type: data_type.to_lowercase(),
        nullable: !(primary_key || lower.contains("not null")),
        primary_key,
        foreign_key: references.is_some(),
        references,
    })
}

/// Attributes and span of a function whose argument list opens before
/// `args_start`. The body is dollar-quoted or runs to the next `;`.
fn parse_function(
    text: &str,
    start: usize,
    args_start: usize,
) -> Option<(FunctionMeta, Range<usize>)> {
    let args_end = matching_paren(text, args_start)?;
    let next_semicolon = text[args_end..].find(';').map(|i| args_end + i);

    let opening = DOLLAR_QUOTE_RE
        .captures_at(text, args_end)
        .and_then(|cap| cap.get(0).map(|m| (m, cap.get(1).map_or("", |t| t.as_str()))))
        .filter(|(m, _)| next_semicolon.map_or(true, |semi| m.start() < semi));

    let (body, end) = match opening {
        Some((open, tag)) => {
            let closing = format!("${}$", tag);
            let close_start = open.end() + text[open.end()..].find(&closing)?;
            let close_end = close_start + closing.len();
            (open.start()..close_end, statement_end(text, close_end))
        }
        None => {
            let end = next_semicolon.map(|i| i + 1).unwrap_or(text.len());
            (end..end, end)
        }
    };

    // Attributes sit outside the body.
    let attributes = format!("{} {}", &text[start..body.start], &text[body.end..end]);
    let meta = FunctionMeta {
        schema: String::new(),
        language: FUNCTION_LANGUAGE_RE
            .captures(&attributes)
            .map(|c| c[1].to_lowercase()),
        security_definer: SECURITY_DEFINER_RE.is_match(&attributes),
        returns: FUNCTION_RETURNS_RE
            .captures(&attributes)
            .map(|c| c[1].to_lowercase()),
    };
    Some((meta, start..end))
}

fn emit_tables(output: &mut PassOutput, migrations: &MigrationText, schema: &Schema) {
    let text = migrations.text.as_str();

    for (key, table) in &schema.tables {
        let table_id = ids::table_id(&table.schema, &table.name);
        let policies = schema.policies.get(key);
        let mut node = GraphNode::new(
            table_id.clone(),
            table.name.clone(),
            NodeMetadata::Table(TableMeta {
                schema: table.schema.clone(),
                columns: table.columns.clone(),
                has_rls: schema.rls.contains_key(key),
                policies: policies
                    .map(|p| p.iter().map(|(name, _)| name.clone()).collect())
                    .unwrap_or_default(),
            }),
        );
        if let Some(repo) = migrations.repo_of(table.span.clone()) {
            node = node.with_repo(repo);
        }
        output.add_node(node);
        output.add_evidence(
            migrations
                .cite(EvidenceKind::DbTable, &table_id, table.span.clone())
                .block_excerpt(&text[table.span.clone()])
                .build(),
        );

        if let Some(span) = schema.rls.get(key) {
            output.add_evidence(
                migrations
                    .cite(EvidenceKind::RlsPolicy, &table_id, span.clone())
                    .excerpt(&text[span.clone()])
                    .build(),
            );
        }
        for (_, span) in policies.into_iter().flatten() {
            output.add_evidence(
                migrations
                    .cite(EvidenceKind::RlsPolicy, &table_id, span.clone())
                    .excerpt(&text[span.clone()])
                    .build(),
            );
        }

        for (column_name, span) in &table.fk_spans {
            let Some(reference) = table
                .columns
                .iter()
                .find(|c| &c.name == column_name)
                .and_then(|c| c.references.as_ref())
            else {
                continue;
            };
            let ref_schema = reference.schema.as_deref().unwrap_or(DEFAULT_SCHEMA);
            let target = if ref_schema == "auth" && reference.table == "users" {
                ids::auth_id()
            } else if is_internal(&(ref_schema.to_string(), reference.table.clone())) {
                continue;
            } else {
                ids::table_id(ref_schema, &reference.table)
            };
            let references = match &reference.column {
                Some(column) => format!("{}.{}.{}", ref_schema, reference.table, column),
                None => format!("{}.{}", ref_schema, reference.table),
            };
            let edge = GraphEdge::new(
                EdgeType::Reads,
                table_id.clone(),
                EdgeTarget::node(target),
                column_name,
            )
            .with_metadata(EdgeMetadata::ForeignKey {
                column: column_name.clone(),
                references,
            });
            let evidence = migrations
                .cite(EvidenceKind::SqlMigration, &table_id, span.clone())
                .edge(edge.id.clone())
                .excerpt(text[span.clone()].trim())
                .build();
            output.add_cited_edge(edge, evidence);
        }
    }
}

fn emit_functions(output: &mut PassOutput, migrations: &MigrationText, schema: &Schema) {
    let text = migrations.text.as_str();

    for function in schema.functions.values() {
        let function_id = ids::function_id(&function.schema, &function.name);
        let mut node = GraphNode::new(
            function_id.clone(),
            function.name.clone(),
            NodeMetadata::Function(FunctionMeta {
                schema: function.schema.clone(),
                ..function.meta.clone()
            }),
        );
        if let Some(repo) = migrations.repo_of(function.span.clone()) {
            node = node.with_repo(repo);
        }
        output.add_node(node);
        output.add_evidence(
            migrations
                .cite(EvidenceKind::DbFunction, &function_id, function.span.clone())
                .block_excerpt(&text[function.span.clone()])
                .build(),
        );
    }

    for trigger in &schema.triggers {
        if !schema.tables.contains_key(&trigger.table) {
            continue;
        }
        let table_id = ids::table_id(&trigger.table.0, &trigger.table.1);
        let function_id = ids::function_id(&trigger.function.0, &trigger.function.1);
        let edge = GraphEdge::new(
            EdgeType::UsesFunction,
            table_id.clone(),
            EdgeTarget::node(function_id),
            &trigger.name,
        )
        .with_metadata(EdgeMetadata::Trigger {
            trigger: trigger.name.clone(),
        });
        let evidence = migrations
            .cite(EvidenceKind::SqlMigration, &table_id, trigger.span.clone())
            .edge(edge.id.clone())
            .excerpt(&text[trigger.span.clone()])
            .build();
        output.add_cited_edge(edge, evidence);
    }
}

/// One auth node when the migrations reference the platform's users table,
/// declare a profiles table, or earlier passes saw authentication calls.
fn emit_auth(
    output: &mut PassOutput,
    migrations: &MigrationText,
    schema: &Schema,
    store: &GraphStore,
) {
    let text = migrations.text.as_str();
    let users_ref = AUTH_USERS_RE.find(text);
    let profiles = schema
        .tables
        .get(&(DEFAULT_SCHEMA.to_string(), PROFILES_TABLE.to_string()));
    let auth_calls = store.edges_of_type(EdgeType::Authenticates).next().is_some();
    if users_ref.is_none() && profiles.is_none() && !auth_calls {
        return;
    }

    let auth_id = ids::auth_id();
    output.add_node(GraphNode::new(
        auth_id.clone(),
        "Auth",
        NodeMetadata::Auth(AuthMeta {
            provider: users_ref.map(|_| "supabase".to_string()),
        }),
    ));
    if let Some(found) = users_ref {
        let span = found.start()..statement_end(text, found.end());
        output.add_evidence(
            migrations
                .cite(EvidenceKind::SqlMigration, &auth_id, found.range())
                .excerpt(&text[span])
                .build(),
        );
    }

    if let Some(profiles) = profiles {
        let edge = GraphEdge::new(
            EdgeType::Writes,
            auth_id.clone(),
            EdgeTarget::node(ids::table_id(&profiles.schema, &profiles.name)),
            DbOperation::Insert.as_str(),
        )
        .with_confidence(Confidence::Medium)
        .with_metadata(EdgeMetadata::DataAccess {
            operation: DbOperation::Insert,
            table: profiles.name.clone(),
        });
        let evidence = migrations
            .cite(EvidenceKind::DbTable, &auth_id, profiles.span.clone())
            .edge(edge.id.clone())
            .excerpt(text[profiles.span.clone()].lines().next().unwrap_or(""))
            .confidence(Confidence::Medium)
            .build();
        output.add_cited_edge(edge, evidence);
    }
}

/// One storage node when the migrations touch the storage schema or earlier
/// passes saw storage calls. Buckets come from both.
fn emit_storage(output: &mut PassOutput, migrations: &MigrationText, store: &GraphStore) {
    let text = migrations.text.as_str();
    let mut buckets: BTreeSet<String> = BTreeSet::new();

    for cap in BUCKET_INSERT_RE.captures_iter(text) {
        let columns = column_list(&cap[1]);
        let Some(position) = columns
            .iter()
            .position(|c| c == "id")
            .or_else(|| columns.iter().position(|c| c == "name"))
        else {
            continue;
        };
        for tuple in SQL_TUPLE_RE.captures_iter(&cap[2]) {
            if let Some(value) = tuple[1].split(',').nth(position) {
                let bucket = unquote(value.trim());
                if !bucket.is_empty() {
                    buckets.insert(bucket.to_string());
                }
            }
        }
    }

    let storage_ref = STORAGE_REF_RE.find(text);
    let mut storage_calls = false;
    for edge in store.edges_of_type(EdgeType::Stores) {
        storage_calls = true;
        if let EdgeMetadata::StorageAccess { bucket } = &edge.metadata {
            buckets.insert(bucket.clone());
        }
    }
    if storage_ref.is_none() && !storage_calls {
        return;
    }

    let storage_id = ids::storage_id();
    output.add_node(GraphNode::new(
        storage_id.clone(),
        "Storage",
        NodeMetadata::Storage(StorageMeta {
            buckets: buckets.into_iter().collect(),
        }),
    ));
    if let Some(found) = storage_ref {
        let span = found.start()..statement_end(text, found.end());
        output.add_evidence(
            migrations
                .cite(EvidenceKind::SqlMigration, &storage_id, found.range())
                .excerpt(&text[span])
                .build(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::corpus::Repository;
    use crate::ontology::{NodeType, BLOCK_EXCERPT_CAP};

    fn run_with(files: &[(&str, &str)], store: &GraphStore) -> PassOutput {
        let repo = Repository::new("r1", "acme", "web").with_files(files.iter().map(|(p, _)| *p));
        let mut input = AnalysisInput::new("p").with_repository(repo);
        for (path, content) in files {
            input = input.with_content(*path, *content);
        }
        let config = DiscoveryConfig::default();
        DataModelPass.run(&PassContext::new(&input, &config), store)
    }

    fn run(files: &[(&str, &str)]) -> PassOutput {
        run_with(files, &GraphStore::new())
    }

    fn table<'a>(output: &'a PassOutput, name: &str) -> &'a TableMeta {
        output
            .nodes
            .iter()
            .find(|n| n.label == name && n.node_type() == NodeType::Table)
            .and_then(|n| n.as_table())
            .unwrap()
    }

    #[test]
    fn test_rls_and_policies() {
        let sql = r#"
CREATE TABLE public.tasks (
  id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
  title text NOT NULL,
  done boolean DEFAULT false
);
ALTER TABLE public.tasks ENABLE ROW LEVEL SECURITY;
CREATE POLICY "own_tasks" ON public.tasks FOR SELECT USING (auth.uid() = owner_id);
"#;
        let output = run(&[("supabase/migrations/001_tasks.sql", sql)]);
        let tasks = table(&output, "tasks");
        assert!(tasks.has_rls);
        assert_eq!(tasks.policies, vec!["own_tasks".to_string()]);

        let id = &tasks.columns[0];
        assert!(id.primary_key);
        assert!(!id.nullable);
        assert_eq!(id.data_type, "uuid");
        assert!(!tasks.columns[1].nullable);
        assert!(tasks.columns[2].nullable);
        assert_eq!(
            output
                .evidence
                .iter()
                .filter(|e| e.kind == EvidenceKind::RlsPolicy)
                .count(),
            2
        );
    }

    #[test]
    fn test_rls_declared_in_later_file() {
        let output = run(&[
            ("migrations/001.sql", "create table notes (id serial primary key);"),
            ("migrations/002.sql", "alter table notes enable row level security;"),
        ]);
        assert!(table(&output, "notes").has_rls);
    }

    #[test]
    fn test_foreign_keys_and_auth() {
        let sql = r#"
create table public.profiles (
  id uuid references auth.users(id) on delete cascade primary key,
  username text unique
);
create table public.projects (
  id bigint generated always as identity,
  owner_id uuid not null,
  name varchar(120) not null,
  primary key (id),
  constraint projects_owner_fk foreign key (owner_id) references public.profiles (id)
);
"#;
        let output = run(&[("supabase/migrations/20240101_init.sql", sql)]);

        let projects = table(&output, "projects");
        assert!(projects.columns[0].primary_key);
        let owner = &projects.columns[1];
        assert!(owner.foreign_key);
        assert_eq!(owner.references.as_ref().unwrap().table, "profiles");
        assert_eq!(projects.columns[2].data_type, "varchar(120)");

        let fk_targets: Vec<&str> = output
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Reads)
            .filter_map(|e| e.target_id())
            .collect();
        assert!(fk_targets.contains(&ids::auth_id().as_str()));
        assert!(fk_targets.contains(&ids::table_id("public", "profiles").as_str()));

        let auth = output.nodes.iter().find(|n| n.id == ids::auth_id()).unwrap();
        assert_eq!(auth.label, "Auth");
        let writes = output
            .edges
            .iter()
            .find(|e| e.edge_type == EdgeType::Writes)
            .unwrap();
        assert_eq!(writes.source, ids::auth_id());
        assert_eq!(writes.target_id(), Some(ids::table_id("public", "profiles").as_str()));
    }

    #[test]
    fn test_internal_and_private_tables_skipped() {
        let sql = concat!(
            "create table auth.sessions (id uuid);\n",
            "create table public._prisma_migrations (id text);\n",
            "create table public.orders (id uuid);",
        );
        let output = run(&[("migrations/001.sql", sql)]);
        let tables: Vec<&str> = output.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(tables, vec!["orders"]);
    }

    #[test]
    fn test_functions_and_triggers() {
        let sql = r#"
create table public.profiles (id uuid primary key);

create or replace function public.handle_new_user()
returns trigger
language plpgsql
security definer set search_path = ''
as $$
begin
  insert into public.profiles (id) values (new.id);
  return new;
end;
$$;

create trigger on_profile_created
  after insert on public.profiles
  for each row execute procedure public.handle_new_user();
"#;
        let output = run(&[("supabase/migrations/002_fn.sql", sql)]);

        let function = output
            .nodes
            .iter()
            .find(|n| n.node_type() == NodeType::Function)
            .unwrap();
        assert_eq!(function.label, "handle_new_user");
        let NodeMetadata::Function(meta) = &function.metadata else {
            panic!("expected function metadata");
        };
        assert_eq!(meta.language.as_deref(), Some("plpgsql"));
        assert_eq!(meta.returns.as_deref(), Some("trigger"));
        assert!(meta.security_definer);

        let trigger = output
            .edges
            .iter()
            .find(|e| e.edge_type == EdgeType::UsesFunction)
            .unwrap();
        assert_eq!(trigger.source, ids::table_id("public", "profiles"));
        assert_eq!(trigger.target_id(), Some(function.id.as_str()));
        assert_eq!(trigger.confidence, Confidence::High);
    }

    #[test]
    fn test_storage_buckets() {
        let sql = concat!(
            "insert into storage.buckets (id, name, public)\n",
            "values ('avatars', 'avatars', true), ('docs', 'docs', false);",
        );
        let mut store = GraphStore::new();
        let mut earlier = PassOutput::new();
        earlier.add_edge(
            GraphEdge::new(
                EdgeType::Stores,
                "endpoint_x",
                EdgeTarget::node(ids::storage_id()),
                "uploads",
            )
            .with_metadata(EdgeMetadata::StorageAccess {
                bucket: "uploads".to_string(),
            }),
        );
        store.merge(earlier);

        let output = run_with(&[("migrations/003_storage.sql", sql)], &store);
        let storage = output.nodes.iter().find(|n| n.id == ids::storage_id()).unwrap();
        let NodeMetadata::Storage(meta) = &storage.metadata else {
            panic!("expected storage metadata");
        };
        assert_eq!(meta.buckets, vec!["avatars", "docs", "uploads"]);
    }

    #[test]
    fn test_no_auth_or_storage_without_signals() {
        let output = run(&[("migrations/001.sql", "create table items (id int);")]);
        assert!(output.nodes.iter().all(|n| n.node_type() == NodeType::Table));
    }

    #[test]
    fn test_statement_across_files_has_no_path() {
        let output = run(&[
            ("migrations/001.sql", "create table public.split (\n  id uuid,"),
            ("migrations/002.sql", "  label text\n);"),
        ]);
        let split = table(&output, "split");
        assert_eq!(split.columns.len(), 2);

        let evidence = output
            .evidence
            .iter()
            .find(|e| e.kind == EvidenceKind::DbTable)
            .unwrap();
        assert_eq!(evidence.file_path, None);
        assert!(output.nodes[0].owning_repo_id.is_none());
    }

    #[test]
    fn test_table_excerpt_is_bounded() {
        let columns: Vec<String> = (0..80).map(|i| format!("  col_{} text", i)).collect();
        let sql = format!("create table wide (\n{}\n);", columns.join(",\n"));
        let output = run(&[("migrations/001.sql", sql.as_str())]);
        let evidence = output
            .evidence
            .iter()
            .find(|e| e.kind == EvidenceKind::DbTable)
            .unwrap();
        assert!(evidence.excerpt.chars().count() <= BLOCK_EXCERPT_CAP);
        assert_eq!(evidence.file_path.as_deref(), Some("migrations/001.sql"));
        assert_eq!(evidence.line_start, Some(1));
        assert_eq!(table(&output, "wide").columns.len(), 80);
    }

    #[test]
    fn test_comments_with_apostrophes() {
        let sql = r#"
create table public.tasks (
  id uuid primary key, -- the task's id
  /* it's shown on the board */ title text not null,
  note text default 'it''s fine'
);
create table public.notes (id bigint primary key);
"#;
        let output = run(&[("migrations/001.sql", sql)]);
        assert!(output.warnings.is_empty(), "{:?}", output.warnings);

        let tasks = table(&output, "tasks");
        let names: Vec<&str> = tasks.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "title", "note"]);
        assert!(!tasks.columns[1].nullable);
        assert_eq!(table(&output, "notes").columns.len(), 1);
    }

    #[test]
    fn test_alter_table_adds_several_columns() {
        let sql = r#"
create table public.projects (id uuid primary key);
create table public.tasks (id uuid primary key);
alter table public.tasks
  add column title text, -- shown in the task's header
  add column project_id uuid references public.projects (id),
  drop column legacy;
"#;
        let output = run(&[("migrations/001.sql", sql)]);

        let tasks = table(&output, "tasks");
        let columns: Vec<(&str, &str)> = tasks
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.data_type.as_str()))
            .collect();
        assert_eq!(
            columns,
            vec![("id", "uuid"), ("title", "text"), ("project_id", "uuid")]
        );
        assert!(tasks.columns[2].foreign_key);
        assert!(output
            .edges
            .iter()
            .any(|e| e.edge_type == EdgeType::Reads
                && e.target_id() == Some(ids::table_id("public", "projects").as_str())));
    }
}
