//! Regex patterns and lookup tables for heuristic extraction.
//!
//! Every regex is compiled once on first use. Extraction is line-scan based
//! over raw text; over- and under-matching is accepted.

use once_cell::sync::Lazy;
use regex::Regex;

/// Compile a pattern known to be valid at build time.
fn re(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(r) => r,
        Err(e) => panic!("invalid built-in pattern {pattern:?}: {e}"),
    }
}

// --- Languages ---

/// Extension to language name.
const LANGUAGES: &[(&str, &str)] = &[
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("mts", "TypeScript"),
    ("cts", "TypeScript"),
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("mjs", "JavaScript"),
    ("cjs", "JavaScript"),
    ("svelte", "Svelte"),
    ("vue", "Vue"),
    ("astro", "Astro"),
    ("py", "Python"),
    ("rb", "Ruby"),
    ("go", "Go"),
    ("rs", "Rust"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("swift", "Swift"),
    ("php", "PHP"),
    ("cs", "C#"),
    ("sql", "SQL"),
    ("css", "CSS"),
    ("scss", "CSS"),
    ("html", "HTML"),
    ("json", "JSON"),
    ("yaml", "YAML"),
    ("yml", "YAML"),
    ("toml", "TOML"),
    ("md", "Markdown"),
    ("mdx", "Markdown"),
];

/// Languages that never count towards a repo's dominant language.
pub const NON_CODE_LANGUAGES: &[&str] = &["JSON", "YAML", "TOML", "Markdown", "CSS", "HTML", "SQL"];

/// Language of a file, from its extension.
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, language)| *language)
}

// --- Inventory ---

/// Marker file name prefixes that identify a framework on sight.
pub const FRAMEWORK_MARKERS: &[(&str, &str)] = &[
    ("next.config.", "Next.js"),
    ("nuxt.config.", "Nuxt"),
    ("svelte.config.", "SvelteKit"),
    ("astro.config.", "Astro"),
    ("remix.config.", "Remix"),
    ("vite.config.", "Vite"),
    ("angular.json", "Angular"),
    ("Cargo.toml", "Rust"),
    ("go.mod", "Go"),
    ("pyproject.toml", "Python"),
    ("requirements.txt", "Python"),
];

/// Manifest dependencies that identify a framework.
pub const MANIFEST_FRAMEWORKS: &[(&str, &str)] = &[
    ("next", "Next.js"),
    ("nuxt", "Nuxt"),
    ("@sveltejs/kit", "SvelteKit"),
    ("astro", "Astro"),
    ("@remix-run/react", "Remix"),
    ("@angular/core", "Angular"),
    ("vite", "Vite"),
    ("express", "Express"),
    ("fastify", "Fastify"),
    ("hono", "Hono"),
    ("react", "React"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    // Cargo
    ("axum", "Axum"),
    ("actix-web", "Actix Web"),
    ("rocket", "Rocket"),
];

/// Monorepo tool marker files.
pub const MONOREPO_MARKERS: &[(&str, &str)] = &[
    ("pnpm-workspace.yaml", "pnpm"),
    ("turbo.json", "turborepo"),
    ("nx.json", "nx"),
    ("lerna.json", "lerna"),
];

/// Workspace globs assumed when a monorepo declares none.
pub const DEFAULT_WORKSPACE_GLOBS: &[&str] = &["apps/*", "packages/*"];

/// Workspace directory prefixes whose members are libraries, not apps.
pub const LIBRARY_WORKSPACE_DIRS: &[&str] = &["packages", "libs"];

/// Dependencies notable enough to become package nodes.
pub const NOTABLE_PACKAGES: &[&str] = &[
    "@supabase/supabase-js",
    "@supabase/ssr",
    "@supabase/auth-helpers-nextjs",
    "@anthropic-ai/sdk",
    "openai",
    "stripe",
    "@stripe/stripe-js",
    "@prisma/client",
    "drizzle-orm",
    "next-auth",
    "@clerk/nextjs",
    "firebase",
    "resend",
    "@sendgrid/mail",
    "twilio",
    "@sentry/nextjs",
    "posthog-js",
    "@vercel/analytics",
    "@upstash/redis",
    "@trpc/server",
    "@tanstack/react-query",
    "swr",
    "axios",
    "zod",
    "inngest",
];

// --- Routes ---

/// Route prefix to feature tag. Matched on the first path segment.
pub const FEATURE_PREFIXES: &[(&str, &str)] = &[
    ("/auth", "auth"),
    ("/login", "auth"),
    ("/signin", "auth"),
    ("/sign-in", "auth"),
    ("/signup", "auth"),
    ("/sign-up", "auth"),
    ("/register", "auth"),
    ("/logout", "auth"),
    ("/dashboard", "dashboard"),
    ("/settings", "settings"),
    ("/account", "settings"),
    ("/profile", "profile"),
    ("/admin", "admin"),
    ("/billing", "billing"),
    ("/pricing", "billing"),
    ("/checkout", "billing"),
    ("/subscription", "billing"),
    ("/projects", "projects"),
    ("/tasks", "tasks"),
    ("/chat", "chat"),
    ("/messages", "chat"),
    ("/onboarding", "onboarding"),
    ("/team", "team"),
    ("/teams", "team"),
    ("/invite", "team"),
    ("/notifications", "notifications"),
    ("/search", "search"),
    ("/analytics", "analytics"),
    ("/reports", "analytics"),
    ("/integrations", "integrations"),
    ("/webhooks", "integrations"),
    ("/blog", "content"),
    ("/docs", "content"),
];

pub static FETCH_RE: Lazy<Regex> =
    Lazy::new(|| re(r#"\bfetch\(\s*[`'"](/api/[^`'"\s]*)"#));

pub static AXIOS_RE: Lazy<Regex> = Lazy::new(|| {
    re(r#"\baxios\.(get|post|put|patch|delete)\(\s*[`'"](/api/[^`'"\s]*)"#)
});

pub static FUNCTIONS_INVOKE_RE: Lazy<Regex> =
    Lazy::new(|| re(r#"\.functions\.invoke\(\s*[`'"]([\w-]+)"#));

/// `method: 'POST'` inside a fetch options object.
pub static FETCH_METHOD_RE: Lazy<Regex> =
    Lazy::new(|| re(r#"\bmethod\s*:\s*[`'"]([A-Za-z]+)[`'"]"#));

pub static LINK_HREF_RE: Lazy<Regex> =
    Lazy::new(|| re(r#"\bhref=\{?\s*[`'"](/[^`'"\s]*)"#));

pub static ROUTER_NAV_RE: Lazy<Regex> =
    Lazy::new(|| re(r#"\brouter\.(push|replace)\(\s*[`'"](/[^`'"\s]*)"#));

pub static REDIRECT_RE: Lazy<Regex> =
    Lazy::new(|| re(r#"\b(redirect|permanentRedirect)\(\s*[`'"](/[^`'"\s]*)"#));

pub static NAVIGATE_RE: Lazy<Regex> =
    Lazy::new(|| re(r#"\b(navigate|goto)\(\s*[`'"](/[^`'"\s]*)"#));

/// `${expr}` interpolation inside a template literal.
pub static TEMPLATE_EXPR_RE: Lazy<Regex> = Lazy::new(|| re(r"\$\{[^}]*\}"));

// --- Backend client calls ---

pub static TABLE_FROM_RE: Lazy<Regex> =
    Lazy::new(|| re(r#"\.from\(\s*[`'"]([A-Za-z_][A-Za-z0-9_]*)[`'"]\s*\)"#));

pub static STORAGE_FROM_RE: Lazy<Regex> =
    Lazy::new(|| re(r#"\.storage\s*\.from\(\s*[`'"]([A-Za-z0-9_\-]+)[`'"]"#));

pub static DB_OP_RE: Lazy<Regex> =
    Lazy::new(|| re(r"\.(select|insert|update|delete|upsert)\("));

pub static RPC_RE: Lazy<Regex> =
    Lazy::new(|| re(r#"\.rpc\(\s*[`'"]([A-Za-z_][A-Za-z0-9_]*)[`'"]"#));

pub static AUTH_CALL_RE: Lazy<Regex> = Lazy::new(|| {
    re(r"\.auth\.((?:admin\.)?[A-Za-z]+)\(|\b(getServerSession|currentUser|getAuth)\(")
});

pub static EXTERNAL_URL_RE: Lazy<Regex> = Lazy::new(|| {
    re(r#"\b(fetch|axios(?:\.[a-z]+)?)\(\s*[`'"](https?://[^`'"\s]+)"#)
});

pub static URL_HOST_RE: Lazy<Regex> = Lazy::new(|| re(r"^https?://([^/:?#`'$]+)"));

pub static SDK_CONSTRUCTOR_RE: Lazy<Regex> =
    Lazy::new(|| re(r"\bnew\s+(Stripe|OpenAI|Anthropic|Resend|Twilio)\s*\("));

pub static ENV_REF_RE: Lazy<Regex> = Lazy::new(|| {
    re(concat!(
        r"process\.env\.([A-Z][A-Z0-9_]*)",
        r"|import\.meta\.env\.([A-Z][A-Z0-9_]*)",
        r#"|Deno\.env\.get\(\s*['"]([A-Z][A-Z0-9_]*)['"]"#,
    ))
});

/// Hosts never treated as external services.
pub const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "[::1]"];

/// `(sdk class, service slug)` for SDK constructors.
pub const SDK_SERVICES: &[(&str, &str)] = &[
    ("Stripe", "stripe"),
    ("OpenAI", "openai"),
    ("Anthropic", "anthropic"),
    ("Resend", "resend"),
    ("Twilio", "twilio"),
];

// --- Endpoints ---

pub static EXPORT_FUNCTION_METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?m)^\s*export\s+(?:async\s+)?function\s+(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\b")
});

pub static EXPORT_CONST_METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?m)^\s*export\s+(?:const|let)\s+(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\b")
});

pub static EXPORT_LIST_RE: Lazy<Regex> = Lazy::new(|| re(r"(?m)^\s*export\s*\{([^}]*)\}"));

pub static REQ_METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    re(r#"\b(?:req|request)\.method\s*===?\s*['"](GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)['"]"#)
});

// --- Deployment ---

/// `(config file name, platform)`.
pub const PLATFORM_CONFIGS: &[(&str, &str)] = &[
    ("vercel.json", "Vercel"),
    ("netlify.toml", "Netlify"),
    ("fly.toml", "Fly.io"),
    ("render.yaml", "Render"),
    ("railway.json", "Railway"),
    ("railway.toml", "Railway"),
    ("Dockerfile", "Docker"),
    ("app.yaml", "App Engine"),
];

/// Framework configs whose presence implies a default platform.
pub const INFERRED_PLATFORMS: &[(&str, &str)] = &[("next.config.", "Vercel")];

/// Prefixes of framework config files scanned for env references.
pub const FRAMEWORK_CONFIG_PREFIXES: &[&str] = &[
    "next.config.",
    "vite.config.",
    "svelte.config.",
    "nuxt.config.",
    "astro.config.",
];

/// Directories whose files commonly read configuration.
pub const CONFIG_DIRS: &[&str] = &["lib", "config", "utils"];

/// `KEY=value` lines in env files.
pub static ENV_ASSIGNMENT_RE: Lazy<Regex> =
    Lazy::new(|| re(r"^\s*(?:export\s+)?([A-Z][A-Z0-9_]{2,})\s*="));

/// Code reference to a secret-style variable.
pub static SECRET_ENV_RE: Lazy<Regex> = Lazy::new(|| {
    re(concat!(
        r#"(?:process\.env\.|import\.meta\.env\.|Deno\.env\.get\(\s*['"]|env\(\s*['"])"#,
        r"([A-Z][A-Z0-9_]{2,})",
    ))
});

/// Any reference to a publicly exposed variable.
pub static PUBLIC_ENV_RE: Lazy<Regex> = Lazy::new(|| {
    re(r"\b((?:NEXT_PUBLIC|VITE|PUBLIC|EXPO_PUBLIC|REACT_APP|NUXT_PUBLIC)_[A-Z0-9_]+)")
});

/// A service an env var, host or SDK points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDef {
    pub slug: &'static str,
    pub name: &'static str,
    pub category: &'static str,
}

const fn service(slug: &'static str, name: &'static str, category: &'static str) -> ServiceDef {
    ServiceDef {
        slug,
        name,
        category,
    }
}

pub const SERVICES: &[ServiceDef] = &[
    service("stripe", "Stripe", "payments"),
    service("openai", "OpenAI", "ai"),
    service("anthropic", "Anthropic", "ai"),
    service("supabase", "Supabase", "backend"),
    service("resend", "Resend", "email"),
    service("sendgrid", "SendGrid", "email"),
    service("twilio", "Twilio", "messaging"),
    service("slack", "Slack", "messaging"),
    service("sentry", "Sentry", "monitoring"),
    service("posthog", "PostHog", "analytics"),
    service("clerk", "Clerk", "auth"),
    service("github", "GitHub", "developer"),
    service("google", "Google", "cloud"),
    service("aws", "AWS", "cloud"),
    service("redis", "Redis", "cache"),
    service("postgres", "PostgreSQL", "database"),
];

pub fn service_def(slug: &str) -> Option<&'static ServiceDef> {
    SERVICES.iter().find(|s| s.slug == slug)
}

/// Env var name patterns to service slug. First match wins.
pub static ENV_SERVICES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"^(?:NEXT_PUBLIC_)?STRIPE_\w*(?:KEY|SECRET)$", "stripe"),
        (r"^OPENAI_\w*(?:KEY|ORG\w*)$", "openai"),
        (r"^ANTHROPIC_\w*KEY$", "anthropic"),
        (r"^(?:NEXT_PUBLIC_|VITE_|PUBLIC_)?SUPABASE_\w*(?:KEY|URL)$", "supabase"),
        (r"^RESEND_\w*KEY$", "resend"),
        (r"^SENDGRID_\w*KEY$", "sendgrid"),
        (r"^TWILIO_\w*(?:SID|TOKEN|KEY)$", "twilio"),
        (r"^SLACK_\w*(?:TOKEN|WEBHOOK\w*|SECRET)$", "slack"),
        (r"^(?:NEXT_PUBLIC_)?SENTRY_\w*(?:DSN|TOKEN)$", "sentry"),
        (r"^(?:NEXT_PUBLIC_)?POSTHOG_\w*(?:KEY|HOST)$", "posthog"),
        (r"^(?:NEXT_PUBLIC_)?CLERK_\w*KEY$", "clerk"),
        (r"^GITHUB_\w*(?:TOKEN|SECRET|CLIENT_ID|APP_ID|PRIVATE_KEY)$", "github"),
        (r"^GOOGLE_\w*(?:KEY|SECRET|CLIENT_ID)$", "google"),
        (r"^AWS_\w*(?:KEY|KEY_ID|SECRET\w*|REGION)$", "aws"),
        (r"^(?:UPSTASH_REDIS_\w*|REDIS_URL|KV_\w*(?:URL|TOKEN))$", "redis"),
        (r"^(?:DATABASE_URL|POSTGRES_\w*(?:URL|PASSWORD))$", "postgres"),
    ]
    .into_iter()
    .map(|(pattern, slug)| (re(pattern), slug))
    .collect()
});

/// Host suffix to service slug.
pub const HOST_SERVICES: &[(&str, &str)] = &[
    ("stripe.com", "stripe"),
    ("openai.com", "openai"),
    ("anthropic.com", "anthropic"),
    ("supabase.co", "supabase"),
    ("resend.com", "resend"),
    ("sendgrid.com", "sendgrid"),
    ("twilio.com", "twilio"),
    ("slack.com", "slack"),
    ("sentry.io", "sentry"),
    ("posthog.com", "posthog"),
    ("github.com", "github"),
    ("googleapis.com", "google"),
    ("amazonaws.com", "aws"),
];

/// Service a host belongs to, by domain suffix.
pub fn service_for_host(host: &str) -> Option<&'static ServiceDef> {
    HOST_SERVICES
        .iter()
        .find(|(suffix, _)| host == *suffix || host.ends_with(&format!(".{}", suffix)))
        .and_then(|(_, slug)| service_def(slug))
}

pub fn service_for_env(var: &str) -> Option<&'static ServiceDef> {
    ENV_SERVICES
        .iter()
        .find(|(pattern, _)| pattern.is_match(var))
        .and_then(|(_, slug)| service_def(slug))
}

/// `(manifest dependency prefix, service slug)` detected as singletons.
pub const SINGLETON_SERVICES: &[(&str, &str)] =
    &[("@supabase/", "supabase"), ("@anthropic-ai/sdk", "anthropic")];

// --- SQL ---

/// Schemas owned by the database platform rather than the application.
pub const INTERNAL_SCHEMAS: &[&str] = &[
    "auth",
    "storage",
    "extensions",
    "graphql",
    "graphql_public",
    "realtime",
    "supabase_functions",
    "supabase_migrations",
    "pgsodium",
    "vault",
    "net",
    "cron",
    "pg_catalog",
    "information_schema",
];

/// Qualified name fragment: optional `schema.` then name, quotes allowed.
const QUALIFIED: &str = r#"(?:"?(\w+)"?\.)?"?(\w+)"?"#;

pub static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"(?i)\bcreate\s+(?:unlogged\s+)?table\s+(?:if\s+not\s+exists\s+)?{}\s*\(",
        QUALIFIED
    ))
});

/// `ALTER TABLE t`; the clauses follow up to the statement's semicolon.
pub static ALTER_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"(?i)\balter\s+table\s+(?:only\s+)?(?:if\s+exists\s+)?{}\s+",
        QUALIFIED
    ))
});

/// One `ADD COLUMN` clause of an `ALTER TABLE`, comments stripped.
pub static ADD_COLUMN_CLAUSE_RE: Lazy<Regex> =
    Lazy::new(|| re(r"(?is)^add\s+column\s+(?:if\s+not\s+exists\s+)?(.+)$"));

pub static ENABLE_RLS_RE: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        concat!(
            r"(?i)\balter\s+table\s+(?:only\s+)?(?:if\s+exists\s+)?{}",
            r"\s+enable\s+row\s+level\s+security",
        ),
        QUALIFIED
    ))
});

pub static CREATE_POLICY_RE: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r#"(?i)\bcreate\s+policy\s+(?:"([^"]+)"|(\w+))\s+on\s+{}"#,
        QUALIFIED
    ))
});

pub static CREATE_FUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"(?i)\bcreate\s+(?:or\s+replace\s+)?function\s+{}\s*\(",
        QUALIFIED
    ))
});

pub static CREATE_TRIGGER_RE: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        concat!(
            r#"(?i)\bcreate\s+(?:or\s+replace\s+)?(?:constraint\s+)?trigger\s+"?(\w+)"?"#,
            r"[^;]*?\bon\s+{}[^;]*?\bexecute\s+(?:function|procedure)\s+{}\s*\(",
        ),
        QUALIFIED, QUALIFIED
    ))
});

pub static REFERENCES_RE: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r#"(?i)\breferences\s+{}(?:\s*\(\s*"?(\w+)"?\s*\))?"#,
        QUALIFIED
    ))
});

pub static TABLE_PRIMARY_KEY_RE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bprimary\s+key\s*\(([^)]*)\)"));

pub static TABLE_FOREIGN_KEY_RE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bforeign\s+key\s*\(([^)]*)\)"));

pub static DOLLAR_QUOTE_RE: Lazy<Regex> = Lazy::new(|| re(r"\$(\w*)\$"));

pub static FUNCTION_LANGUAGE_RE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\blanguage\s+'?(\w+)'?"));

pub static FUNCTION_RETURNS_RE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\breturns\s+((?:setof\s+)?[\w\.]+(?:\[\])?)"));

pub static SECURITY_DEFINER_RE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bsecurity\s+definer\b"));

pub static AUTH_USERS_RE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bauth\.users\b"));

pub static STORAGE_REF_RE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bstorage\.(?:buckets|objects)\b"));

pub static BUCKET_INSERT_RE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?is)\binsert\s+into\s+storage\.buckets\s*\(([^)]*)\)\s*values\s*([^;]+)")
});

pub static SQL_TUPLE_RE: Lazy<Regex> = Lazy::new(|| re(r"\(([^()]*)\)"));

/// Keywords that end a column's type in a column definition.
pub const COLUMN_TYPE_TERMINATORS: &[&str] = &[
    "not",
    "null",
    "primary",
    "references",
    "default",
    "unique",
    "check",
    "constraint",
    "generated",
    "collate",
];

/// Leading keywords of table-level constraints inside `CREATE TABLE`.
pub const TABLE_CONSTRAINT_KEYWORDS: &[&str] =
    &["constraint", "primary", "foreign", "unique", "check", "exclude", "like"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_path() {
        assert_eq!(language_for_path("app/page.tsx"), Some("TypeScript"));
        assert_eq!(language_for_path("src/routes/+page.svelte"), Some("Svelte"));
        assert_eq!(language_for_path("Dockerfile"), None);
        assert_eq!(language_for_path("README.MD"), Some("Markdown"));
    }

    #[test]
    fn test_env_service_mapping() {
        assert_eq!(service_for_env("STRIPE_SECRET_KEY").map(|s| s.slug), Some("stripe"));
        assert_eq!(
            service_for_env("NEXT_PUBLIC_SUPABASE_ANON_KEY").map(|s| s.slug),
            Some("supabase")
        );
        assert_eq!(service_for_env("DATABASE_URL").map(|s| s.slug), Some("postgres"));
        assert!(service_for_env("NODE_ENV").is_none());
    }

    #[test]
    fn test_host_mapping_uses_suffix() {
        assert_eq!(service_for_host("api.stripe.com").map(|s| s.slug), Some("stripe"));
        assert!(service_for_host("notstripe.com").is_none());
        assert!(service_for_host("example.org").is_none());
    }

    #[test]
    fn test_every_env_service_is_defined() {
        for (_, slug) in ENV_SERVICES.iter() {
            assert!(service_def(slug).is_some(), "{slug}");
        }
        for (_, slug) in HOST_SERVICES.iter().chain(SDK_SERVICES) {
            assert!(service_def(slug).is_some(), "{slug}");
        }
    }

    #[test]
    fn test_trigger_pattern() {
        let sql = concat!(
            "create trigger on_signup after insert on auth.users ",
            "for each row execute function public.handle_new_user();",
        );
        let cap = CREATE_TRIGGER_RE.captures(sql).unwrap();
        assert_eq!(&cap[1], "on_signup");
        assert_eq!(cap.get(2).map(|m| m.as_str()), Some("auth"));
        assert_eq!(&cap[3], "users");
        assert_eq!(&cap[5], "handle_new_user");
    }

    #[test]
    fn test_fetch_patterns() {
        let cap = FETCH_RE.captures("const r = await fetch(`/api/users/${id}`)").unwrap();
        assert_eq!(&cap[1], "/api/users/${id}");
        assert!(FETCH_RE.captures("fetch('https://api.stripe.com/v1')").is_none());
    }
}
