//! Default values for archscan configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Corpus Defaults
// ============================================================================

/// Maximum size of a single file to load into the corpus (256 KB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 256 * 1024;

/// Maximum total corpus size per repository (64 MB).
pub const DEFAULT_MAX_TOTAL_SIZE: u64 = 64 * 1024 * 1024;

/// File extensions loaded into the corpus.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    // JavaScript/TypeScript
    "js", "ts", "jsx", "tsx", "mjs", "cjs", "svelte", "vue", "astro",
    // Other server languages
    "py", "go", "rs", "rb", "java", "kt",
    // SQL
    "sql",
    // Config/Data
    "json", "yaml", "yml", "toml",
    // Env templates (.env.example, .env.sample)
    "example", "sample", "template",
];

/// Extension-less file names loaded into the corpus.
pub const DEFAULT_FILE_NAMES: &[&str] = &["Dockerfile", "Procfile", ".env.example", ".env.sample"];

/// Directories never walked by the corpus loader.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    // Version control
    ".git",
    ".svn",
    ".hg",
    // Dependencies
    "node_modules",
    "vendor",
    "venv",
    ".venv",
    "__pycache__",
    // Build outputs
    "target",
    "build",
    "dist",
    "out",
    "coverage",
    ".next",
    ".nuxt",
    ".svelte-kit",
    ".vercel",
    ".turbo",
    ".cache",
];

// ============================================================================
// Analysis Defaults
// ============================================================================

/// Worker threads for per-file extraction (0 = available cores).
pub const DEFAULT_WORKER_THREADS: usize = 0;

/// Lines scanned after a `.from(table)` call for the operation keyword.
pub const DEFAULT_TABLE_OP_LOOKAHEAD: usize = 5;

/// Lines scanned after a `fetch(` call for an explicit `method:` option.
pub const DEFAULT_FETCH_METHOD_LOOKAHEAD: usize = 6;

// ============================================================================
// Feature Defaults
// ============================================================================

/// Evidence IDs attached to a screen flow step.
pub const DEFAULT_SCREEN_EVIDENCE_CAP: usize = 3;

/// Evidence IDs attached to api_call, db_operation and external_call steps.
pub const DEFAULT_STEP_EVIDENCE_CAP: usize = 2;

/// Upper bound on `screen_evidence_cap`.
pub const MAX_SCREEN_EVIDENCE_CAP: usize = 3;

/// Upper bound on `step_evidence_cap`.
pub const MAX_STEP_EVIDENCE_CAP: usize = 2;

/// Minimum uncovered screens sharing a prefix before an auto feature is named.
pub const DEFAULT_MIN_AUTO_FEATURE_SCREENS: usize = 2;

// ============================================================================
// Config File Locations
// ============================================================================

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = "archscan.toml";

/// Directory under the user config dir.
pub const USER_CONFIG_DIR: &str = "archscan";

/// User config file name.
pub const USER_CONFIG_FILE: &str = "config.toml";
