//! Configuration management for archscan.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `archscan.toml` file
//! 3. User config `~/.config/archscan/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Corpus loading configuration.
    pub corpus: CorpusConfig,

    /// Per-pass extraction tuning.
    pub analysis: AnalysisConfig,

    /// Feature extraction limits.
    pub features: FeatureConfig,
}

impl DiscoveryConfig {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./archscan.toml` (project local)
    /// 2. `~/.config/archscan/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(PROJECT_CONFIG_FILE).exists() {
            return Self::from_file(PROJECT_CONFIG_FILE);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE);
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: DiscoveryConfig = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var("ARCHSCAN_MAX_FILE_SIZE") {
            if let Ok(n) = size.parse() {
                self.corpus.max_file_size = n;
            }
        }
        if let Ok(size) = std::env::var("ARCHSCAN_MAX_TOTAL_SIZE") {
            if let Ok(n) = size.parse() {
                self.corpus.max_total_size = n;
            }
        }

        if let Ok(threads) = std::env::var("ARCHSCAN_WORKER_THREADS") {
            if let Ok(n) = threads.parse() {
                self.analysis.worker_threads = n;
            }
        }
        if let Ok(lines) = std::env::var("ARCHSCAN_TABLE_OP_LOOKAHEAD") {
            if let Ok(n) = lines.parse() {
                self.analysis.table_op_lookahead = n;
            }
        }

        if let Ok(size) = std::env::var("ARCHSCAN_MIN_AUTO_FEATURE_SCREENS") {
            if let Ok(n) = size.parse() {
                self.features.min_auto_feature_screens = n;
            }
        }
    }

    /// Reject settings the passes cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.table_op_lookahead == 0 {
            return Err(ConfigError::Invalid(
                "analysis.table_op_lookahead must be at least 1".to_string(),
            ));
        }
        if self.features.screen_evidence_cap > MAX_SCREEN_EVIDENCE_CAP {
            return Err(ConfigError::Invalid(format!(
                "features.screen_evidence_cap must be at most {}",
                MAX_SCREEN_EVIDENCE_CAP
            )));
        }
        if self.features.step_evidence_cap > MAX_STEP_EVIDENCE_CAP {
            return Err(ConfigError::Invalid(format!(
                "features.step_evidence_cap must be at most {}",
                MAX_STEP_EVIDENCE_CAP
            )));
        }
        if self.features.min_auto_feature_screens < 2 {
            return Err(ConfigError::Invalid(
                "features.min_auto_feature_screens must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    /// Render this configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = DiscoveryConfig::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Corpus loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Maximum size of a single file to load (in bytes).
    pub max_file_size: u64,

    /// Maximum total corpus size per repository (in bytes).
    pub max_total_size: u64,

    /// File extensions to include (without leading dot).
    pub include_extensions: Vec<String>,

    /// Exact file names to include regardless of extension.
    pub include_file_names: Vec<String>,

    /// Directories to exclude from scanning.
    pub exclude_dirs: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
            include_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            include_file_names: DEFAULT_FILE_NAMES.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Extraction tuning shared by the analysis passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Worker threads for per-file extraction (0 = available cores).
    pub worker_threads: usize,

    /// Lines after a `.from(table)` call searched for the operation keyword.
    pub table_op_lookahead: usize,

    /// Lines after a `fetch(` call searched for an explicit HTTP method.
    pub fetch_method_lookahead: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            table_op_lookahead: DEFAULT_TABLE_OP_LOOKAHEAD,
            fetch_method_lookahead: DEFAULT_FETCH_METHOD_LOOKAHEAD,
        }
    }
}

/// Feature extraction limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Evidence IDs kept per screen step.
    pub screen_evidence_cap: usize,

    /// Evidence IDs kept per api_call / db_operation / external_call step.
    pub step_evidence_cap: usize,

    /// Minimum uncovered screens under one prefix to form an auto feature.
    pub min_auto_feature_screens: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            screen_evidence_cap: DEFAULT_SCREEN_EVIDENCE_CAP,
            step_evidence_cap: DEFAULT_STEP_EVIDENCE_CAP,
            min_auto_feature_screens: DEFAULT_MIN_AUTO_FEATURE_SCREENS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.corpus.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.analysis.table_op_lookahead, DEFAULT_TABLE_OP_LOOKAHEAD);
        assert_eq!(config.features.step_evidence_cap, DEFAULT_STEP_EVIDENCE_CAP);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_to_toml() {
        let toml_str = DiscoveryConfig::default_config_string();
        assert!(toml_str.contains("[corpus]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("[features]"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[corpus]
max_file_size = 200000

[analysis]
table_op_lookahead = 8

[features]
screen_evidence_cap = 1
"#;
        let config: DiscoveryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.corpus.max_file_size, 200000);
        assert_eq!(config.analysis.table_op_lookahead, 8);
        assert_eq!(config.analysis.fetch_method_lookahead, DEFAULT_FETCH_METHOD_LOOKAHEAD);
        assert_eq!(config.features.screen_evidence_cap, 1);
    }

    #[test]
    fn test_validate_rejects_zero_lookahead() {
        let mut config = DiscoveryConfig::default();
        config.analysis.table_op_lookahead = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_unbounded_evidence_caps() {
        let mut config = DiscoveryConfig::default();
        config.features.screen_evidence_cap = MAX_SCREEN_EVIDENCE_CAP + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = DiscoveryConfig::default();
        config.features.step_evidence_cap = 10;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.features.step_evidence_cap = MAX_STEP_EVIDENCE_CAP;
        assert!(config.validate().is_ok());
    }
}
