use archscan_core::config::{
    DEFAULT_MAX_FILE_SIZE, DEFAULT_MIN_AUTO_FEATURE_SCREENS, DEFAULT_SCREEN_EVIDENCE_CAP,
    DEFAULT_TABLE_OP_LOOKAHEAD,
};
use archscan_core::{ConfigError, DiscoveryConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = DiscoveryConfig::default();
    assert_eq!(config.corpus.max_file_size, DEFAULT_MAX_FILE_SIZE);
    assert_eq!(config.analysis.table_op_lookahead, DEFAULT_TABLE_OP_LOOKAHEAD);
    assert_eq!(config.features.screen_evidence_cap, DEFAULT_SCREEN_EVIDENCE_CAP);
    assert!(config.corpus.exclude_dirs.iter().any(|d| d == "node_modules"));
}

#[test]
fn test_toml_round_trip() {
    let mut config = DiscoveryConfig::default();
    config.corpus.max_file_size = 4096;
    config.analysis.worker_threads = 3;
    config.features.step_evidence_cap = 1;

    let rendered = config.to_toml().unwrap();
    let parsed: DiscoveryConfig = toml::from_str(&rendered).unwrap();

    assert_eq!(parsed.corpus.max_file_size, 4096);
    assert_eq!(parsed.corpus.exclude_dirs, config.corpus.exclude_dirs);
    assert_eq!(parsed.analysis.worker_threads, 3);
    assert_eq!(parsed.features.step_evidence_cap, 1);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("archscan.toml");
    fs::write(&path, "[corpus]\nmax_file_size = 1234\n").unwrap();

    let config = DiscoveryConfig::from_file(&path).unwrap();
    assert_eq!(config.corpus.max_file_size, 1234);
    assert_eq!(config.analysis.table_op_lookahead, DEFAULT_TABLE_OP_LOOKAHEAD);
}

#[test]
fn test_invalid_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("archscan.toml");

    fs::write(&path, "[corpus\nmax_file_size = ").unwrap();
    assert!(matches!(
        DiscoveryConfig::from_file(&path),
        Err(ConfigError::ParseError(_))
    ));

    fs::write(&path, "[analysis]\ntable_op_lookahead = 0\n").unwrap();
    assert!(matches!(
        DiscoveryConfig::from_file(&path),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_missing_file_is_a_read_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = DiscoveryConfig::from_file(temp_dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}

#[test]
fn test_env_override() {
    let mut config = DiscoveryConfig::default();
    assert_eq!(config.features.min_auto_feature_screens, DEFAULT_MIN_AUTO_FEATURE_SCREENS);

    std::env::set_var("ARCHSCAN_MIN_AUTO_FEATURE_SCREENS", "4");
    config.apply_env_overrides();
    std::env::remove_var("ARCHSCAN_MIN_AUTO_FEATURE_SCREENS");

    assert_eq!(config.features.min_auto_feature_screens, 4);
}

#[test]
fn test_unparseable_env_value_is_ignored() {
    let mut config = DiscoveryConfig::default();
    std::env::set_var("ARCHSCAN_MAX_TOTAL_SIZE", "lots");
    config.apply_env_overrides();
    std::env::remove_var("ARCHSCAN_MAX_TOTAL_SIZE");

    assert_eq!(
        config.corpus.max_total_size,
        DiscoveryConfig::default().corpus.max_total_size
    );
}

#[test]
fn test_evidence_caps_above_bounds_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("archscan.toml");
    fs::write(&path, "[features]\nscreen_evidence_cap = 10\nstep_evidence_cap = 10\n").unwrap();
    assert!(matches!(
        DiscoveryConfig::from_file(&path),
        Err(ConfigError::Invalid(_))
    ));
}
