//! Loads a repository corpus from a local directory.
//!
//! The pipeline expects contents to be pre-fetched; this loader is the
//! filesystem flavour of that collaborator, used by the CLI and tests.

use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{AnalysisInput, RepoFile, Repository};
use crate::config::CorpusConfig;
use crate::error::ArchscanError;
use crate::passes::patterns::language_for_path;

/// Walks a directory into a [`Repository`] plus its file contents.
pub struct CorpusLoader {
    root_path: PathBuf,
    config: CorpusConfig,
}

impl CorpusLoader {
    /// Creates a loader rooted at the given path with default config.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            config: CorpusConfig::default(),
        }
    }

    /// Creates a loader with custom configuration.
    pub fn with_config(root_path: impl Into<PathBuf>, config: CorpusConfig) -> Self {
        Self {
            root_path: root_path.into(),
            config,
        }
    }

    /// Sets the maximum file size.
    pub fn max_file_size(mut self, size: u64) -> Self {
        self.config.max_file_size = size;
        self
    }

    /// Loads the directory. The repository ID and name are the directory name.
    pub fn load(&self) -> Result<LoadedRepository, ArchscanError> {
        if !self.root_path.is_dir() {
            return Err(ArchscanError::InvalidCorpus(
                self.root_path.display().to_string(),
            ));
        }

        let name = self
            .root_path
            .canonicalize()
            .map_err(|e| ArchscanError::io(&self.root_path, e))?
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repo")
            .to_string();

        let mut repository = Repository::new(name.clone(), "local", name);
        repository.provider = "local".to_string();

        let mut contents = HashMap::new();
        let mut total_size: u64 = 0;

        for (path, relative) in self.collect_paths() {
            let metadata = fs::metadata(&path).map_err(|e| ArchscanError::io(&path, e))?;

            if metadata.len() > self.config.max_file_size {
                tracing::debug!("Skipping oversized file {}", relative);
                continue;
            }

            if total_size + metadata.len() > self.config.max_total_size {
                tracing::warn!(
                    "Corpus size limit reached at {}; remaining files skipped",
                    relative
                );
                break;
            }

            // Binary or non-UTF-8 files are expected to be filtered upstream.
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(_) => continue,
            };

            total_size += metadata.len();

            repository.files.push(RepoFile {
                path: relative.clone(),
                sha: hex::encode(Sha256::digest(content.as_bytes())),
                language: language_for_path(&relative).map(str::to_string),
            });
            contents.insert(relative, content);
        }

        tracing::info!(
            "Loaded {} files ({} bytes) from {}",
            repository.files.len(),
            total_size,
            self.root_path.display()
        );

        Ok(LoadedRepository {
            repository,
            contents,
        })
    }

    /// Relevant file paths, sorted, with their root-relative form.
    fn collect_paths(&self) -> Vec<(PathBuf, String)> {
        let exclude_dirs = self.config.exclude_dirs.clone();

        let walker = WalkBuilder::new(&self.root_path)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                let name = entry.file_name().to_string_lossy();
                !(is_dir && exclude_dirs.iter().any(|d| d.as_str() == name))
            })
            .build();

        let mut paths: Vec<(PathBuf, String)> = walker
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| self.is_included(entry.path()))
            .map(|entry| {
                let path = entry.path().to_path_buf();
                let relative = path
                    .strip_prefix(&self.root_path)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                (path, relative)
            })
            .collect();

        paths.sort_by(|a, b| a.1.cmp(&b.1));
        paths
    }

    fn is_included(&self, path: &Path) -> bool {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if self.config.include_file_names.iter().any(|n| n == file_name) {
            return true;
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config.include_extensions.iter().any(|e| e == extension)
    }
}

/// A repository loaded from disk.
#[derive(Debug, Clone)]
pub struct LoadedRepository {
    pub repository: Repository,
    /// Contents keyed by root-relative path.
    pub contents: HashMap<String, String>,
}

impl AnalysisInput {
    /// Add a loaded repository, qualifying its content keys with the repo ID.
    pub fn add_loaded(&mut self, loaded: LoadedRepository) {
        let repo_id = loaded.repository.id.clone();
        for (path, content) in loaded.contents {
            self.contents.insert(format!("{}:{}", repo_id, path), content);
        }
        self.repositories.push(loaded.repository);
    }
}

/// Load `root` with the given corpus configuration.
pub fn load_repository(
    root: impl AsRef<Path>,
    config: &CorpusConfig,
) -> Result<LoadedRepository, ArchscanError> {
    CorpusLoader::with_config(root.as_ref(), config.clone()).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let mut file = File::create(root.join("index.ts")).unwrap();
        writeln!(file, "export const x = 1;").unwrap();

        let loaded = CorpusLoader::new(root).load().unwrap();

        assert!(loaded.repository.files.iter().any(|f| f.path == "index.ts"));
        assert_eq!(
            loaded.repository.files[0].language.as_deref(),
            Some("TypeScript")
        );
        assert!(loaded.contents["index.ts"].contains("export const x"));
    }

    #[test]
    fn test_excluded_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("node_modules")).unwrap();
        let mut file = File::create(root.join("node_modules/dep.js")).unwrap();
        writeln!(file, "module.exports = {{}}").unwrap();

        let mut file = File::create(root.join("index.js")).unwrap();
        writeln!(file, "console.log('main')").unwrap();

        let loaded = CorpusLoader::new(root).load().unwrap();

        assert!(loaded.repository.files.iter().any(|f| f.path == "index.js"));
        assert!(!loaded
            .repository
            .files
            .iter()
            .any(|f| f.path.contains("node_modules")));
    }

    #[test]
    fn test_env_templates_and_dockerfiles_are_included() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join(".env.example"), "STRIPE_SECRET_KEY=\n").unwrap();
        fs::write(root.join("Dockerfile"), "FROM node:20\n").unwrap();
        fs::write(root.join("logo.png"), "not really a png").unwrap();

        let loaded = CorpusLoader::new(root).load().unwrap();
        let paths: Vec<&str> = loaded.repository.files.iter().map(|f| f.path.as_str()).collect();

        assert!(paths.contains(&".env.example"));
        assert!(paths.contains(&"Dockerfile"));
        assert!(!paths.contains(&"logo.png"));
    }

    #[test]
    fn test_oversized_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("big.ts"), "x".repeat(2048)).unwrap();
        fs::write(root.join("small.ts"), "x").unwrap();

        let loaded = CorpusLoader::new(root).max_file_size(1024).load().unwrap();
        assert_eq!(loaded.repository.files.len(), 1);
        assert_eq!(loaded.repository.files[0].path, "small.ts");
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let result = CorpusLoader::new("/definitely/not/here").load();
        assert!(matches!(result, Err(ArchscanError::InvalidCorpus(_))));
    }

    #[test]
    fn test_add_loaded_qualifies_keys() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.ts"), "const a = 1;").unwrap();

        let loaded = CorpusLoader::new(temp_dir.path()).load().unwrap();
        let repo_id = loaded.repository.id.clone();

        let mut input = AnalysisInput::new("p");
        input.add_loaded(loaded);

        let repo = &input.repositories[0];
        assert_eq!(input.content(repo, "a.ts"), Some("const a = 1;"));
        assert!(input.contents.contains_key(&format!("{}:a.ts", repo_id)));
    }
}
