//! The corpus the pipeline analyzes.
//!
//! Callers hand over repository file lists plus a map of pre-fetched file
//! contents; the passes never perform IO themselves.

mod loader;

pub use loader::{load_repository, CorpusLoader, LoadedRepository};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A file listed in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoFile {
    /// Path relative to the repository root, forward slashes.
    pub path: String,
    pub sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl RepoFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sha: String::new(),
            language: None,
        }
    }
}

/// A repository to analyze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub provider: String,
    pub default_branch: String,
    pub files: Vec<RepoFile>,
}

impl Repository {
    pub fn new(id: impl Into<String>, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            name: name.into(),
            provider: "github".to_string(),
            default_branch: "main".to_string(),
            files: Vec::new(),
        }
    }

    pub fn with_files<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.extend(paths.into_iter().map(RepoFile::new));
        self
    }
}

/// Everything one "analyze this project" request needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    pub project_id: String,
    pub repositories: Vec<Repository>,
    /// File contents keyed by path. In multi-repo corpora a key may be
    /// qualified as `"<repo id>:<path>"`; qualified keys win.
    pub contents: HashMap<String, String>,
}

impl AnalysisInput {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    pub fn with_repository(mut self, repo: Repository) -> Self {
        self.repositories.push(repo);
        self
    }

    pub fn with_content(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.contents.insert(path.into(), content.into());
        self
    }

    /// Content of `path` in `repo`, if it was fetched.
    pub fn content(&self, repo: &Repository, path: &str) -> Option<&str> {
        self.contents
            .get(&format!("{}:{}", repo.id, path))
            .or_else(|| self.contents.get(path))
            .map(String::as_str)
    }

    /// A read view per repository, in input order.
    pub fn repos(&self) -> impl Iterator<Item = RepoView<'_>> {
        self.repositories.iter().map(move |repo| RepoView { repo, input: self })
    }
}

/// Read access to one repository's files and contents.
#[derive(Debug, Clone, Copy)]
pub struct RepoView<'a> {
    pub repo: &'a Repository,
    input: &'a AnalysisInput,
}

impl<'a> RepoView<'a> {
    pub fn new(repo: &'a Repository, input: &'a AnalysisInput) -> Self {
        Self { repo, input }
    }

    /// Graph ID of this repository's node.
    pub fn repo_node_id(&self) -> String {
        crate::ids::repo_id(&self.repo.id)
    }

    pub fn paths(&self) -> impl Iterator<Item = &'a str> {
        self.repo.files.iter().map(|f| f.path.as_str())
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.repo.files.iter().any(|f| f.path == path)
    }

    pub fn content(&self, path: &str) -> Option<&'a str> {
        self.input.content(self.repo, path)
    }
}
