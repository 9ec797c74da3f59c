//! Version-control collaborator contract.

use std::path::Path;

use crate::error::Result;

/// A commit as seen by version resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    /// First line of the message.
    pub summary: String,
    /// Full message including body and footers.
    pub message: String,
}

impl CommitInfo {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let summary = message.lines().next().unwrap_or_default().trim().to_string();
        Self {
            id: id.into(),
            summary,
            message,
        }
    }
}

/// Opens repositories for package directories.
pub trait VersionControl: Send + Sync {
    /// Opens the repository containing `path`.
    ///
    /// Returns `Ok(None)` when `path` is not inside a repository; other
    /// failures are hard errors.
    fn open(&self, path: &Path) -> Result<Option<Box<dyn Repository>>>;

    fn is_repository(&self, path: &Path) -> Result<bool> {
        Ok(self.open(path)?.is_some())
    }
}

/// Operations on one open repository.
pub trait Repository {
    fn has_uncommitted_changes(&self) -> Result<bool>;

    /// All tag names.
    fn tags(&self) -> Result<Vec<String>>;

    /// Commits reachable from HEAD but not from `tag`, newest first.
    /// `None` means the whole history.
    fn commits_since(&self, tag: Option<&str>) -> Result<Vec<CommitInfo>>;

    /// Creates an annotated tag at HEAD.
    fn create_tag(&self, name: &str) -> Result<()>;

    /// Stages every change and commits it.
    fn commit_all(&self, message: &str) -> Result<()>;

    /// Pushes the current branch with its tags. One attempt; callers retry.
    fn push(&self, dry_run: bool) -> Result<()>;

    fn current_branch(&self) -> Result<Option<String>>;
}
