//! Git repositories through libgit2, with pushes delegated to the git CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{ErrorCode, IndexAddOption, Sort, StatusOptions};
use rollkit_core::error::{Error, Result};
use rollkit_core::process::ProcessRunner;
use rollkit_core::vcs::{CommitInfo, Repository, VersionControl};
use tracing::{debug, info, instrument};

use crate::process::{run_checked, SystemProcess};

fn vcs_error(path: &Path, error: git2::Error) -> Error {
    Error::Vcs {
        path: path.to_path_buf(),
        message: error.message().to_string(),
    }
}

/// Opens git repositories that contain package directories.
pub struct GitVersionControl {
    process: Arc<dyn ProcessRunner>,
}

impl GitVersionControl {
    pub fn new() -> Self {
        Self::with_process(Arc::new(SystemProcess::new()))
    }

    /// Uses `process` for commands libgit2 does not cover.
    pub fn with_process(process: Arc<dyn ProcessRunner>) -> Self {
        Self { process }
    }
}

impl Default for GitVersionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionControl for GitVersionControl {
    fn open(&self, path: &Path) -> Result<Option<Box<dyn Repository>>> {
        match git2::Repository::discover(path) {
            Ok(repo) => {
                let workdir = repo
                    .workdir()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| path.to_path_buf());
                debug!(path = %path.display(), workdir = %workdir.display(), "found repository");
                Ok(Some(Box::new(GitRepository {
                    repo,
                    workdir,
                    process: Arc::clone(&self.process),
                })))
            }
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(vcs_error(path, e)),
        }
    }
}

/// An open git repository.
pub struct GitRepository {
    repo: git2::Repository,
    workdir: PathBuf,
    process: Arc<dyn ProcessRunner>,
}

impl GitRepository {
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn err(&self, error: git2::Error) -> Error {
        vcs_error(&self.workdir, error)
    }

    fn head_commit(&self) -> Result<Option<git2::Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => head.peel_to_commit().map(Some).map_err(|e| self.err(e)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(self.err(e)),
        }
    }
}

impl Repository for GitRepository {
    fn has_uncommitted_changes(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .include_ignored(false)
            .recurse_untracked_dirs(true);

        let statuses = self
            .repo
            .statuses(Some(&mut options))
            .map_err(|e| self.err(e))?;
        Ok(statuses
            .iter()
            .any(|entry| !entry.status().is_ignored()))
    }

    fn tags(&self) -> Result<Vec<String>> {
        let names = self.repo.tag_names(None).map_err(|e| self.err(e))?;
        Ok(names.iter().flatten().map(str::to_string).collect())
    }

    #[instrument(skip(self))]
    fn commits_since(&self, tag: Option<&str>) -> Result<Vec<CommitInfo>> {
        let Some(head) = self.head_commit()? else {
            return Ok(Vec::new());
        };

        let mut revwalk = self.repo.revwalk().map_err(|e| self.err(e))?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(|e| self.err(e))?;
        revwalk.push(head.id()).map_err(|e| self.err(e))?;

        if let Some(tag) = tag {
            let target = self
                .repo
                .find_reference(&format!("refs/tags/{}", tag))
                .and_then(|r| r.peel_to_commit())
                .map_err(|e| self.err(e))?;
            revwalk.hide(target.id()).map_err(|e| self.err(e))?;
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(|e| self.err(e))?;
            let commit = self.repo.find_commit(oid).map_err(|e| self.err(e))?;
            commits.push(CommitInfo::new(
                oid.to_string(),
                String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            ));
        }

        debug!(count = commits.len(), since = ?tag, "collected commits");
        Ok(commits)
    }

    #[instrument(skip(self))]
    fn create_tag(&self, name: &str) -> Result<()> {
        let head = self.head_commit()?.ok_or_else(|| Error::Vcs {
            path: self.workdir.clone(),
            message: format!("cannot tag {}: repository has no commits", name),
        })?;
        let signature = self.repo.signature().map_err(|e| self.err(e))?;

        self.repo
            .tag(name, head.as_object(), &signature, name, false)
            .map_err(|e| self.err(e))?;

        info!(tag = name, "created tag");
        Ok(())
    }

    #[instrument(skip(self))]
    fn commit_all(&self, message: &str) -> Result<()> {
        let mut index = self.repo.index().map_err(|e| self.err(e))?;
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .map_err(|e| self.err(e))?;
        index.update_all(["*"].iter(), None).map_err(|e| self.err(e))?;
        index.write().map_err(|e| self.err(e))?;

        let tree_id = index.write_tree().map_err(|e| self.err(e))?;
        let tree = self.repo.find_tree(tree_id).map_err(|e| self.err(e))?;
        let signature = self.repo.signature().map_err(|e| self.err(e))?;

        let parent = self.head_commit()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(|e| self.err(e))?;

        info!(message, "committed changes");
        Ok(())
    }

    fn push(&self, dry_run: bool) -> Result<()> {
        let mut args = vec![
            "push".to_string(),
            "origin".to_string(),
            "--follow-tags".to_string(),
        ];
        if dry_run {
            args.push("--dry-run".to_string());
        }
        run_checked(self.process.as_ref(), "git", &args, &self.workdir)?;
        Ok(())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(self.err(e)),
        };

        if head.is_branch() {
            Ok(head.shorthand().map(str::to_string))
        } else {
            Ok(None)
        }
    }
}
