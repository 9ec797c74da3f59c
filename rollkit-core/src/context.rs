//! Mutable state of a single release run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use semver::Version;
use tracing::debug;

use crate::error::Result;
use crate::package::Package;
use crate::vcs::{Repository, VersionControl};

/// Old and new version of a package bumped in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionBump {
    pub from: Version,
    pub to: Version,
}

/// Scratch state owned by one command invocation and passed through the walk.
#[derive(Default)]
pub struct ReleaseContext {
    dirty: IndexSet<PathBuf>,
    skipped: IndexMap<PathBuf, String>,
    updated: IndexMap<String, VersionBump>,
    tagged: IndexMap<PathBuf, String>,
    repos: HashMap<PathBuf, Option<Rc<dyn Repository>>>,
}

impl ReleaseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self, package: &Package) {
        self.dirty.insert(package.path.clone());
    }

    pub fn is_dirty(&self, package: &Package) -> bool {
        self.dirty.contains(&package.path)
    }

    pub fn skip(&mut self, package: &Package, reason: impl Into<String>) {
        self.skipped
            .entry(package.path.clone())
            .or_insert_with(|| reason.into());
    }

    pub fn is_skipped(&self, package: &Package) -> bool {
        self.skipped.contains_key(&package.path)
    }

    pub fn record_bump(&mut self, name: &str, bump: VersionBump) {
        self.updated.insert(name.to_string(), bump);
    }

    /// Bumps recorded so far, in walk order.
    pub fn updated(&self) -> &IndexMap<String, VersionBump> {
        &self.updated
    }

    pub fn record_tag(&mut self, package: &Package, tag: String) {
        self.tagged.insert(package.path.clone(), tag);
    }

    /// Packages that received a version tag, with the tag name.
    pub fn tagged(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.tagged
            .iter()
            .map(|(path, tag)| (path.as_path(), tag.as_str()))
    }

    /// Repository handle for `package`, opened on first use.
    pub fn repository(
        &mut self,
        package: &Package,
        vcs: &dyn VersionControl,
    ) -> Result<Option<Rc<dyn Repository>>> {
        if let Some(cached) = self.repos.get(&package.path) {
            return Ok(cached.clone());
        }

        let opened: Option<Rc<dyn Repository>> = vcs.open(&package.path)?.map(Rc::from);
        debug!(package = %package.display_name(), found = opened.is_some(), "opened repository");
        self.repos.insert(package.path.clone(), opened.clone());
        Ok(opened)
    }
}
