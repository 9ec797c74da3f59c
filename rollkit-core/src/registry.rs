//! Package-registry collaborator contract.

use std::collections::BTreeMap;
use std::path::Path;

use semver::Version;

use crate::error::Result;

/// What the registry knows about a package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub versions: Vec<Version>,
    pub dist_tags: BTreeMap<String, String>,
    pub tarball: Option<String>,
}

impl PackageInfo {
    pub fn has_version(&self, version: &Version) -> bool {
        self.versions.iter().any(|v| v == version)
    }

    pub fn greatest(&self) -> Option<&Version> {
        self.versions.iter().max()
    }
}

pub trait Registry: Send + Sync {
    /// Registry metadata, `None` if the package was never published.
    fn view_package(&self, name: &str) -> Result<Option<PackageInfo>>;

    fn publish(&self, path: &Path, tag: &str, dry_run: bool) -> Result<()>;

    fn unpublish(&self, name: &str, version: &Version) -> Result<()>;

    /// Whether `version` of `name` is already on the registry.
    fn is_published(&self, name: &str, version: &Version) -> Result<bool> {
        Ok(self
            .view_package(name)?
            .is_some_and(|info| info.has_version(version)))
    }
}
