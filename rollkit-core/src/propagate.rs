//! Rewrites dependents' declared ranges after local dependencies are bumped.

use std::fmt;

use indexmap::IndexMap;
use semver::Version;
use tracing::{info, warn};

use crate::context::VersionBump;
use crate::error::Result;
use crate::manifest::{Manifest, ManifestStore};
use crate::package::{DepKind, Package};
use crate::range::{is_wildcard, satisfies};

/// A range rewritten in a dependent's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeUpdate {
    pub dependency: String,
    pub kind: DepKind,
    pub old_range: String,
    pub new_range: String,
    pub version: Version,
}

impl fmt::Display for RangeUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_wildcard(&self.old_range) {
            write!(
                f,
                "dependency range changed: {} pinned from '{}' to {}",
                self.dependency, self.old_range, self.new_range
            )
        } else {
            write!(
                f,
                "dependency range changed: new version {} of module {} no longer matches range {}, upgraded to {}",
                self.version, self.dependency, self.old_range, self.new_range
            )
        }
    }
}

/// New range for `current` once the dependency is at `version`, if it must change.
pub fn updated_range(current: &str, version: &Version) -> Option<String> {
    if is_wildcard(current) {
        return Some(version.to_string());
    }

    match satisfies(version, current) {
        Some(true) => None,
        Some(false) => Some(format!("^{}", version)),
        None => {
            warn!("cannot evaluate range '{}', leaving it unchanged", current);
            None
        }
    }
}

/// Applies every needed range change to `manifest` in place.
pub fn propagate_ranges(manifest: &mut Manifest, bumps: &IndexMap<String, VersionBump>) -> Vec<RangeUpdate> {
    let mut updates = Vec::new();

    for (dependency, bump) in bumps {
        for kind in DepKind::ALL {
            let Some(current) = manifest.dependency_range(kind, dependency).map(str::to_string) else {
                continue;
            };
            let Some(new_range) = updated_range(&current, &bump.to) else {
                continue;
            };
            manifest.set_dependency_range(kind, dependency, &new_range);
            updates.push(RangeUpdate {
                dependency: dependency.clone(),
                kind,
                old_range: current,
                new_range,
                version: bump.to.clone(),
            });
        }
    }

    updates
}

/// Propagates bumped versions into dependents' manifests.
pub struct RangePropagator<'a> {
    manifests: &'a dyn ManifestStore,
}

impl<'a> RangePropagator<'a> {
    pub fn new(manifests: &'a dyn ManifestStore) -> Self {
        Self { manifests }
    }

    /// Updates `package`'s ranges for every bumped dependency it declares.
    ///
    /// The manifest is written before returning unless `dry_run` is set.
    pub fn propagate(
        &self,
        package: &Package,
        bumps: &IndexMap<String, VersionBump>,
        dry_run: bool,
    ) -> Result<Vec<RangeUpdate>> {
        if bumps.is_empty() {
            return Ok(Vec::new());
        }

        let Some(mut manifest) = self.manifests.read(&package.path)? else {
            return Ok(Vec::new());
        };

        let updates = propagate_ranges(&mut manifest, bumps);
        if updates.is_empty() {
            return Ok(updates);
        }

        for update in &updates {
            info!(package = %package.display_name(), "{}", update);
        }

        if !dry_run {
            self.manifests.write(&package.path, &manifest)?;
        }
        Ok(updates)
    }
}
