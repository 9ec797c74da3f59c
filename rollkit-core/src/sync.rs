//! Development publishing: build what changed, then republish packages
//! whose published files changed under `-dev.N` versions.

use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use semver::{Prerelease, Version};
use tracing::{debug, info, warn};

use crate::build::BuildEngine;
use crate::context::VersionBump;
use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, GraphWalker, WalkAction};
use crate::manifest::{ManifestStore, MANIFEST_FILE_NAME};
use crate::package::Package;
use crate::process::ProcessRunner;
use crate::propagate::{RangePropagator, RangeUpdate};
use crate::registry::Registry;
use crate::state::ModuleStateStore;
use crate::subset::{PackListCache, PublishSubset, BUILD_TAG, PUBLISH_TAG};
use crate::version::select_publish_tag;
use crate::workspace::Workspace;

pub const SYNC_PRERELEASE: &str = "dev";

/// Next development version.
///
/// `1.2.3` becomes `1.2.4-dev.1` and `1.2.4-dev.1` becomes `1.2.4-dev.2`.
/// Any other prerelease starts a new development line on the next patch.
pub fn next_sync_version(current: &Version) -> Result<Version> {
    let mut next = Version::new(current.major, current.minor, current.patch);

    let ids: Vec<&str> = current.pre.as_str().split('.').collect();
    let counter = match ids.as_slice() {
        [SYNC_PRERELEASE, n] => n.parse::<u64>().ok(),
        _ => None,
    };
    let id = match counter {
        Some(n) => n + 1,
        None => {
            next.patch += 1;
            1
        }
    };

    next.pre = Prerelease::new(&format!("{}.{}", SYNC_PRERELEASE, id)).map_err(|e| Error::InvalidVersion {
        package: "sync version".to_string(),
        version: format!("{}-{}.{}", next, SYNC_PRERELEASE, id),
        message: e.to_string(),
    })?;
    Ok(next)
}

/// Why a package is published by a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishReason {
    /// Build inputs changed and the package was rebuilt.
    Built,
    /// Ranges of synced local dependencies were rewritten.
    DependenciesUpdated,
    /// Files that ship with the package changed since the last publish.
    PublishedFilesChanged,
    /// The declared version is not on the registry yet.
    VersionUnpublished,
}

impl fmt::Display for PublishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PublishReason::Built => "rebuilt",
            PublishReason::DependenciesUpdated => "dependency ranges updated",
            PublishReason::PublishedFilesChanged => "published files changed",
            PublishReason::VersionUnpublished => "current version is not on the registry",
        };
        write!(f, "{}", s)
    }
}

/// What a sync did with one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub package: String,
    pub current: Version,
    pub range_updates: Vec<RangeUpdate>,
    pub reason: Option<PublishReason>,
    /// Version published, or that a dry run would publish.
    pub version: Option<Version>,
    pub tag: Option<String>,
}

impl SyncOutcome {
    pub fn published(&self) -> bool {
        self.version.is_some()
    }
}

/// A dependent's range rewritten after a single-package sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentUpdate {
    pub package: String,
    pub update: RangeUpdate,
}

/// Builds and republishes changed packages.
pub struct SyncEngine<'a> {
    workspace: &'a Workspace,
    manifests: &'a dyn ManifestStore,
    states: &'a ModuleStateStore,
    registry: &'a dyn Registry,
    builder: BuildEngine<'a>,
    pack_lists: PackListCache,
    dry_run: bool,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        workspace: &'a Workspace,
        manifests: &'a dyn ManifestStore,
        states: &'a ModuleStateStore,
        registry: &'a dyn Registry,
        process: &'a dyn ProcessRunner,
        dry_run: bool,
    ) -> Self {
        Self {
            workspace,
            manifests,
            states,
            registry,
            builder: BuildEngine::new(workspace, manifests, states, process),
            pack_lists: PackListCache::new(),
            dry_run,
        }
    }

    /// Syncs every managed package in dependency order.
    ///
    /// Each package first takes the versions its local dependencies were
    /// just published under, then is published if anything changed.
    pub fn sync_all(&self) -> Result<Vec<SyncOutcome>> {
        let mut synced: IndexMap<String, VersionBump> = IndexMap::new();
        let mut outcomes = Vec::new();

        GraphWalker::new(self.workspace, self.manifests).walk(|package| {
            if !package.use_npm {
                debug!(package = %package.display_name(), "not managed by the package manager");
                return Ok(WalkAction::Continue);
            }

            let range_updates = RangePropagator::new(self.manifests).propagate(package, &synced, self.dry_run)?;
            let outcome = self.sync_package(package, range_updates)?;
            if let Some(version) = &outcome.version {
                synced.insert(
                    outcome.package.clone(),
                    VersionBump {
                        from: outcome.current.clone(),
                        to: version.clone(),
                    },
                );
            }
            outcomes.push(outcome);
            Ok(WalkAction::Continue)
        })?;

        Ok(outcomes)
    }

    /// Syncs one package, then points its direct dependents at the new version.
    ///
    /// # Errors
    ///
    /// Fails with `Error::Release` if the package is not managed by the
    /// package manager.
    pub fn sync(&self, package: &Package) -> Result<(SyncOutcome, Vec<DependentUpdate>)> {
        if !package.use_npm {
            return Err(Error::Release(format!(
                "cannot sync {}: not managed by the package manager",
                package.display_name()
            )));
        }

        let outcome = self.sync_package(package, Vec::new())?;
        let Some(version) = &outcome.version else {
            return Ok((outcome, Vec::new()));
        };

        let mut bumps = IndexMap::new();
        bumps.insert(
            outcome.package.clone(),
            VersionBump {
                from: outcome.current.clone(),
                to: version.clone(),
            },
        );

        let graph = DependencyGraph::build(self.workspace, self.manifests)?;
        let propagator = RangePropagator::new(self.manifests);
        let mut dependents = Vec::new();
        for name in graph.dependents(&outcome.package)? {
            let dependent = self.workspace.package_checked(&name)?;
            for update in propagator.propagate(dependent, &bumps, self.dry_run)? {
                dependents.push(DependentUpdate {
                    package: name.clone(),
                    update,
                });
            }
        }

        Ok((outcome, dependents))
    }

    fn declared(&self, package: &Package) -> Result<(String, Version)> {
        let manifest = self.manifests.read_required(&package.path)?;
        let invalid = |message: &str| Error::InvalidManifest {
            path: package.path.join(MANIFEST_FILE_NAME),
            message: message.to_string(),
        };
        let name = manifest.name().ok_or_else(|| invalid("missing \"name\""))?;
        let version = manifest.version().ok_or_else(|| invalid("missing \"version\""))?;
        let parsed = Version::parse(version).map_err(|e| Error::InvalidVersion {
            package: name.to_string(),
            version: version.to_string(),
            message: e.to_string(),
        })?;
        Ok((name.to_string(), parsed))
    }

    fn sync_package(&self, package: &Package, range_updates: Vec<RangeUpdate>) -> Result<SyncOutcome> {
        let (name, current) = self.declared(package)?;
        let reason = self.publish_reason(package, &name, &current, !range_updates.is_empty())?;

        let (version, tag) = match reason {
            Some(reason) => {
                info!(package = %name, "publishing: {}", reason);
                let (version, tag) = self.publish(package, &name, &current)?;
                (Some(version), Some(tag))
            }
            None => {
                debug!(package = %name, "nothing to publish");
                (None, None)
            }
        };

        Ok(SyncOutcome {
            package: name,
            current,
            range_updates,
            reason,
            version,
            tag,
        })
    }

    /// First reason to publish, building the package on the way if needed.
    fn publish_reason(
        &self,
        package: &Package,
        name: &str,
        current: &Version,
        ranges_changed: bool,
    ) -> Result<Option<PublishReason>> {
        let built = if self.dry_run {
            self.builder.needs_build(package)?
        } else {
            self.builder.build_if_changed(package)?
        };
        if built {
            return Ok(Some(PublishReason::Built));
        }
        if ranges_changed {
            return Ok(Some(PublishReason::DependenciesUpdated));
        }

        let subset = PublishSubset::new(package, self.manifests, &self.pack_lists)?;
        if self.states.has_subset_changed(package, &subset)? {
            return Ok(Some(PublishReason::PublishedFilesChanged));
        }

        if !self.registry.is_published(name, current)? {
            return Ok(Some(PublishReason::VersionUnpublished));
        }
        Ok(None)
    }

    /// Publishes the package, moving to the next development version when
    /// the declared one is already on the registry.
    fn publish(&self, package: &Package, name: &str, current: &Version) -> Result<(Version, String)> {
        let info = self.registry.view_package(name)?;
        let version = match &info {
            Some(info) if info.has_version(current) => next_sync_version(current)?,
            Some(_) => {
                info!(package = name, "version {} is not yet on the registry", current);
                current.clone()
            }
            None => {
                info!(package = name, "not yet on the registry");
                current.clone()
            }
        };
        let tag = select_publish_tag(info.as_ref().map(|i| i.versions.as_slice()), &version);
        let version_changed = &version != current;

        if self.dry_run {
            return Ok((version, tag));
        }

        if version_changed {
            let mut manifest = self.manifests.read_required(&package.path)?;
            manifest.set_version(&version.to_string());
            self.manifests.write(&package.path, &manifest)?;
        }

        self.publish_with_outside_ignore(package, &tag)?;

        self.states
            .save(package, PUBLISH_TAG, &self.states.actual_state(package)?)?;
        if version_changed {
            self.states
                .update_file_state(package, BUILD_TAG, Path::new(MANIFEST_FILE_NAME))?;
        }

        Ok((version, tag))
    }

    /// Publishes with the package's outside ignore file placed as `.npmignore`
    /// for the duration of the publish.
    fn publish_with_outside_ignore(&self, package: &Package, tag: &str) -> Result<()> {
        let inside = package.path.join(".npmignore");
        let copied = match &package.npm_ignore {
            Some(outside) if outside.is_file() && *outside != inside && !inside.exists() => {
                fs::copy(outside, &inside)?;
                true
            }
            _ => false,
        };

        let result = self.registry.publish(&package.path, tag, false);

        if copied {
            if let Err(e) = fs::remove_file(&inside) {
                warn!(path = %inside.display(), "failed to remove copied ignore file: {}", e);
            }
        }
        result
    }
}
