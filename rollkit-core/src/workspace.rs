//! Workspace discovery: locating `rollkit.toml` and the packages it declares.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{Config, WorkspaceConfig};
use crate::error::{Error, Result};
use crate::manifest::{ManifestCache, ManifestStore};
use crate::package::{DependencyEdge, Package};
use crate::subset::is_known_ignored_dir;

/// A direct dependency that resolves to a package of this workspace.
#[derive(Debug, Clone)]
pub struct LocalDependency<'a> {
    pub edge: DependencyEdge,
    pub package: &'a Package,
}

/// The immutable set of packages for one run.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: WorkspaceConfig,
    packages: Vec<Package>,
}

impl Workspace {
    /// Finds `rollkit.toml` at or above `start` and loads every member package.
    ///
    /// # Errors
    ///
    /// Returns an error if no config is found, the config is invalid, or a
    /// member manifest cannot be parsed.
    pub fn discover(start: &Path, manifests: &dyn ManifestStore) -> Result<Self> {
        let start = start.canonicalize()?;
        let config_path =
            Config::find(&start).ok_or_else(|| Error::ConfigNotFound(start.clone()))?;
        let config = Config::load(&config_path)?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| start.clone());

        Self::load(root, config.workspace, manifests)
    }

    /// Loads packages for an already-parsed workspace config.
    pub fn load(root: PathBuf, config: WorkspaceConfig, manifests: &dyn ManifestStore) -> Result<Self> {
        let dirs = expand_members(&root, &config.members)?;
        let mut packages = Vec::with_capacity(dirs.len());

        for dir in dirs {
            let Some(manifest) = manifests.read(&dir)? else {
                continue;
            };
            let settings = manifest.settings(&ManifestCache::manifest_path(&dir))?;
            let name = manifest.name().map(|n| n.to_string());
            debug!(path = %dir.display(), name = ?name, "discovered package");
            packages.push(Package::with_settings(dir, name, &settings, &config, &root));
        }

        Ok(Self {
            root,
            config,
            packages,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// All discovered packages in declaration order.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Packages that declare a name.
    pub fn participating(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter().filter(|p| p.is_participating())
    }

    pub fn package_by_name(&self, name: &str) -> Option<&Package> {
        self.packages
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
    }

    /// Looks a package up by name, failing with the list of known names.
    pub fn package_checked(&self, name: &str) -> Result<&Package> {
        self.package_by_name(name)
            .ok_or_else(|| Error::PackageNotFound {
                name: name.to_string(),
                available: self
                    .participating()
                    .filter_map(|p| p.name.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Direct dependencies of `package` that resolve to local packages.
    ///
    /// Edges to packages outside the workspace are dropped.
    pub fn direct_local_deps<'a>(
        &'a self,
        package: &Package,
        manifests: &dyn ManifestStore,
    ) -> Result<Vec<LocalDependency<'a>>> {
        let Some(manifest) = manifests.read(&package.path)? else {
            return Ok(Vec::new());
        };

        Ok(manifest
            .dependency_edges()
            .into_iter()
            .filter_map(|edge| {
                self.package_by_name(&edge.name)
                    .map(|local| LocalDependency {
                        edge,
                        package: local,
                    })
            })
            .collect())
    }
}

/// Expands member patterns to package directories, keeping pattern order.
fn expand_members(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for pattern in patterns {
        let trimmed = pattern.trim_end_matches('/');
        let matcher = GlobBuilder::new(trimmed)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::InvalidConfig {
                context: "workspace.members".to_string(),
                message: format!("invalid pattern '{}': {}", pattern, e),
            })?
            .compile_matcher();

        let mut matched = Vec::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && is_known_ignored_dir(e.file_name())));

        for entry in walker {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if matcher.is_match(relative) && entry.path().join("package.json").is_file() {
                matched.push(entry.path().to_path_buf());
            }
        }

        matched.sort();
        for dir in matched {
            if seen.insert(dir.clone()) {
                result.push(dir);
            }
        }
    }

    Ok(result)
}
