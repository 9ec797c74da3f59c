//! Package definitions and dependency edges.

use std::fmt;
use std::path::{Path, PathBuf};

use smallvec::SmallVec;

use crate::config::{PackageSettings, WorkspaceConfig};

/// Kind of a declared dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepKind {
    Production,
    Development,
    Peer,
}

impl DepKind {
    pub const ALL: [DepKind; 3] = [DepKind::Production, DepKind::Development, DepKind::Peer];

    /// Manifest field holding dependencies of this kind.
    pub fn manifest_field(&self) -> &'static str {
        match self {
            DepKind::Production => "dependencies",
            DepKind::Development => "devDependencies",
            DepKind::Peer => "peerDependencies",
        }
    }
}

impl fmt::Display for DepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepKind::Production => "prod",
            DepKind::Development => "dev",
            DepKind::Peer => "peer",
        };
        write!(f, "{}", s)
    }
}

/// A declared dependency of one package on another (possibly non-local) package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub name: String,
    pub range: String,
    pub kind: DepKind,
}

pub type DependencyEdges = SmallVec<[DependencyEdge; 4]>;

/// A locally checked-out package.
///
/// Identity is the absolute directory path. Mutable data (version,
/// dependency ranges) is always read through the manifest store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub path: PathBuf,
    pub name: Option<String>,
    pub use_npm: bool,
    pub build_triggers: Vec<String>,
    pub build_commands: Vec<String>,
    pub always_update_lockfile: bool,
    pub publish_if_source_not_changed: bool,
    pub release_branches: Vec<String>,
    pub npm_ignore: Option<PathBuf>,
}

impl Package {
    /// Creates a package with workspace defaults.
    pub fn new(path: impl Into<PathBuf>, name: Option<String>) -> Self {
        Self::with_settings(
            path,
            name,
            &PackageSettings::default(),
            &WorkspaceConfig::default(),
            Path::new(""),
        )
    }

    /// Merges per-package settings over workspace defaults.
    pub fn with_settings(
        path: impl Into<PathBuf>,
        name: Option<String>,
        settings: &PackageSettings,
        workspace: &WorkspaceConfig,
        workspace_root: &Path,
    ) -> Self {
        let path = path.into();
        let npm_ignore = settings
            .npm_ignore
            .as_ref()
            .map(|p| path.join(p))
            .or_else(|| {
                workspace
                    .default_npm_ignore
                    .as_ref()
                    .map(|p| workspace_root.join(p))
            });

        Self {
            name,
            use_npm: settings.use_npm.unwrap_or(workspace.default_use_npm),
            build_triggers: settings
                .build_triggers
                .clone()
                .unwrap_or_else(|| workspace.default_build_triggers.clone()),
            build_commands: settings
                .build_commands
                .clone()
                .unwrap_or_else(|| workspace.default_build_commands.clone()),
            always_update_lockfile: settings
                .always_update_lock_file
                .unwrap_or(workspace.always_update_lockfile),
            publish_if_source_not_changed: settings
                .publish_if_source_not_changed
                .unwrap_or(workspace.publish_if_source_not_changed),
            release_branches: settings
                .release_branches
                .clone()
                .unwrap_or_else(|| workspace.release_branches.clone()),
            npm_ignore,
            path,
        }
    }

    /// Packages without a declared name do not take part in walks.
    #[inline]
    pub fn is_participating(&self) -> bool {
        self.name.is_some()
    }

    /// Declared name, or the directory path for display.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
