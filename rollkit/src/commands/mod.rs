//! Command implementations for the CLI.

mod execution;
mod info;
mod maintenance;
mod release;
mod release_reporter;
mod sync;

use std::path::Path;

use anyhow::{Context, Result};
use rollkit_core::{ManifestCache, ModuleStateStore, Workspace};
use tracing::debug;

pub use execution::{cmd_build, cmd_each};
pub use info::{cmd_list, cmd_tree};
pub use maintenance::cmd_clean;
pub use release::{cmd_publish, cmd_release};
pub use sync::cmd_sync;

/// Everything a command needs about the workspace it runs in.
struct Session {
    manifests: ManifestCache,
    workspace: Workspace,
}

impl Session {
    fn load(root: &Path) -> Result<Self> {
        let manifests = ManifestCache::new();
        let workspace = Workspace::discover(root, &manifests)
            .with_context(|| format!("Failed to load workspace from {}", root.display()))?;
        debug!(
            root = %workspace.root().display(),
            packages = workspace.packages().len(),
            "loaded workspace"
        );
        Ok(Self {
            manifests,
            workspace,
        })
    }

    /// State store at the configured directory, relative paths resolved against the workspace root.
    fn state_store(&self) -> ModuleStateStore {
        match &self.workspace.config().state_dir {
            Some(dir) if dir.is_absolute() => ModuleStateStore::new(dir.clone()),
            Some(dir) => ModuleStateStore::new(self.workspace.root().join(dir)),
            None => ModuleStateStore::with_default_dir(),
        }
    }
}
