//! Lockfile collaborator contract.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const LOCKFILE_NAME: &str = "package-lock.json";

/// Metadata about a local package that the registry may not know yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackageMeta {
    pub version: String,
    pub path: PathBuf,
}

/// Known local packages keyed by name.
pub type KnownPackages = HashMap<String, LocalPackageMeta>;

pub trait LockfileGenerator: Send + Sync {
    /// Regenerates the lockfile of the package in `path`.
    fn generate(&self, path: &Path, known: &KnownPackages) -> Result<()>;

    fn exists(&self, path: &Path) -> bool {
        path.join(LOCKFILE_NAME).is_file()
    }
}
