//! Named file-inclusion predicates over a package's files.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::manifest::ManifestStore;
use crate::package::Package;

/// Directories pruned from every scan before any predicate runs.
pub const KNOWN_IGNORED_DIRS: &[&str] = &["node_modules", ".git", ".idea", ".hg", ".svn", ".vscode"];

pub const SOURCES_TAG: &str = "sources";
pub const BUILD_TAG: &str = "build";
pub const PUBLISH_TAG: &str = "publish";

const IGNORE_FILES: &[&str] = &[".npmignore", ".gitignore"];

#[inline]
pub fn is_known_ignored_dir(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|n| KNOWN_IGNORED_DIRS.contains(&n))
}

/// Milliseconds since the epoch of the last modification.
pub fn modification_marker(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Walks every regular file under `root`, pruning known noise directories.
pub fn walk_files(root: &Path, callback: &mut dyn FnMut(&Path, u64)) -> Result<()> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_known_ignored_dir(e.file_name())));

    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| Error::Io(e.into()))?;
        callback(entry.path(), modification_marker(&metadata));
    }

    Ok(())
}

fn path_glob(pattern: &str) -> std::result::Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// A named predicate selecting the files relevant to one decision.
pub trait Subset: Send + Sync {
    /// Stable key used for state files.
    fn tag(&self) -> &str;

    /// Whether an absolute file path belongs to this subset.
    fn is_included(&self, path: &Path) -> bool;

    /// Root directory the subset applies to.
    fn root(&self) -> &Path;

    /// Walks the package and reports only included files.
    fn walk(&self, callback: &mut dyn FnMut(&Path, u64)) -> Result<()> {
        walk_files(self.root(), &mut |path, marker| {
            if self.is_included(path) {
                callback(path, marker);
            }
        })
    }
}

/// Every file of the package.
pub struct AllFilesSubset {
    root: PathBuf,
}

impl AllFilesSubset {
    pub fn new(package: &Package) -> Self {
        Self {
            root: package.path.clone(),
        }
    }
}

impl Subset for AllFilesSubset {
    fn tag(&self) -> &str {
        SOURCES_TAG
    }

    fn is_included(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// Files matching the package's build triggers.
///
/// A pattern without `/` matches against the file name anywhere in the
/// tree; other patterns match the path relative to the package root,
/// where `*` stops at a path separator.
pub struct BuildSubset {
    root: PathBuf,
    base_names: GlobSet,
    relative: GlobSet,
}

impl BuildSubset {
    /// # Errors
    ///
    /// Returns `Error::InvalidManifest` if a trigger is not a valid glob.
    pub fn new(package: &Package) -> Result<Self> {
        let mut base_names = GlobSetBuilder::new();
        let mut relative = GlobSetBuilder::new();

        for trigger in &package.build_triggers {
            let pattern = trigger.trim_start_matches("./");
            let glob = path_glob(pattern).map_err(|e| Error::InvalidManifest {
                path: package.path.clone(),
                message: format!("invalid build trigger '{}': {}", trigger, e),
            })?;
            if pattern.contains('/') {
                relative.add(glob);
            } else {
                base_names.add(glob);
            }
        }

        let build = |builder: GlobSetBuilder| {
            builder.build().map_err(|e| Error::InvalidManifest {
                path: package.path.clone(),
                message: format!("invalid build triggers: {}", e),
            })
        };

        Ok(Self {
            root: package.path.clone(),
            base_names: build(base_names)?,
            relative: build(relative)?,
        })
    }
}

impl Subset for BuildSubset {
    fn tag(&self) -> &str {
        BUILD_TAG
    }

    fn is_included(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if self.relative.is_match(relative) {
            return true;
        }
        relative
            .file_name()
            .is_some_and(|name| self.base_names.is_match(Path::new(name)))
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// Run-scoped cache of pack lists keyed by package root.
#[derive(Debug, Default)]
pub struct PackListCache {
    entries: Mutex<HashMap<PathBuf, Arc<HashSet<PathBuf>>>>,
}

impl PackListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative paths the packaging step would ship for `root`.
    pub fn pack_list(&self, root: &Path, files: Option<&[String]>) -> Result<Arc<HashSet<PathBuf>>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| Error::MutexLock(format!("pack list cache: {}", e)))?;

        if let Some(list) = entries.get(root) {
            return Ok(Arc::clone(list));
        }

        let list = Arc::new(compute_pack_list(root, files)?);
        debug!(root = %root.display(), files = list.len(), "computed pack list");
        entries.insert(root.to_path_buf(), Arc::clone(&list));
        Ok(list)
    }
}

fn is_always_packed(relative: &Path) -> bool {
    if relative.components().count() != 1 {
        return false;
    }
    let name = relative
        .to_string_lossy()
        .to_ascii_lowercase();
    name == "package.json"
        || name.starts_with("readme")
        || name.starts_with("license")
        || name.starts_with("licence")
        || name.starts_with("changelog")
}

fn is_never_packed(relative: &Path) -> bool {
    let Some(name) = relative.file_name().and_then(OsStr::to_str) else {
        return true;
    };
    matches!(
        name,
        ".npmrc"
            | ".DS_Store"
            | "npm-debug.log"
            | "package-lock.json"
            | "yarn.lock"
            | "pnpm-lock.yaml"
            | ".npmignore"
            | ".gitignore"
    ) || name.ends_with(".orig")
        || name.starts_with("._")
        || (name.starts_with(".") && name.ends_with(".swp"))
}

fn files_matcher(root: &Path, files: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for entry in files {
        let entry = entry.trim_start_matches("./").trim_end_matches('/');
        for pattern in [entry.to_string(), format!("{}/**", entry)] {
            let glob = path_glob(&pattern).map_err(|e| Error::InvalidManifest {
                path: root.to_path_buf(),
                message: format!("invalid \"files\" entry '{}': {}", entry, e),
            })?;
            builder.add(glob);
        }
    }
    builder.build().map_err(|e| Error::InvalidManifest {
        path: root.to_path_buf(),
        message: format!("invalid \"files\" list: {}", e),
    })
}

fn root_ignore_rules(root: &Path) -> Option<Gitignore> {
    let file = IGNORE_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())?;
    build_ignore(root, &file)
}

fn build_ignore(root: &Path, file: &Path) -> Option<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    if let Some(err) = builder.add(file) {
        warn!(file = %file.display(), "failed to read ignore file: {}", err);
        return None;
    }
    match builder.build() {
        Ok(gi) => Some(gi),
        Err(e) => {
            warn!(file = %file.display(), "invalid ignore file: {}", e);
            None
        }
    }
}

fn compute_pack_list(root: &Path, files: Option<&[String]>) -> Result<HashSet<PathBuf>> {
    let allow = files.map(|f| files_matcher(root, f)).transpose()?;
    let ignore = if allow.is_none() {
        root_ignore_rules(root)
    } else {
        None
    };

    let mut result = HashSet::new();
    walk_files(root, &mut |path, _| {
        let Ok(relative) = path.strip_prefix(root) else {
            return;
        };

        let included = if is_always_packed(relative) {
            true
        } else if is_never_packed(relative) {
            false
        } else if let Some(allow) = &allow {
            allow.is_match(relative)
        } else if let Some(ignore) = &ignore {
            !ignore.matched_path_or_any_parents(path, false).is_ignore()
        } else {
            true
        };

        if included {
            result.insert(relative.to_path_buf());
        }
    })?;

    Ok(result)
}

/// Files that the packaging step would actually ship, plus the ignore files
/// that decide what ships.
pub struct PublishSubset {
    root: PathBuf,
    pack_list: Arc<HashSet<PathBuf>>,
    custom_ignore: Option<Gitignore>,
}

impl PublishSubset {
    /// # Errors
    ///
    /// Returns an error if the manifest or pack list cannot be read.
    pub fn new(package: &Package, manifests: &dyn ManifestStore, cache: &PackListCache) -> Result<Self> {
        let files = manifests.read(&package.path)?.and_then(|m| m.files());
        let pack_list = cache.pack_list(&package.path, files.as_deref())?;
        let custom_ignore = package
            .npm_ignore
            .as_ref()
            .filter(|p| p.is_file())
            .and_then(|p| build_ignore(&package.path, p));

        Ok(Self {
            root: package.path.clone(),
            pack_list,
            custom_ignore,
        })
    }
}

impl Subset for PublishSubset {
    fn tag(&self) -> &str {
        PUBLISH_TAG
    }

    fn is_included(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };

        if relative.components().count() == 1
            && relative
                .to_str()
                .is_some_and(|name| IGNORE_FILES.contains(&name))
        {
            return true;
        }

        if !self.pack_list.contains(relative) {
            return false;
        }

        match &self.custom_ignore {
            Some(ignore) => !ignore.matched_path_or_any_parents(path, false).is_ignore(),
            None => true,
        }
    }

    fn root(&self) -> &Path {
        &self.root
    }
}
