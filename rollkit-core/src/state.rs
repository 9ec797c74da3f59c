//! Persisted per-package, per-subset file snapshots for dirty checking.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::package::Package;
use crate::subset::{modification_marker, walk_files, Subset};

const STATE_DIR_NAME: &str = ".rollkit-state";

/// Default location of the state directory.
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|d| d.join(STATE_DIR_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join(STATE_DIR_NAME))
}

/// Map of `/`-separated relative path to modification marker.
pub type FileMarkers = BTreeMap<String, u64>;

/// Files of one package with their modification markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub package_path: PathBuf,
    pub timestamp: u64,
    pub files: FileMarkers,
}

impl Snapshot {
    /// Entries whose absolute path the subset includes.
    pub fn filtered(&self, subset: &dyn Subset) -> FileMarkers {
        self.files
            .iter()
            .filter(|(relative, _)| subset.is_included(&self.package_path.join(relative)))
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Decides whether `actual` differs from `saved`.
///
/// A count mismatch, a missing file, or a newer marker means changed.
pub fn markers_changed(actual: &FileMarkers, saved: &FileMarkers) -> bool {
    if actual.len() != saved.len() {
        return true;
    }

    saved.iter().any(|(file, saved_marker)| match actual.get(file) {
        None => true,
        Some(actual_marker) => actual_marker > saved_marker,
    })
}

/// Loads, saves and compares module snapshots.
///
/// Saved snapshots are memoized per (package, tag) for the lifetime of the store.
pub struct ModuleStateStore {
    state_dir: PathBuf,
    saved: Mutex<HashMap<(PathBuf, String), Option<Snapshot>>>,
}

impl ModuleStateStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            saved: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_dir() -> Self {
        Self::new(default_state_dir())
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Path of the state file for a (package, tag) pair.
    pub fn state_file(&self, package: &Package, tag: &str) -> PathBuf {
        let digest = Sha256::digest(package.path.to_string_lossy().as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        self.state_dir.join(format!("state-{}-{}.json", tag, hex))
    }

    /// Scans every file of the package once, unfiltered.
    pub fn actual_state(&self, package: &Package) -> Result<Snapshot> {
        let mut files = FileMarkers::new();
        walk_files(&package.path, &mut |path, marker| {
            if let Some(key) = relative_key(&package.path, path) {
                files.insert(key, marker);
            }
        })?;

        Ok(Snapshot {
            package_path: package.path.clone(),
            timestamp: now_millis(),
            files,
        })
    }

    /// Last persisted snapshot for `tag`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// A state file that exists but cannot be parsed is `Error::CorruptState`.
    pub fn saved_state(&self, package: &Package, tag: &str) -> Result<Option<Snapshot>> {
        let key = (package.path.clone(), tag.to_string());
        {
            let saved = self.lock()?;
            if let Some(cached) = saved.get(&key) {
                return Ok(cached.clone());
            }
        }

        let path = self.state_file(package, tag);
        let loaded = match fs::read_to_string(&path) {
            Ok(content) => Some(serde_json::from_str::<Snapshot>(&content).map_err(|e| {
                Error::CorruptState {
                    path: path.clone(),
                    message: e.to_string(),
                }
            })?),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(Error::CorruptState {
                    path,
                    message: e.to_string(),
                })
            }
        };

        self.lock()?.insert(key, loaded.clone());
        Ok(loaded)
    }

    /// Persists a snapshot and refreshes the in-process copy.
    pub fn save(&self, package: &Package, tag: &str, snapshot: &Snapshot) -> Result<()> {
        fs::create_dir_all(&self.state_dir)?;
        let path = self.state_file(package, tag);
        let content = serde_json::to_string(snapshot).map_err(|error| Error::Json {
            error,
            context: path.display().to_string(),
        })?;
        fs::write(&path, content)?;
        debug!(package = %package.display_name(), tag, files = snapshot.files.len(), "saved module state");

        self.lock()?.insert(
            (package.path.clone(), tag.to_string()),
            Some(snapshot.clone()),
        );
        Ok(())
    }

    /// Whether the subset changed since the last save, scanning the package.
    pub fn has_subset_changed(&self, package: &Package, subset: &dyn Subset) -> Result<bool> {
        let actual = self.actual_state(package)?;
        self.has_subset_changed_against(package, subset, &actual)
    }

    /// Like `has_subset_changed`, reusing an existing scan.
    pub fn has_subset_changed_against(
        &self,
        package: &Package,
        subset: &dyn Subset,
        actual: &Snapshot,
    ) -> Result<bool> {
        let Some(saved) = self.saved_state(package, subset.tag())? else {
            debug!(package = %package.display_name(), tag = subset.tag(), "no saved state");
            return Ok(true);
        };

        let changed = markers_changed(&actual.filtered(subset), &saved.filtered(subset));
        debug!(package = %package.display_name(), tag = subset.tag(), changed, "compared module state");
        Ok(changed)
    }

    /// Refreshes one file's marker in the saved snapshot.
    ///
    /// Used after a tool rewrites a tracked file so the rewrite is not
    /// reported as a change. Does nothing without a saved snapshot.
    pub fn update_file_state(&self, package: &Package, tag: &str, file: &Path) -> Result<()> {
        let Some(mut snapshot) = self.saved_state(package, tag)? else {
            return Ok(());
        };

        let absolute = package.path.join(file);
        let Some(key) = relative_key(&package.path, &absolute) else {
            return Ok(());
        };

        match fs::metadata(&absolute) {
            Ok(metadata) => {
                snapshot.files.insert(key, modification_marker(&metadata));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                snapshot.files.remove(&key);
            }
            Err(e) => return Err(Error::Io(e)),
        }

        self.save(package, tag, &snapshot)
    }

    /// Deletes every persisted snapshot.
    pub fn clear_saved_state(&self) -> Result<()> {
        if self.state_dir.exists() {
            fs::remove_dir_all(&self.state_dir)?;
        }
        self.lock()?.clear();
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(PathBuf, String), Option<Snapshot>>>> {
        self.saved
            .lock()
            .map_err(|e| Error::MutexLock(format!("module state cache: {}", e)))
    }
}
