//! Cached access to package manifests (`package.json`).

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::PackageSettings;
use crate::error::{Error, Result};
use crate::package::{DepKind, DependencyEdge, DependencyEdges};

pub const MANIFEST_FILE_NAME: &str = "package.json";

const SETTINGS_KEY: &str = "rollkit";

/// A parsed package manifest. Key order is preserved across rewrites.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    data: Map<String, Value>,
}

impl Manifest {
    /// Parses manifest text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).map_err(|error| Error::Json {
            error,
            context: path.display().to_string(),
        })?;

        match value {
            Value::Object(data) => Ok(Self { data }),
            _ => Err(Error::InvalidManifest {
                path: path.to_path_buf(),
                message: "manifest must be a JSON object".to_string(),
            }),
        }
    }

    pub fn from_value(data: Map<String, Value>) -> Self {
        Self { data }
    }

    pub fn as_value(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.data.get("version").and_then(Value::as_str)
    }

    pub fn set_version(&mut self, version: &str) {
        self.data
            .insert("version".to_string(), Value::String(version.to_string()));
    }

    /// Declared dependencies of one kind, in manifest order.
    pub fn dependencies(&self, kind: DepKind) -> Vec<(String, String)> {
        self.data
            .get(kind.manifest_field())
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(name, range)| {
                        range.as_str().map(|r| (name.clone(), r.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every declared dependency edge across all kinds.
    pub fn dependency_edges(&self) -> DependencyEdges {
        DepKind::ALL
            .iter()
            .flat_map(|kind| {
                self.dependencies(*kind)
                    .into_iter()
                    .map(move |(name, range)| DependencyEdge {
                        name,
                        range,
                        kind: *kind,
                    })
            })
            .collect()
    }

    pub fn dependency_range(&self, kind: DepKind, name: &str) -> Option<&str> {
        self.data
            .get(kind.manifest_field())
            .and_then(Value::as_object)
            .and_then(|deps| deps.get(name))
            .and_then(Value::as_str)
    }

    /// Replaces an existing dependency range. Returns `false` if the dependency is not declared.
    pub fn set_dependency_range(&mut self, kind: DepKind, name: &str, range: &str) -> bool {
        match self
            .data
            .get_mut(kind.manifest_field())
            .and_then(Value::as_object_mut)
            .and_then(|deps| deps.get_mut(name))
        {
            Some(slot) => {
                *slot = Value::String(range.to_string());
                true
            }
            None => false,
        }
    }

    pub fn has_script(&self, script: &str) -> bool {
        self.data
            .get("scripts")
            .and_then(Value::as_object)
            .is_some_and(|scripts| scripts.contains_key(script))
    }

    /// Entries of the `files` array, if declared.
    pub fn files(&self) -> Option<Vec<String>> {
        self.data.get("files").and_then(Value::as_array).map(|files| {
            files
                .iter()
                .filter_map(|f| f.as_str().map(|s| s.to_string()))
                .collect()
        })
    }

    /// Looks up a dotted property path such as `config.lockfile`.
    pub fn property(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let first = parts.next()?;
        let mut current = self.data.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// JS-like truthiness of a dotted property.
    pub fn is_property_truthy(&self, dotted: &str) -> bool {
        match self.property(dotted) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        }
    }

    /// Validated `"rollkit"` settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidManifest` when the settings are malformed.
    pub fn settings(&self, manifest_path: &Path) -> Result<PackageSettings> {
        PackageSettings::from_value(manifest_path, self.data.get(SETTINGS_KEY))
    }

    /// Two-space indented JSON with a trailing newline.
    pub fn to_pretty_string(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(&self.data).map_err(|error| Error::Json {
            error,
            context: "manifest serialization".to_string(),
        })?;
        text.push('\n');
        Ok(text)
    }
}

/// Read/write access to manifests with an invalidatable read cache.
pub trait ManifestStore: Send + Sync {
    /// Reads the manifest in `dir`; `None` if the directory has no manifest.
    fn read(&self, dir: &Path) -> Result<Option<Manifest>>;

    /// Writes the manifest in `dir` and invalidates the cached copy.
    fn write(&self, dir: &Path, manifest: &Manifest) -> Result<()>;

    fn invalidate(&self, dir: &Path);

    /// Like `read`, but a missing manifest is an error.
    fn read_required(&self, dir: &Path) -> Result<Manifest> {
        self.read(dir)?
            .ok_or_else(|| Error::ManifestNotFound(dir.join(MANIFEST_FILE_NAME)))
    }
}

/// Filesystem manifest store with an in-process cache keyed by directory.
#[derive(Debug, Default)]
pub struct ManifestCache {
    entries: Mutex<HashMap<PathBuf, Option<Manifest>>>,
}

impl ManifestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest_path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE_NAME)
    }

    fn load(dir: &Path) -> Result<Option<Manifest>> {
        let path = Self::manifest_path(dir);
        match fs::read_to_string(&path) {
            Ok(content) => Manifest::parse(&path, &content).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

impl ManifestStore for ManifestCache {
    fn read(&self, dir: &Path) -> Result<Option<Manifest>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| Error::MutexLock(format!("manifest cache: {}", e)))?;

        if let Some(cached) = entries.get(dir) {
            return Ok(cached.clone());
        }

        let loaded = Self::load(dir)?;
        debug!(dir = %dir.display(), found = loaded.is_some(), "loaded manifest");
        entries.insert(dir.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    fn write(&self, dir: &Path, manifest: &Manifest) -> Result<()> {
        let text = manifest.to_pretty_string()?;
        fs::write(Self::manifest_path(dir), text)?;
        self.invalidate(dir);
        Ok(())
    }

    fn invalidate(&self, dir: &Path) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(dir);
        }
    }
}
