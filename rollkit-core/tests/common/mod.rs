#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use rollkit_core::error::Result;
use rollkit_core::manifest::ManifestStore;
use rollkit_core::process::{CommandOutput, ProcessRunner};
use rollkit_core::registry::{PackageInfo, Registry};
use rollkit_core::workspace::Workspace;
use semver::Version;
use serde_json::{json, Value};
use tempfile::TempDir;

/// A temporary workspace with `rollkit.toml` and packages under `packages/`.
pub struct TestWorkspace {
    pub dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Extra `[workspace]` keys are appended after `members`.
    pub fn with_config(extra: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config = format!("[workspace]\nmembers = [\"packages/*\"]\n{}\n", extra);
        fs::write(dir.path().join("rollkit.toml"), config).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `packages/<dir>/package.json` and returns the package directory.
    pub fn add_manifest(&self, dir: &str, manifest: Value) -> PathBuf {
        let package_dir = self.root().join("packages").join(dir);
        fs::create_dir_all(&package_dir).unwrap();
        fs::write(
            package_dir.join("package.json"),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
        package_dir
    }

    /// Adds a package named after its directory with production dependencies.
    pub fn add_package(&self, name: &str, version: &str, deps: &[(&str, &str)]) -> PathBuf {
        let deps: serde_json::Map<String, Value> = deps
            .iter()
            .map(|(n, r)| (n.to_string(), Value::String(r.to_string())))
            .collect();
        self.add_manifest(
            name,
            json!({
                "name": name,
                "version": version,
                "dependencies": deps,
            }),
        )
    }

    pub fn load(&self, manifests: &dyn ManifestStore) -> Workspace {
        Workspace::discover(self.root(), manifests).unwrap()
    }
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Moves a file's modification time forward so it reads as changed.
pub fn touch_later(path: &Path) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
}

pub fn read_manifest(dir: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(dir.join("package.json")).unwrap()).unwrap()
}

/// Registry kept in memory; records publish calls and the published versions.
#[derive(Default)]
pub struct FakeRegistry {
    pub packages: Mutex<HashMap<String, PackageInfo>>,
    pub published: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeRegistry {
    pub fn with_versions(self, name: &str, versions: &[&str]) -> Self {
        self.packages.lock().unwrap().insert(
            name.to_string(),
            PackageInfo {
                name: name.to_string(),
                versions: versions.iter().map(|v| Version::parse(v).unwrap()).collect(),
                ..Default::default()
            },
        );
        self
    }

    pub fn published_dirs(&self) -> Vec<(String, String)> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(path, tag)| {
                let dir = path.file_name().unwrap().to_string_lossy().into_owned();
                (dir, tag.clone())
            })
            .collect()
    }
}

impl Registry for FakeRegistry {
    fn view_package(&self, name: &str) -> Result<Option<PackageInfo>> {
        Ok(self.packages.lock().unwrap().get(name).cloned())
    }

    fn publish(&self, path: &Path, tag: &str, dry_run: bool) -> Result<()> {
        assert!(!dry_run, "engine publishes for real or not at all");
        self.published
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tag.to_string()));

        let manifest = read_manifest(path);
        let name = manifest["name"].as_str().unwrap().to_string();
        let version = Version::parse(manifest["version"].as_str().unwrap()).unwrap();
        let mut packages = self.packages.lock().unwrap();
        let info = packages.entry(name.clone()).or_insert_with(|| PackageInfo {
            name,
            ..Default::default()
        });
        info.versions.push(version);
        Ok(())
    }

    fn unpublish(&self, _name: &str, _version: &Version) -> Result<()> {
        Ok(())
    }
}

/// Records every command and fails in the configured directories.
#[derive(Default)]
pub struct FakeProcess {
    pub calls: Mutex<Vec<(String, String)>>,
    pub failing_dirs: HashSet<String>,
}

impl FakeProcess {
    pub fn failing_in(dirs: &[&str]) -> Self {
        Self {
            failing_dirs: dirs.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Recorded calls as `(directory name, command line)`.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessRunner for FakeProcess {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput> {
        let dir = cwd.file_name().unwrap().to_string_lossy().into_owned();
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push((dir.clone(), line.clone()));

        if self.failing_dirs.contains(&dir) {
            return Ok(CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: format!("{} failed\n", line),
            });
        }
        Ok(CommandOutput {
            success: true,
            stdout: format!("ran {} in {}\n", line, dir),
            stderr: String::new(),
        })
    }
}
