//! Lockfile regeneration through `npm install --package-lock-only`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rollkit_core::error::{Error, Result};
use rollkit_core::lockfile::{KnownPackages, LockfileGenerator, LOCKFILE_NAME};
use rollkit_core::process::ProcessRunner;
use serde_json::Value;
use tracing::{info, warn};

use crate::process::SystemProcess;

pub struct NpmLockfile {
    process: Arc<dyn ProcessRunner>,
}

impl NpmLockfile {
    pub fn new() -> Self {
        Self::with_process(Arc::new(SystemProcess::new()))
    }

    pub fn with_process(process: Arc<dyn ProcessRunner>) -> Self {
        Self { process }
    }
}

impl Default for NpmLockfile {
    fn default() -> Self {
        Self::new()
    }
}

/// Local packages whose locked version differs from the workspace version.
pub fn stale_local_entries(lockfile: &Value, known: &KnownPackages) -> Vec<(String, String, String)> {
    let Some(entries) = lockfile.get("packages").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut stale: Vec<(String, String, String)> = entries
        .iter()
        .filter_map(|(key, entry)| {
            let name = key.rsplit_once("node_modules/").map(|(_, n)| n)?;
            let meta = known.get(name)?;
            let locked = entry.get("version").and_then(Value::as_str)?;
            (locked != meta.version).then(|| (name.to_string(), locked.to_string(), meta.version.clone()))
        })
        .collect();
    stale.sort();
    stale
}

impl LockfileGenerator for NpmLockfile {
    fn generate(&self, path: &Path, known: &KnownPackages) -> Result<()> {
        let args = vec![
            "install".to_string(),
            "--package-lock-only".to_string(),
            "--ignore-scripts".to_string(),
        ];
        let output = self.process.run("npm", &args, path)?;
        let lockfile_path = path.join(LOCKFILE_NAME);
        if !output.success {
            return Err(Error::Lockfile {
                path: lockfile_path,
                message: output.stderr.trim().to_string(),
            });
        }

        let content = fs::read_to_string(&lockfile_path)?;
        let lockfile: Value = serde_json::from_str(&content).map_err(|e| Error::Json {
            error: e,
            context: lockfile_path.display().to_string(),
        })?;

        for (name, locked, local) in stale_local_entries(&lockfile, known) {
            warn!(
                lockfile = %lockfile_path.display(),
                "{} is locked at {} but the local module is at {}",
                name,
                locked,
                local
            );
        }

        info!(path = %lockfile_path.display(), "lockfile generated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rollkit_core::lockfile::LocalPackageMeta;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_stale_local_entries() {
        let mut known = KnownPackages::new();
        known.insert(
            "@scope/a".to_string(),
            LocalPackageMeta {
                version: "1.2.0".to_string(),
                path: PathBuf::from("/ws/a"),
            },
        );
        known.insert(
            "b".to_string(),
            LocalPackageMeta {
                version: "2.0.0".to_string(),
                path: PathBuf::from("/ws/b"),
            },
        );

        let lockfile = json!({
            "packages": {
                "": {"name": "root"},
                "node_modules/@scope/a": {"version": "1.1.0"},
                "node_modules/b": {"version": "2.0.0"},
                "node_modules/left-pad": {"version": "1.3.0"}
            }
        });

        let stale = stale_local_entries(&lockfile, &known);
        assert_eq!(
            stale,
            vec![("@scope/a".to_string(), "1.1.0".to_string(), "1.2.0".to_string())]
        );
    }
}
