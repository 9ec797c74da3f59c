//! npm registry access through the npm CLI.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rollkit_core::error::{Error, Result};
use rollkit_core::process::ProcessRunner;
use rollkit_core::registry::{PackageInfo, Registry};
use semver::Version;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::process::{run_checked, SystemProcess};

const NOT_FOUND_CODE: &str = "E404";

/// Registry backed by `npm view`, `npm publish` and `npm unpublish`.
pub struct NpmRegistry {
    process: Arc<dyn ProcessRunner>,
    cwd: PathBuf,
}

impl NpmRegistry {
    /// Runs npm from `cwd` so that its `.npmrc` applies.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self::with_process(cwd, Arc::new(SystemProcess::new()))
    }

    pub fn with_process(cwd: impl Into<PathBuf>, process: Arc<dyn ProcessRunner>) -> Self {
        Self {
            process,
            cwd: cwd.into(),
        }
    }
}

/// Parses `npm view --json` output. `Ok(None)` means the package is unknown.
pub fn parse_view_output(name: &str, output: &str) -> Result<Option<PackageInfo>> {
    let value: Value = serde_json::from_str(output).map_err(|e| Error::Json {
        error: e,
        context: format!("npm view {}", name),
    })?;

    if let Some(error) = value.get("error") {
        if error.get("code").and_then(Value::as_str) == Some(NOT_FOUND_CODE) {
            return Ok(None);
        }
        let summary = error
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or("unknown registry error");
        return Err(Error::Registry {
            package: name.to_string(),
            message: format!("failed to get package information: {}", summary),
        });
    }

    let raw_versions: Vec<&str> = match value.get("versions") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(single)) => vec![single.as_str()],
        _ => {
            return Err(Error::Registry {
                package: name.to_string(),
                message: "no versions found".to_string(),
            })
        }
    };

    let versions = raw_versions
        .into_iter()
        .filter_map(|v| match Version::parse(v) {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(package = name, version = v, "ignoring unparseable published version: {}", e);
                None
            }
        })
        .collect();

    let dist_tags: BTreeMap<String, String> = value
        .get("dist-tags")
        .and_then(Value::as_object)
        .map(|tags| {
            tags.iter()
                .filter_map(|(tag, v)| v.as_str().map(|v| (tag.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let tarball = value
        .get("dist")
        .and_then(|d| d.get("tarball"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Some(PackageInfo {
        name: value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string(),
        versions,
        dist_tags,
        tarball,
    }))
}

impl Registry for NpmRegistry {
    fn view_package(&self, name: &str) -> Result<Option<PackageInfo>> {
        let args = vec!["view".to_string(), name.to_string(), "--json".to_string()];
        let output = self.process.run("npm", &args, &self.cwd)?;

        let body = if output.stdout.trim().is_empty() {
            output.stderr.as_str()
        } else {
            output.stdout.as_str()
        };
        if body.trim().is_empty() {
            return Err(Error::Registry {
                package: name.to_string(),
                message: "npm view produced no output".to_string(),
            });
        }

        let info = parse_view_output(name, body)?;
        debug!(package = name, published = info.is_some(), "viewed package");
        Ok(info)
    }

    fn publish(&self, path: &Path, tag: &str, dry_run: bool) -> Result<()> {
        let mut args = vec!["publish".to_string(), "--tag".to_string(), tag.to_string()];
        if dry_run {
            args.push("--dry-run".to_string());
        }
        run_checked(self.process.as_ref(), "npm", &args, path).map_err(|e| Error::Registry {
            package: path.display().to_string(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), tag, "published");
        Ok(())
    }

    fn unpublish(&self, name: &str, version: &Version) -> Result<()> {
        let args = vec!["unpublish".to_string(), format!("{}@{}", name, version)];
        run_checked(self.process.as_ref(), "npm", &args, &self.cwd).map_err(|e| Error::Registry {
            package: name.to_string(),
            message: e.to_string(),
        })?;
        info!(package = name, version = %version, "unpublished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_view_not_found() {
        let output = r#"{"error": {"code": "E404", "summary": "Not found"}}"#;
        assert!(parse_view_output("missing", output).unwrap().is_none());
    }

    #[test]
    fn test_parse_view_other_error() {
        let output = r#"{"error": {"code": "E500", "summary": "boom"}}"#;
        let err = parse_view_output("pkg", output).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_parse_view_versions_and_tags() {
        let output = r#"{
            "name": "pkg",
            "versions": ["1.0.0", "1.1.0", "2.0.0-beta.0"],
            "dist-tags": {"latest": "1.1.0", "next": "2.0.0-beta.0"},
            "dist": {"tarball": "https://registry.example/pkg-1.1.0.tgz"}
        }"#;
        let info = parse_view_output("pkg", output).unwrap().unwrap();
        assert_eq!(info.versions.len(), 3);
        assert_eq!(info.dist_tags.get("latest").map(String::as_str), Some("1.1.0"));
        assert_eq!(info.greatest(), Some(&Version::parse("2.0.0-beta.0").unwrap()));
        assert!(info.tarball.is_some());
    }

    #[test]
    fn test_parse_view_single_version_string() {
        let output = r#"{"name": "pkg", "versions": "0.1.0"}"#;
        let info = parse_view_output("pkg", output).unwrap().unwrap();
        assert!(info.has_version(&Version::new(0, 1, 0)));
    }
}
