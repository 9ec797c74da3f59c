//! Workspace (`rollkit.toml`) and per-package (`package.json` `"rollkit"` key) configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "rollkit.toml";

pub const DEFAULT_RELEASE_BRANCH: &str = "master";

fn default_true() -> bool {
    true
}

fn default_release_branches() -> Vec<String> {
    vec![DEFAULT_RELEASE_BRANCH.to_string()]
}

/// Root of `rollkit.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub workspace: WorkspaceConfig,
}

/// The `[workspace]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Glob patterns, relative to the workspace root, selecting package directories.
    pub members: Vec<String>,
    #[serde(default)]
    pub use_lock_files: bool,
    #[serde(default)]
    pub always_update_lockfile: bool,
    #[serde(default)]
    pub publish_if_source_not_changed: bool,
    #[serde(default = "default_true")]
    pub default_use_npm: bool,
    #[serde(default)]
    pub default_build_triggers: Vec<String>,
    #[serde(default)]
    pub default_build_commands: Vec<String>,
    #[serde(default)]
    pub default_npm_ignore: Option<PathBuf>,
    #[serde(default = "default_release_branches")]
    pub release_branches: Vec<String>,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            use_lock_files: false,
            always_update_lockfile: false,
            publish_if_source_not_changed: false,
            default_use_npm: true,
            default_build_triggers: Vec::new(),
            default_build_commands: Vec::new(),
            default_npm_ignore: None,
            release_branches: default_release_branches(),
            state_dir: None,
        }
    }
}

impl Config {
    /// Parses and validates a `rollkit.toml` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// declares an empty member list.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|error| Error::Toml {
            error,
            context: path.display().to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: &str| Error::InvalidConfig {
            context: path.display().to_string(),
            message: message.to_string(),
        };

        if self.workspace.members.is_empty() {
            return Err(invalid("'members' must list at least one pattern"));
        }
        if self.workspace.members.iter().any(|m| m.trim().is_empty()) {
            return Err(invalid("'members' must not contain empty patterns"));
        }
        if self.workspace.release_branches.is_empty() {
            return Err(invalid("'release_branches' must not be empty"));
        }
        Ok(())
    }

    /// Walks up from `start` looking for `rollkit.toml`.
    pub fn find(start: &Path) -> Option<PathBuf> {
        let mut current = Some(start);
        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            current = dir.parent();
        }
        None
    }
}

/// Settings a package declares under the `"rollkit"` key of its manifest.
///
/// Every field is optional; unset fields inherit workspace defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PackageSettings {
    pub use_npm: Option<bool>,
    pub build_triggers: Option<Vec<String>>,
    pub build_commands: Option<Vec<String>>,
    pub always_update_lock_file: Option<bool>,
    pub publish_if_source_not_changed: Option<bool>,
    pub release_branches: Option<Vec<String>>,
    pub npm_ignore: Option<PathBuf>,
}

impl PackageSettings {
    /// Validates the raw `"rollkit"` value of a manifest.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidManifest` for unknown keys or mistyped values.
    pub fn from_value(manifest_path: &Path, value: Option<&serde_json::Value>) -> Result<Self> {
        let Some(value) = value else {
            return Ok(Self::default());
        };

        let settings: PackageSettings =
            serde_json::from_value(value.clone()).map_err(|e| Error::InvalidManifest {
                path: manifest_path.to_path_buf(),
                message: format!("invalid \"rollkit\" settings: {}", e),
            })?;

        if let Some(branches) = &settings.release_branches {
            if branches.is_empty() {
                return Err(Error::InvalidManifest {
                    path: manifest_path.to_path_buf(),
                    message: "\"rollkit.releaseBranches\" must not be empty".to_string(),
                });
            }
        }

        Ok(settings)
    }
}
