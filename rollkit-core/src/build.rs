//! Incremental builds driven by build-subset snapshots.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::graph::{GraphWalker, WalkAction};
use crate::manifest::ManifestStore;
use crate::package::Package;
use crate::process::ProcessRunner;
use crate::state::ModuleStateStore;
use crate::subset::{BuildSubset, Subset};
use crate::workspace::Workspace;

/// Why a package was or was not rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildDecision {
    /// Build triggers changed since the last build.
    Changed,
    /// A local dependency was rebuilt in this run.
    DependencyRebuilt(String),
    Unchanged,
    /// The package declares no build commands.
    NoCommands,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub package: String,
    pub decision: BuildDecision,
}

impl BuildOutcome {
    pub fn built(&self) -> bool {
        matches!(
            self.decision,
            BuildDecision::Changed | BuildDecision::DependencyRebuilt(_)
        )
    }
}

/// Splits a build command into program and arguments.
pub fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Rebuilds packages whose build subset changed, dependencies first.
pub struct BuildEngine<'a> {
    workspace: &'a Workspace,
    manifests: &'a dyn ManifestStore,
    states: &'a ModuleStateStore,
    process: &'a dyn ProcessRunner,
}

impl<'a> BuildEngine<'a> {
    pub fn new(
        workspace: &'a Workspace,
        manifests: &'a dyn ManifestStore,
        states: &'a ModuleStateStore,
        process: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            workspace,
            manifests,
            states,
            process,
        }
    }

    /// Walks the workspace and builds what changed.
    ///
    /// # Errors
    ///
    /// Stops at the first failing build command; snapshots of packages
    /// built before it are kept.
    pub fn build_changed(&self) -> Result<Vec<BuildOutcome>> {
        let mut rebuilt: HashSet<&Path> = HashSet::new();
        let mut outcomes = Vec::new();

        GraphWalker::new(self.workspace, self.manifests).walk(|package| {
            let decision = self.decide(package, &rebuilt)?;
            if matches!(decision, BuildDecision::Changed | BuildDecision::DependencyRebuilt(_)) {
                self.build(package)?;
                rebuilt.insert(package.path.as_path());
            }
            outcomes.push(BuildOutcome {
                package: package.display_name(),
                decision,
            });
            Ok(WalkAction::Continue)
        })?;

        Ok(outcomes)
    }

    /// Whether the package has build commands and its build subset changed.
    pub fn needs_build(&self, package: &Package) -> Result<bool> {
        if package.build_commands.is_empty() {
            return Ok(false);
        }
        let subset = BuildSubset::new(package)?;
        self.states.has_subset_changed(package, &subset)
    }

    /// Builds one package if its build subset changed; returns whether it built.
    pub fn build_if_changed(&self, package: &Package) -> Result<bool> {
        if !self.needs_build(package)? {
            return Ok(false);
        }
        self.build(package)?;
        Ok(true)
    }

    fn decide(&self, package: &Package, rebuilt: &HashSet<&Path>) -> Result<BuildDecision> {
        if package.build_commands.is_empty() {
            return Ok(BuildDecision::NoCommands);
        }

        let subset = BuildSubset::new(package)?;
        if self.states.has_subset_changed(package, &subset)? {
            return Ok(BuildDecision::Changed);
        }

        let deps = self.workspace.direct_local_deps(package, self.manifests)?;
        Ok(deps
            .iter()
            .find(|d| rebuilt.contains(d.package.path.as_path()))
            .map(|d| BuildDecision::DependencyRebuilt(d.package.display_name()))
            .unwrap_or(BuildDecision::Unchanged))
    }

    fn build(&self, package: &Package) -> Result<()> {
        let name = package.display_name();
        let manifest = self.manifests.read(&package.path)?;

        for command in &package.build_commands {
            let (program, args) = if manifest.as_ref().is_some_and(|m| m.has_script(command)) {
                ("npm".to_string(), vec!["run".to_string(), command.clone()])
            } else {
                split_command(command).ok_or_else(|| Error::TaskExecution {
                    package: name.clone(),
                    task: "build".to_string(),
                    message: "empty build command".to_string(),
                })?
            };

            info!(package = %name, "building: {}", command);
            let output = self.process.run(&program, &args, &package.path)?;
            if !output.success {
                return Err(Error::TaskExecution {
                    package: name,
                    task: command.clone(),
                    message: output.stderr.trim().to_string(),
                });
            }
        }

        let subset = BuildSubset::new(package)?;
        let snapshot = self.states.actual_state(package)?;
        self.states.save(package, subset.tag(), &snapshot)
    }
}
