//! Running a script or command across packages, sequentially or on a worker pool.

use std::collections::HashSet;
use std::path::Path;

use crossbeam::channel;
use rayon::prelude::*;
use semver::Version;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::graph::{GraphWalker, WalkAction};
use crate::manifest::ManifestStore;
use crate::package::Package;
use crate::process::ProcessRunner;
use crate::registry::Registry;
use crate::state::ModuleStateStore;
use crate::subset::BuildSubset;
use crate::workspace::Workspace;

/// What to run in each package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// A manifest script, run through `npm run`.
    Npm(String),
    /// An arbitrary command.
    Command { program: String, args: Vec<String> },
}

impl Script {
    pub fn name(&self) -> String {
        match self {
            Script::Npm(name) => name.clone(),
            Script::Command { program, args } => {
                std::iter::once(program.as_str())
                    .chain(args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    }
}

/// Result of running a script in one package.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub package_name: String,
    pub task_name: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Restricts which packages a script runs in.
///
/// A package that depends on an already selected package is always selected.
#[derive(Default)]
pub struct PackageFilter<'a> {
    /// Only packages whose build subset changed since the last build.
    pub changed: Option<&'a ModuleStateStore>,
    /// Only packages whose current version is not on the registry.
    pub unpublished: Option<&'a dyn Registry>,
}

/// Executes scripts across packages in dependency order.
pub struct TaskRunner<'a> {
    workspace: &'a Workspace,
    manifests: &'a dyn ManifestStore,
    process: &'a dyn ProcessRunner,
    thread_pool: rayon::ThreadPool,
}

impl<'a> TaskRunner<'a> {
    /// # Errors
    ///
    /// Fails if the worker pool cannot be created.
    pub fn new(
        workspace: &'a Workspace,
        manifests: &'a dyn ManifestStore,
        process: &'a dyn ProcessRunner,
    ) -> Result<Self> {
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(rayon::current_num_threads())
            .thread_name(|i| format!("rollkit-worker-{}", i))
            .build()
            .map_err(|e| Error::TaskExecution {
                package: "workspace".to_string(),
                task: "pool".to_string(),
                message: format!("failed to create worker pool: {}", e),
            })?;

        Ok(Self {
            workspace,
            manifests,
            process,
            thread_pool,
        })
    }

    /// Packages to run in, in walk order.
    pub fn select(&self, filter: &PackageFilter<'_>) -> Result<Vec<&'a Package>> {
        let mut selected: Vec<&'a Package> = Vec::new();
        let mut selected_paths: HashSet<&'a Path> = HashSet::new();

        GraphWalker::new(self.workspace, self.manifests).walk(|package| {
            let depends_on_selected = self
                .workspace
                .direct_local_deps(package, self.manifests)?
                .iter()
                .any(|d| selected_paths.contains(d.package.path.as_path()));

            if depends_on_selected || self.passes(package, filter)? {
                selected.push(package);
                selected_paths.insert(package.path.as_path());
            } else {
                debug!(package = %package.display_name(), "filtered out");
            }
            Ok(WalkAction::Continue)
        })?;

        Ok(selected)
    }

    fn passes(&self, package: &Package, filter: &PackageFilter<'_>) -> Result<bool> {
        if let Some(states) = filter.changed {
            let subset = BuildSubset::new(package)?;
            if !states.has_subset_changed(package, &subset)? {
                return Ok(false);
            }
        }

        if let Some(registry) = filter.unpublished {
            let manifest = self.manifests.read_required(&package.path)?;
            let (Some(name), Some(version)) = (manifest.name(), manifest.version()) else {
                return Ok(false);
            };
            let version = Version::parse(version).map_err(|e| Error::InvalidVersion {
                package: name.to_string(),
                version: version.to_string(),
                message: e.to_string(),
            })?;
            if registry.is_published(name, &version)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn command_for(&self, package: &Package, script: &Script) -> Result<Option<(String, Vec<String>)>> {
        match script {
            Script::Command { program, args } => Ok(Some((program.clone(), args.clone()))),
            Script::Npm(name) => {
                if !package.use_npm {
                    return Ok(None);
                }
                let has_script = self
                    .manifests
                    .read(&package.path)?
                    .is_some_and(|m| m.has_script(name));
                if !has_script {
                    info!("Script {} not present in module {}, skipping", name, package.display_name());
                    return Ok(None);
                }
                Ok(Some(("npm".to_string(), vec!["run".to_string(), name.clone()])))
            }
        }
    }

    fn run_one(&self, package: &Package, script: &Script) -> Result<Option<TaskResult>> {
        let Some((program, args)) = self.command_for(package, script)? else {
            return Ok(None);
        };

        let output = self.process.run(&program, &args, &package.path)?;
        Ok(Some(TaskResult {
            package_name: package.display_name(),
            task_name: script.name(),
            success: output.success,
            stdout: output.stdout,
            stderr: output.stderr,
        }))
    }

    /// Runs `script` in every package of `packages`.
    ///
    /// Sequential runs stop at the first failure. Parallel runs start every
    /// package on the worker pool and return all results in input order.
    /// `on_output` receives `(package, line, is_stderr)` for each output line.
    pub fn run<F>(
        &self,
        script: &Script,
        packages: &[&'a Package],
        parallel: bool,
        on_output: F,
    ) -> Result<Vec<TaskResult>>
    where
        F: Fn(&str, &str, bool) + Send + Sync,
    {
        let emit = |result: &TaskResult| {
            for line in result.stdout.lines() {
                on_output(&result.package_name, line, false);
            }
            for line in result.stderr.lines() {
                on_output(&result.package_name, line, true);
            }
        };

        if !parallel {
            let mut results = Vec::with_capacity(packages.len());
            for package in packages {
                let Some(result) = self.run_one(package, script)? else {
                    continue;
                };
                emit(&result);
                if !result.success {
                    return Err(Error::TaskExecution {
                        package: result.package_name,
                        task: result.task_name,
                        message: result.stderr.trim().to_string(),
                    });
                }
                results.push(result);
            }
            return Ok(results);
        }

        let (tx, rx) = channel::unbounded();
        self.thread_pool.install(|| {
            packages
                .par_iter()
                .enumerate()
                .for_each_with(tx, |tx, (index, package)| {
                    let result = self.run_one(package, script);
                    if let Ok(Some(r)) = &result {
                        emit(r);
                    }
                    let _ = tx.send((index, result));
                });
        });

        let mut collected: Vec<(usize, TaskResult)> = Vec::with_capacity(packages.len());
        for (index, result) in rx.iter() {
            if let Some(r) = result? {
                collected.push((index, r));
            }
        }
        collected.sort_by_key(|(index, _)| *index);
        Ok(collected.into_iter().map(|(_, r)| r).collect())
    }
}
