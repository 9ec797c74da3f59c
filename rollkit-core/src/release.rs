//! Release orchestration: one dependency-first walk that propagates ranges,
//! resolves versions, tags, pushes and publishes.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::context::{ReleaseContext, VersionBump};
use crate::error::{Error, Result};
use crate::graph::{GraphWalker, WalkAction, WalkOutcome};
use crate::lockfile::{KnownPackages, LocalPackageMeta, LockfileGenerator, LOCKFILE_NAME};
use crate::manifest::{ManifestStore, MANIFEST_FILE_NAME};
use crate::package::Package;
use crate::propagate::RangePropagator;
use crate::registry::Registry;
use crate::release_reporter::ReleaseReporter;
use crate::retry::RetryPolicy;
use crate::state::ModuleStateStore;
use crate::subset::{BUILD_TAG, PUBLISH_TAG};
use crate::vcs::VersionControl;
use crate::version::{select_publish_tag, VersionResolver};
use crate::workspace::Workspace;

const UPDATE_DEPENDENCIES_MESSAGE: &str = "chore: update dependencies";

/// What to do with a package whose working tree has uncommitted changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UncommittedPolicy {
    /// Stop the whole run.
    #[default]
    Abort,
    /// Skip the package and everything that depends on it.
    Skip,
}

/// Options for one release run.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Prerelease identifier; bumps become `pre<bump>` increments.
    pub prerelease: Option<String>,
    /// Report decisions without writing, tagging, pushing or publishing.
    pub dry_run: bool,
    /// Commit range updates and version bumps.
    pub commit: bool,
    /// Push tagged repositories after the walk.
    pub push: bool,
    /// Publish bumped packages to the registry after the walk.
    pub publish: bool,
    /// Regenerate the lockfile of packages where this manifest property is truthy.
    pub lockfile_check_property: Option<String>,
    /// Move regenerated lockfiles to this package-relative path.
    pub lockfile_copy_path: Option<PathBuf>,
    pub uncommitted: UncommittedPolicy,
    pub retry: RetryPolicy,
}

/// A package whose version changed in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePackage {
    pub name: String,
    pub old_version: String,
    pub new_version: String,
    pub reasons: Vec<String>,
    pub tag: Option<String>,
}

/// A package that will not be released, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPackage {
    pub name: String,
    pub reason: String,
}

/// A package pushed to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPackage {
    pub name: String,
    pub version: String,
    pub tag: String,
}

/// Everything a release run decided.
#[derive(Debug, Clone, Default)]
pub struct ReleaseReport {
    pub packages: Vec<ReleasePackage>,
    pub skipped: Vec<SkippedPackage>,
    /// Packages whose lockfile a dry run would have regenerated. A real run
    /// may add "generated lockfile changed" to their reasons.
    pub lockfiles_pending: Vec<String>,
    pub pushed: Vec<String>,
    pub published: Vec<PublishedPackage>,
    pub stopped: bool,
}

/// Engine for planning and executing releases.
pub struct ReleaseEngine<'a> {
    workspace: &'a Workspace,
    manifests: &'a dyn ManifestStore,
    vcs: &'a dyn VersionControl,
    registry: &'a dyn Registry,
    lockfiles: &'a dyn LockfileGenerator,
    reporter: Box<dyn ReleaseReporter>,
    states: Option<&'a ModuleStateStore>,
    options: ReleaseOptions,
}

impl<'a> ReleaseEngine<'a> {
    /// Creates a new release engine.
    ///
    /// All collaborators are injected; the engine holds no global state.
    pub fn new<R>(
        workspace: &'a Workspace,
        manifests: &'a dyn ManifestStore,
        vcs: &'a dyn VersionControl,
        registry: &'a dyn Registry,
        lockfiles: &'a dyn LockfileGenerator,
        reporter: R,
        options: ReleaseOptions,
    ) -> Self
    where
        R: ReleaseReporter + 'static,
    {
        Self {
            workspace,
            manifests,
            vcs,
            registry,
            lockfiles,
            reporter: Box::new(reporter),
            states: None,
            options,
        }
    }

    /// Keeps build and publish snapshots in sync with the files the release rewrites.
    pub fn with_state_store(mut self, states: &'a ModuleStateStore) -> Self {
        self.states = Some(states);
        self
    }

    /// Runs the release walk and the post-walk push/publish steps.
    ///
    /// # Errors
    ///
    /// Returns an error on a dependency cycle, a corrupt manifest, an
    /// aborting uncommitted-changes check, or an exhausted push retry.
    /// Packages completed before the error keep their changes.
    pub fn run(&self) -> Result<ReleaseReport> {
        let mut ctx = ReleaseContext::new();
        let mut report = ReleaseReport::default();

        self.check_packages(&mut ctx, &mut report)?;

        let walker = GraphWalker::new(self.workspace, self.manifests);
        let outcome = walker.walk(|package| self.process(package, &mut ctx, &mut report))?;
        report.stopped = outcome == WalkOutcome::Stopped;

        if self.options.push {
            self.push_tags(&mut ctx, &mut report)?;
        }
        if self.options.publish {
            self.publish_packages(&ctx, &mut report)?;
        }

        Ok(report)
    }

    fn skip(&self, ctx: &mut ReleaseContext, report: &mut ReleaseReport, package: &Package, reason: String) {
        let name = package.display_name();
        info!(package = %name, "skipping: {}", reason);
        self.reporter.report_skip(&name, &reason);
        report.skipped.push(SkippedPackage {
            name,
            reason: reason.clone(),
        });
        ctx.skip(package, reason);
    }

    /// Marks packages that must not be released before any decision is made.
    fn check_packages(&self, ctx: &mut ReleaseContext, report: &mut ReleaseReport) -> Result<()> {
        let walker = GraphWalker::new(self.workspace, self.manifests);
        for package in walker.walk_order()? {
            if !package.use_npm {
                self.skip(ctx, report, package, "not managed by the package manager".to_string());
                continue;
            }

            let Some(repo) = ctx.repository(package, self.vcs)? else {
                continue;
            };

            if let Some(branch) = repo.current_branch()? {
                if !package.release_branches.iter().any(|b| b == &branch) {
                    self.skip(
                        ctx,
                        report,
                        package,
                        format!("on branch {}, releases are not allowed on this branch", branch),
                    );
                    continue;
                }
            }

            if repo.has_uncommitted_changes()? {
                match self.options.uncommitted {
                    UncommittedPolicy::Abort => {
                        return Err(Error::Release(format!(
                            "package {} has uncommitted changes",
                            package.display_name()
                        )));
                    }
                    UncommittedPolicy::Skip => {
                        self.skip(ctx, report, package, "has uncommitted changes".to_string());
                    }
                }
            }
        }
        Ok(())
    }

    fn known_packages(&self) -> Result<KnownPackages> {
        let mut known = KnownPackages::new();
        for package in self.workspace.participating() {
            let Some(manifest) = self.manifests.read(&package.path)? else {
                continue;
            };
            if let (Some(name), Some(version)) = (manifest.name(), manifest.version()) {
                known.insert(
                    name.to_string(),
                    LocalPackageMeta {
                        version: version.to_string(),
                        path: package.path.clone(),
                    },
                );
            }
        }
        Ok(known)
    }

    fn should_regenerate_lockfile(&self, package: &Package, ranges_changed: bool) -> Result<bool> {
        if !self.workspace.config().use_lock_files {
            return Ok(false);
        }
        if package.always_update_lockfile || ranges_changed {
            return Ok(true);
        }
        match &self.options.lockfile_check_property {
            Some(property) => Ok(self
                .manifests
                .read(&package.path)?
                .is_some_and(|m| m.is_property_truthy(property))),
            None => Ok(false),
        }
    }

    /// Regenerates the lockfile; returns whether its content changed.
    fn regenerate_lockfile(&self, package: &Package) -> Result<bool> {
        let generated = package.path.join(LOCKFILE_NAME);
        let target = match &self.options.lockfile_copy_path {
            Some(copy) => package.path.join(copy),
            None => generated.clone(),
        };
        let before = fs::read(&target).ok();

        self.lockfiles.generate(&package.path, &self.known_packages()?)?;

        if target != generated {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&generated, &target).map_err(|e| Error::Lockfile {
                path: generated.clone(),
                message: format!("failed to move lockfile to {}: {}", target.display(), e),
            })?;
        }

        Ok(fs::read(&target).ok() != before)
    }

    fn process(&self, package: &Package, ctx: &mut ReleaseContext, report: &mut ReleaseReport) -> Result<WalkAction> {
        let name = package.display_name();
        let dry_run = self.options.dry_run;

        if ctx.is_skipped(package) {
            return Ok(WalkAction::Continue);
        }

        let local_deps = self.workspace.direct_local_deps(package, self.manifests)?;
        if let Some(dep) = local_deps.iter().find(|d| ctx.is_skipped(d.package)) {
            let reason = format!("depends on skipped module {}", dep.package.display_name());
            self.skip(ctx, report, package, reason);
            return Ok(WalkAction::Continue);
        }

        let repo = ctx.repository(package, self.vcs)?;

        let updates = RangePropagator::new(self.manifests).propagate(package, ctx.updated(), dry_run)?;
        for update in &updates {
            self.reporter.report_range_update(&name, update, dry_run);
        }
        let mut local_updates: Vec<String> = updates.iter().map(ToString::to_string).collect();

        if self.should_regenerate_lockfile(package, !updates.is_empty())? {
            if dry_run {
                report.lockfiles_pending.push(name.clone());
            } else if self.regenerate_lockfile(package)? {
                local_updates.push("generated lockfile changed".to_string());
            }
            self.reporter.report_lockfile(&name, dry_run);
        }

        if local_updates.is_empty() && package.publish_if_source_not_changed {
            local_updates.extend(
                local_deps
                    .iter()
                    .filter(|d| ctx.is_dirty(d.package))
                    .map(|d| {
                        format!(
                            "should be published if dependencies change, and module {} has changed",
                            d.package.display_name()
                        )
                    }),
            );
        }

        // Resolved before the dependency commit so that commit is not counted.
        let resolver = VersionResolver::new(self.manifests);
        let resolution = resolver.resolve(
            package,
            repo.as_deref(),
            self.options.prerelease.as_deref(),
            &local_updates,
        )?;

        if self.options.commit && !dry_run {
            if let Some(repo) = &repo {
                if !local_updates.is_empty() && repo.has_uncommitted_changes()? {
                    repo.commit_all(UPDATE_DEPENDENCIES_MESSAGE)?;
                }
            }
        }

        let tag = resolver.apply(package, repo.as_deref(), &resolution, self.options.commit, dry_run)?;

        if !resolution.is_bump() {
            debug!(package = %name, version = %resolution.current, "version unchanged");
            self.reporter
                .report_unchanged(&name, &resolution.current.to_string());
            return Ok(WalkAction::Continue);
        }

        self.reporter.report_bump(
            &name,
            &resolution.current.to_string(),
            &resolution.new.to_string(),
            &resolution.reasons,
            dry_run,
        );

        if !dry_run {
            if let Some(states) = self.states {
                states.update_file_state(package, BUILD_TAG, Path::new(MANIFEST_FILE_NAME))?;
            }
        }

        ctx.mark_dirty(package);
        ctx.record_bump(
            &name,
            VersionBump {
                from: resolution.current.clone(),
                to: resolution.new.clone(),
            },
        );
        if let Some(tag) = &tag {
            ctx.record_tag(package, tag.clone());
        }

        report.packages.push(ReleasePackage {
            name,
            old_version: resolution.current.to_string(),
            new_version: resolution.new.to_string(),
            reasons: resolution.reasons,
            tag,
        });

        Ok(WalkAction::Continue)
    }

    fn push_tags(&self, ctx: &mut ReleaseContext, report: &mut ReleaseReport) -> Result<()> {
        let tagged: Vec<(PathBuf, String)> = ctx
            .tagged()
            .map(|(path, tag)| (path.to_path_buf(), tag.to_string()))
            .collect();

        for (path, tag) in tagged {
            let Some(package) = self.workspace.packages().iter().find(|p| p.path == path) else {
                continue;
            };
            let name = package.display_name();

            if !self.options.dry_run {
                let Some(repo) = ctx.repository(package, self.vcs)? else {
                    continue;
                };
                self.options
                    .retry
                    .run(&format!("push {}", name), || repo.push(false))?;
            }

            self.reporter.report_push(&name, &tag, self.options.dry_run);
            report.pushed.push(name);
        }
        Ok(())
    }

    fn publish_packages(&self, ctx: &ReleaseContext, report: &mut ReleaseReport) -> Result<()> {
        for (name, bump) in ctx.updated() {
            let package = self.workspace.package_checked(name)?;
            if !package.use_npm {
                continue;
            }

            let info = self.registry.view_package(name)?;
            if info.as_ref().is_some_and(|i| i.has_version(&bump.to)) {
                debug!(package = %name, version = %bump.to, "already published");
                continue;
            }

            let tag = select_publish_tag(info.as_ref().map(|i| i.versions.as_slice()), &bump.to);
            if !self.options.dry_run {
                self.registry.publish(&package.path, &tag, false)?;
                if let Some(states) = self.states {
                    states.save(package, PUBLISH_TAG, &states.actual_state(package)?)?;
                }
            }

            self.reporter
                .report_publish(name, &bump.to.to_string(), &tag, self.options.dry_run);
            report.published.push(PublishedPackage {
                name: name.clone(),
                version: bump.to.to_string(),
                tag,
            });
        }
        Ok(())
    }
}
