//! Release and publish commands.

use std::path::PathBuf;

use anyhow::Result;
use rollkit_adapters::{GitVersionControl, NpmLockfile, NpmRegistry};
use rollkit_core::{ReleaseEngine, ReleaseOptions, ReleaseReport, UncommittedPolicy};

use crate::formatting::{print_key_value, print_release_table, print_section_header, print_success, print_warning, SectionStyle};

use super::release_reporter::CliReleaseReporter;
use super::Session;

fn run_release(root: PathBuf, options: ReleaseOptions) -> Result<()> {
    let session = Session::load(&root)?;
    let states = session.state_store();
    let vcs = GitVersionControl::new();
    let registry = NpmRegistry::new(session.workspace.root());
    let lockfiles = NpmLockfile::new();
    let dry_run = options.dry_run;

    if dry_run {
        print_section_header("Release Plan (Dry Run)", SectionStyle::Warning);
    } else {
        print_section_header("Release", SectionStyle::Primary);
    }

    let engine = ReleaseEngine::new(
        &session.workspace,
        &session.manifests,
        &vcs,
        &registry,
        &lockfiles,
        CliReleaseReporter,
        options,
    )
    .with_state_store(&states);
    let report = engine.run()?;

    print_report(&report, dry_run);
    Ok(())
}

fn print_report(report: &ReleaseReport, dry_run: bool) {
    println!();

    if !report.skipped.is_empty() {
        print_key_value("Skipped", &report.skipped.len().to_string());
        for skipped in &report.skipped {
            print_warning(&format!("{}: {}", skipped.name, skipped.reason));
        }
        println!();
    }

    if !report.lockfiles_pending.is_empty() {
        print_warning(&format!(
            "Lockfiles were not regenerated in this dry run ({}); a real run bumps these packages if their lockfile changes",
            report.lockfiles_pending.join(", ")
        ));
        println!();
    }

    if report.packages.is_empty() {
        print_success("No packages need version bumps");
        println!();
        return;
    }

    print_key_value("Packages to update", &report.packages.len().to_string());
    println!();
    print_release_table(&report.packages);
    println!();

    if !report.published.is_empty() {
        print_key_value("Published", &report.published.len().to_string());
    }
    if !dry_run {
        print_success("Release completed successfully");
    }
    println!();
}

pub fn cmd_release(
    root: PathBuf,
    prerelease: Option<String>,
    dry_run: bool,
    uncommitted: UncommittedPolicy,
    push: bool,
) -> Result<()> {
    let options = ReleaseOptions {
        prerelease,
        dry_run,
        commit: true,
        push,
        publish: false,
        uncommitted,
        ..Default::default()
    };
    run_release(root, options)
}

pub fn cmd_publish(
    root: PathBuf,
    prerelease: Option<String>,
    dry_run: bool,
    lockfile_check_property: Option<String>,
    lockfile_copy_path: Option<PathBuf>,
) -> Result<()> {
    let options = ReleaseOptions {
        prerelease,
        dry_run,
        commit: true,
        push: true,
        publish: true,
        lockfile_check_property,
        lockfile_copy_path,
        ..Default::default()
    };
    run_release(root, options)
}
