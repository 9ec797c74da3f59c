//! Release reporter implementation for CLI.

use owo_colors::OwoColorize;
use rollkit_core::release_reporter::ReleaseReporter;
use rollkit_core::RangeUpdate;

use crate::formatting::print_warning;

/// CLI implementation of ReleaseReporter.
pub struct CliReleaseReporter;

fn prefix(dry_run: bool) -> &'static str {
    if dry_run {
        "[DRY RUN] Would "
    } else {
        ""
    }
}

impl ReleaseReporter for CliReleaseReporter {
    fn report_bump(&self, package: &str, old: &str, new: &str, reasons: &[String], dry_run: bool) {
        let verb = if dry_run { "bump" } else { "Bumped" };
        println!(
            "{}{} {} from {} to {}",
            prefix(dry_run),
            verb,
            package.bold(),
            old,
            new.green()
        );
        for reason in reasons {
            println!("    {}", reason.bright_black());
        }
    }

    fn report_skip(&self, package: &str, reason: &str) {
        print_warning(&format!("Skipping {}: {}", package, reason));
    }

    fn report_range_update(&self, package: &str, update: &RangeUpdate, dry_run: bool) {
        let verb = if dry_run { "update" } else { "Updated" };
        println!(
            "{}{} {} range of {} in {}: {} → {}",
            prefix(dry_run),
            verb,
            update.kind,
            update.dependency,
            package.bold(),
            update.old_range,
            update.new_range.cyan()
        );
    }

    fn report_lockfile(&self, package: &str, dry_run: bool) {
        if dry_run {
            println!(
                "{}regenerate lockfile of {} {}",
                prefix(dry_run),
                package.bold(),
                "(skipped in dry run, a changed lockfile adds a patch bump)".bright_black()
            );
        } else {
            println!("Regenerated lockfile of {}", package.bold());
        }
    }

    fn report_push(&self, package: &str, tag: &str, dry_run: bool) {
        let verb = if dry_run { "push" } else { "Pushed" };
        println!("{}{} {} with tag {}", prefix(dry_run), verb, package.bold(), tag);
    }

    fn report_publish(&self, package: &str, version: &str, tag: &str, dry_run: bool) {
        let verb = if dry_run { "publish" } else { "Published" };
        println!(
            "{}{} {}@{} under tag {}",
            prefix(dry_run),
            verb,
            package.bold(),
            version.green(),
            tag
        );
    }
}
