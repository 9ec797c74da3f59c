//! Trait for reporting release operations.

use crate::propagate::RangeUpdate;

/// Reports release decisions without writing to stdout/stderr directly.
///
/// Dry runs report the same decisions with `dry_run` set.
pub trait ReleaseReporter: Send + Sync {
    /// A version bump with the reasons behind it.
    fn report_bump(&self, package: &str, old: &str, new: &str, reasons: &[String], dry_run: bool);

    /// The package keeps its version.
    fn report_unchanged(&self, package: &str, version: &str) {
        let _ = (package, version);
    }

    /// The package was skipped and will not be released.
    fn report_skip(&self, package: &str, reason: &str);

    /// A dependency range was rewritten in the package's manifest.
    fn report_range_update(&self, package: &str, update: &RangeUpdate, dry_run: bool);

    /// The package's lockfile was regenerated.
    ///
    /// Dry runs do not generate lockfiles, so a dry run cannot tell whether
    /// the content would change and the event only marks the package.
    fn report_lockfile(&self, package: &str, dry_run: bool) {
        let _ = (package, dry_run);
    }

    /// Tags of the package's repository were pushed.
    fn report_push(&self, package: &str, tag: &str, dry_run: bool);

    /// The package was published under a dist-tag.
    fn report_publish(&self, package: &str, version: &str, tag: &str, dry_run: bool);
}

/// Reporter that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ReleaseReporter for SilentReporter {
    fn report_bump(&self, _: &str, _: &str, _: &str, _: &[String], _: bool) {}
    fn report_skip(&self, _: &str, _: &str) {}
    fn report_range_update(&self, _: &str, _: &RangeUpdate, _: bool) {}
    fn report_push(&self, _: &str, _: &str, _: bool) {}
    fn report_publish(&self, _: &str, _: &str, _: &str, _: bool) {}
}
