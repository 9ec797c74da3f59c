//! Development publishing of changed packages.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Result};
use owo_colors::OwoColorize;
use rollkit_adapters::{NpmRegistry, SystemProcess};
use rollkit_core::{Package, SyncEngine, SyncOutcome, Workspace};

use crate::formatting::{
    format_duration, print_section_header, print_separator_with_spacing, print_success, print_summary_box,
    print_sync_table, print_warning, SectionStyle,
};

use super::Session;

/// Package whose directory contains `dir`.
fn package_containing<'a>(workspace: &'a Workspace, dir: &Path) -> Option<&'a Package> {
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    workspace
        .participating()
        .filter(|p| {
            let path = p.path.canonicalize().unwrap_or_else(|_| p.path.clone());
            dir.starts_with(path)
        })
        .max_by_key(|p| p.path.components().count())
}

fn print_outcomes(outcomes: &[SyncOutcome], dry_run: bool) {
    for outcome in outcomes {
        for update in &outcome.range_updates {
            println!("  {} {}", outcome.package.bold(), update.to_string().bright_black());
        }
    }

    if outcomes.iter().any(SyncOutcome::published) {
        print_sync_table(outcomes);
        if dry_run {
            print_warning("Dry run: nothing was built, written or published");
        }
    } else {
        print_success("Everything is already published");
    }
}

pub fn cmd_sync(root: PathBuf, package: Option<String>, all: bool, dry_run: bool) -> Result<()> {
    let start = Instant::now();
    let session = Session::load(&root)?;
    let states = session.state_store();
    let registry = NpmRegistry::new(session.workspace.root());
    let process = SystemProcess::new();

    let title = if dry_run { "Sync Plan (Dry Run)" } else { "Sync" };
    print_section_header(title, if dry_run { SectionStyle::Warning } else { SectionStyle::Primary });

    let engine = SyncEngine::new(
        &session.workspace,
        &session.manifests,
        &states,
        &registry,
        &process,
        dry_run,
    );

    let outcomes = if all {
        engine.sync_all()?
    } else {
        let target = match &package {
            Some(name) => session.workspace.package_checked(name)?,
            None => {
                let cwd = std::env::current_dir()?;
                package_containing(&session.workspace, &cwd)
                    .ok_or_else(|| anyhow!("{} is not inside a workspace package", cwd.display()))?
            }
        };
        let (outcome, dependents) = engine.sync(target)?;
        for dependent in &dependents {
            println!("  {} {}", dependent.package.bold(), dependent.update.to_string().bright_black());
        }
        vec![outcome]
    };

    print_outcomes(&outcomes, dry_run);

    let published = outcomes.iter().filter(|o| o.published()).count();
    print_separator_with_spacing();
    print_summary_box(
        "Summary",
        &[
            ("Published", &published.to_string()),
            ("Duration", &format_duration(start.elapsed().as_secs_f64())),
        ],
    );
    println!();

    Ok(())
}
