//! Script execution and build commands.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use owo_colors::OwoColorize;
use rollkit_adapters::{NpmRegistry, SystemProcess};
use rollkit_core::{BuildDecision, BuildEngine, PackageFilter, Script, TaskResult, TaskRunner};

use crate::formatting::{
    create_spinner, format_duration, print_section_header, print_separator_with_spacing, print_success,
    print_summary_box, print_task_table, print_warning, SectionStyle,
};

use super::Session;

fn print_task_results(results: &[TaskResult], section_title: &str) -> bool {
    print_section_header(section_title, SectionStyle::Primary);

    if results.is_empty() {
        print_warning("Nothing was run");
        return false;
    }

    print_task_table(results);
    println!();

    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = results.len() - succeeded;
    if failed > 0 {
        print_warning(&format!("{} succeeded, {} failed", succeeded, failed));
    } else {
        print_success(&format!("All {} packages succeeded", succeeded));
    }

    failed > 0
}

pub fn cmd_each(
    root: PathBuf,
    script: Option<String>,
    command: Vec<String>,
    changed: bool,
    not_published: bool,
    parallel: bool,
) -> Result<()> {
    let start = Instant::now();
    let script = match (script, command.split_first()) {
        (None, Some((program, args))) => Script::Command {
            program: program.clone(),
            args: args.to_vec(),
        },
        (Some(name), None) => Script::Npm(name),
        (Some(_), Some(_)) => bail!("Pass either a script name or a command after --, not both"),
        (None, None) => bail!("Missing script name or command after --"),
    };

    let session = Session::load(&root)?;
    let states = session.state_store();
    let registry = NpmRegistry::new(session.workspace.root());
    let process = SystemProcess::new();

    let runner = TaskRunner::new(&session.workspace, &session.manifests, &process)?;
    let filter = PackageFilter {
        changed: changed.then_some(&states),
        unpublished: not_published.then_some(&registry as &dyn rollkit_core::Registry),
    };
    let packages = runner.select(&filter)?;

    print_section_header(&format!("Running {}", script.name()), SectionStyle::Primary);

    let spinner = create_spinner(&format!("{} packages", packages.len()));
    let results = runner.run(&script, &packages, parallel, |package, line, is_stderr| {
        let prefix = format!("[{}]", package);
        spinner.suspend(|| {
            if is_stderr {
                eprintln!("  {} {}", prefix.bright_black().bold(), line.bright_red());
            } else {
                println!("  {} {}", prefix.bright_black().bold(), line);
            }
        });
    });
    spinner.finish_and_clear();
    let results = results?;

    let failed = print_task_results(&results, "Results");

    print_separator_with_spacing();
    print_summary_box("Summary", &[("Duration", &format_duration(start.elapsed().as_secs_f64()))]);
    println!();

    if failed {
        std::process::exit(1);
    }

    Ok(())
}

pub fn cmd_build(root: PathBuf) -> Result<()> {
    let start = Instant::now();
    let session = Session::load(&root)?;
    let states = session.state_store();
    let process = SystemProcess::new();

    print_section_header("Building changed packages", SectionStyle::Primary);

    let engine = BuildEngine::new(&session.workspace, &session.manifests, &states, &process);
    let outcomes = engine.build_changed()?;

    let mut built = 0;
    for outcome in &outcomes {
        match &outcome.decision {
            BuildDecision::Changed => {
                built += 1;
                print_success(&format!("{} rebuilt: build triggers changed", outcome.package));
            }
            BuildDecision::DependencyRebuilt(dep) => {
                built += 1;
                print_success(&format!("{} rebuilt: dependency {} was rebuilt", outcome.package, dep));
            }
            BuildDecision::Unchanged => {
                println!("  {} {}", outcome.package.bright_black(), "up to date".bright_black());
            }
            BuildDecision::NoCommands => {}
        }
    }

    print_separator_with_spacing();
    print_summary_box(
        "Summary",
        &[
            ("Built", &built.to_string()),
            ("Duration", &format_duration(start.elapsed().as_secs_f64())),
        ],
    );
    println!();

    Ok(())
}
