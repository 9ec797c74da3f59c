//! Workspace inspection commands.

use std::path::{Path, PathBuf};

use anyhow::Result;
use owo_colors::OwoColorize;
use rollkit_core::{DependencyGraph, GraphWalker, ManifestStore, Package};
use serde_json::json;

use crate::formatting::{print_key_value, print_package_table, print_section_header, print_warning, SectionStyle};

use super::Session;

fn relative_path(root: &Path, package: &Package) -> String {
    package
        .path
        .strip_prefix(root)
        .unwrap_or(&package.path)
        .display()
        .to_string()
}

pub fn cmd_list(root: PathBuf, json: bool) -> Result<()> {
    let session = Session::load(&root)?;
    let workspace = &session.workspace;
    let order = GraphWalker::new(workspace, &session.manifests).walk_order()?;

    let mut rows = Vec::with_capacity(order.len());
    for package in &order {
        let version = session
            .manifests
            .read(&package.path)?
            .and_then(|m| m.version().map(str::to_string))
            .unwrap_or_default();
        rows.push((package.display_name(), version, relative_path(workspace.root(), package)));
    }

    if json {
        let packages: Vec<_> = rows
            .iter()
            .map(|(name, version, path)| json!({ "name": name, "version": version, "path": path }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(());
    }

    print_section_header("Packages", SectionStyle::Primary);
    if rows.is_empty() {
        print_warning("No packages found");
    } else {
        print_package_table(&rows);
    }

    let unnamed = workspace.packages().len() - workspace.participating().count();
    if unnamed > 0 {
        println!();
        print_key_value("Without a name (ignored)", &unnamed.to_string());
    }
    println!();

    Ok(())
}

pub fn cmd_tree(root: PathBuf) -> Result<()> {
    let session = Session::load(&root)?;
    let workspace = &session.workspace;
    let graph = DependencyGraph::build(workspace, &session.manifests)?;
    let order = GraphWalker::new(workspace, &session.manifests).walk_order()?;

    print_section_header("Dependency Tree", SectionStyle::Primary);

    for package in order {
        let name = package.display_name();
        println!("{}", name.bold().white());

        let deps = graph.dependencies(&name)?;
        if deps.is_empty() {
            println!("  {} {}", "→".cyan(), "(no local dependencies)".bright_black());
        }
        for (dep, kind) in deps {
            println!("  {} {} {}", "→".cyan(), dep, format!("({})", kind).bright_black());
        }
    }

    let roots = graph.roots();
    println!();
    print_key_value("Top-level packages", &roots.join(", "));
    println!();

    Ok(())
}
