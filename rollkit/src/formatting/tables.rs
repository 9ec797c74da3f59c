//! Table formatting utilities using comfy-table.

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use rollkit_core::release::ReleasePackage;
use rollkit_core::{SyncOutcome, TaskResult};

use super::status::Status;

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Prints packages as (name, version, path) rows.
pub fn print_package_table(packages: &[(String, String, String)]) {
    let mut table = styled_table(&["Package", "Version", "Path"]);

    for (name, version, path) in packages {
        table.add_row(vec![
            Cell::new(name).fg(Color::White),
            Cell::new(version).fg(Color::Cyan),
            Cell::new(path).fg(Color::DarkGrey),
        ]);
    }

    println!("{}", table);
}

/// Prints one row per script run with its status.
pub fn print_task_table(results: &[TaskResult]) {
    let mut table = styled_table(&["Status", "Package", "Details"]);

    for result in results {
        if result.success {
            table.add_row(vec![
                Cell::new(Status::Success.symbol()).fg(Color::Green),
                Cell::new(&result.package_name).fg(Color::White),
                Cell::new(""),
            ]);
        } else {
            let details = if result.stderr.trim().is_empty() {
                format!("{} failed", result.task_name)
            } else {
                result.stderr.trim().to_string()
            };
            table.add_row(vec![
                Cell::new(Status::Error.symbol()).fg(Color::Red),
                Cell::new(&result.package_name).fg(Color::Red),
                Cell::new(details).fg(Color::Red),
            ]);
        }
    }

    println!("{}", table);
}

/// Prints version bumps with their reasons.
pub fn print_release_table(packages: &[ReleasePackage]) {
    let mut table = styled_table(&["Package", "Version", "Tag", "Reasons"]);

    for package in packages {
        table.add_row(vec![
            Cell::new(&package.name).fg(Color::White),
            Cell::new(format!("{} → {}", package.old_version, package.new_version)).fg(Color::Cyan),
            Cell::new(package.tag.as_deref().unwrap_or("-")).fg(Color::DarkGrey),
            Cell::new(package.reasons.join("\n")),
        ]);
    }

    println!("{}", table);
}

/// Prints packages published by a sync.
pub fn print_sync_table(outcomes: &[SyncOutcome]) {
    let mut table = styled_table(&["Package", "Version", "Dist-tag", "Reason"]);

    for outcome in outcomes.iter().filter(|o| o.published()) {
        let version = outcome
            .version
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&outcome.package).fg(Color::White),
            Cell::new(format!("{} → {}", outcome.current, version)).fg(Color::Cyan),
            Cell::new(outcome.tag.as_deref().unwrap_or("-")).fg(Color::DarkGrey),
            Cell::new(outcome.reason.map(|r| r.to_string()).unwrap_or_default()),
        ]);
    }

    println!("{}", table);
}
