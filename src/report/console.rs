// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Formats and prints report summaries to the console.

use comfy_table::{Cell, Table};

use super::{BlobStatus, PatchReport};

/// Summarize the report to the console.
///
/// Prints the device and dump info, blob and operation statistics, and any
/// failed blobs with their messages.
pub fn summarize_report(report: &PatchReport) {
    println!(
        "Device: {}/{}{}",
        report.vendor,
        report.device,
        if report.dry_run { " (dry run)" } else { "" }
    );
    println!("Dump: {}\n", report.dump);

    println!("{}\n", blob_table(report));
    println!("{}\n", operation_table(report));

    if !report.renames.is_empty() || !report.removals.is_empty() {
        println!("{}\n", lib_fixup_table(report));
    }

    let failed = failed_blobs(report);
    if !failed.is_empty() {
        println!("{}", failed_blobs_table(&failed));
        println!("\nTotal: {} blob(s) failed to patch", failed.len());
    }
}

/// Create a table with the default preset styling.
fn default_table_preset() -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL_CONDENSED)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table
}

/// Create a table showing blob outcome statistics.
fn blob_table(report: &PatchReport) -> Table {
    let mut table = default_table_preset();
    table
        .set_header(vec![
            Cell::new("Blob Status").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Count").add_attribute(comfy_table::Attribute::Bold),
        ])
        .add_row(vec![
            Cell::new("Patched"),
            Cell::new(report.totals.blobs.patched),
        ])
        .add_row(vec![
            Cell::new("Clean"),
            Cell::new(report.totals.blobs.clean),
        ])
        .add_row(vec![
            Cell::new("Planned"),
            Cell::new(report.totals.blobs.planned),
        ])
        .add_row(vec![
            Cell::new("Missing"),
            Cell::new(report.totals.blobs.missing),
        ])
        .add_row(vec![
            Cell::new("Failed"),
            Cell::new(report.totals.blobs.failed),
        ])
        .add_row(vec![
            Cell::new("Total").add_attribute(comfy_table::Attribute::Bold),
            Cell::new(report.totals.blobs.total).add_attribute(comfy_table::Attribute::Bold),
        ]);
    table
}

/// Create a table showing operation outcome statistics.
fn operation_table(report: &PatchReport) -> Table {
    let mut table = default_table_preset();
    table
        .set_header(vec![
            Cell::new("Operation Status").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Count").add_attribute(comfy_table::Attribute::Bold),
        ])
        .add_row(vec![
            Cell::new("Applied"),
            Cell::new(report.totals.operations.applied),
        ])
        .add_row(vec![
            Cell::new("Already applied"),
            Cell::new(report.totals.operations.already_applied),
        ])
        .add_row(vec![
            Cell::new("Planned"),
            Cell::new(report.totals.operations.planned),
        ])
        .add_row(vec![
            Cell::new("Total").add_attribute(comfy_table::Attribute::Bold),
            Cell::new(report.totals.operations.total).add_attribute(comfy_table::Attribute::Bold),
        ]);
    table
}

/// Create a table showing library renames and removals.
fn lib_fixup_table(report: &PatchReport) -> Table {
    let mut table = default_table_preset();
    table.set_header(vec![
        Cell::new("Library").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Install As").add_attribute(comfy_table::Attribute::Bold),
    ]);
    for (old, new) in &report.renames {
        table.add_row(vec![Cell::new(old), Cell::new(new)]);
    }
    for removed in &report.removals {
        table.add_row(vec![Cell::new(removed), Cell::new("(removed)")]);
    }
    table
}

/// Collect failed blobs from the report.
fn failed_blobs(report: &PatchReport) -> Vec<(&str, &str)> {
    report
        .blobs
        .iter()
        .filter_map(|(path, outcome)| match &outcome.status {
            BlobStatus::Failed { message } => Some((path.as_str(), message.as_str())),
            _ => None,
        })
        .collect()
}

/// Create a table showing failed blobs and their messages.
fn failed_blobs_table(failed: &[(&str, &str)]) -> Table {
    let mut table = default_table_preset();
    table.set_header(vec![
        Cell::new("Blob").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Failure").add_attribute(comfy_table::Attribute::Bold),
    ]);
    for (path, message) in failed {
        table.add_row(vec![Cell::new(path), Cell::new(message)]);
    }
    table
}
