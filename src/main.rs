// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
mod args;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::Path;

use args::Args;
use blob_patcher::device;
use blob_patcher::dump::Dump;
use blob_patcher::fixup::FixupRegistry;
use blob_patcher::report::{summarize_report, validate_report, PatchReport};

fn main() -> Result<()> {
    let args = Args::parse();
    let registry = load_registry()?;
    let dump = load_dump(&args.dump)?;
    let report = PatchReport::new(&registry, &dump, args.dry_run);
    write_report_to_file(&report, &args.report)?;
    summarize_report(&report);
    validate_report(&report)
}

/// Build and validate the device registry.
///
/// # Errors
/// Returns an error if the patch tables are misconfigured. This aborts
/// before any blob is touched.
fn load_registry() -> Result<FixupRegistry> {
    let registry = device::registry().with_context(|| {
        format!(
            "Invalid fixup registry for device: {}/{}",
            device::VENDOR,
            device::DEVICE
        )
    })?;
    eprintln!(
        "Namespace imports: {}",
        registry.namespace_imports().join(", ")
    );
    Ok(registry)
}

/// Index the dump tree from a filepath.
///
/// # Errors
/// Returns an error if the dump directory cannot be walked.
fn load_dump(path: &Path) -> Result<Dump> {
    eprintln!("Indexing dump: dump={}", path.display());

    let dump = Dump::new(path)
        .with_context(|| format!("Failed to index dump: {}", path.display()))?;

    eprintln!(
        "Indexing completed: dump={}, files={}",
        path.display(),
        dump.files().len()
    );
    Ok(dump)
}

/// Write the report to a file.
///
/// # Errors
/// Returns an error if the report cannot be serialized to JSON or if the file cannot be created.
fn write_report_to_file(report: &PatchReport, dest: &Path) -> Result<()> {
    eprintln!("Writing report to file: file={}", dest.display());
    let file = File::create(dest)
        .with_context(|| format!("Failed to create JSON output file: {}", dest.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("Failed to serialize report to JSON: {}", dest.display()))?;
    Ok(())
}
