// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Patch report: applies the registry to a dump and records the outcome.

mod console;
mod totals;
mod validate;

pub use console::summarize_report;
pub use validate::validate_report;

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;

use crate::device;
use crate::dump::Dump;
use crate::fixup::{FixupRegistry, LibFixupAction, OpOutcome, OpStatus};
use totals::ReportTotals;

/// Outcome of one blob's fixup chain.
#[derive(Debug, Clone, Serialize)]
pub(crate) enum BlobStatus {
    /// At least one operation modified the blob.
    Patched,
    /// Every operation was already in effect.
    Clean,
    /// Dry run: at least one operation would modify the blob.
    Planned,
    /// The registered path is not present in this dump. Partial dumps are
    /// normal, so this only warns.
    Missing,
    /// The chain failed; the message names the cause (e.g. a stale signature).
    Failed { message: String },
}

#[derive(Debug, Serialize)]
pub(crate) struct BlobOutcome {
    pub(crate) status: BlobStatus,
    pub(crate) operations: Vec<OpOutcome>,
}

// Use BTreeMap to ensure alphabetical order of blobs when serializing to JSON.
type ReportBlobs = BTreeMap<String, BlobOutcome>;

#[derive(Debug, Serialize)]
pub struct PatchReport {
    pub(crate) device: String,
    pub(crate) vendor: String,
    pub(crate) dump: String,
    pub(crate) dry_run: bool,
    pub(crate) namespace_imports: Vec<String>,
    pub(crate) totals: ReportTotals,
    pub(crate) blobs: ReportBlobs,
    /// Library installs renamed by the partition rules, old relative path to
    /// new relative path.
    pub(crate) renames: BTreeMap<String, String>,
    /// Libraries excluded from installation by a remove rule.
    pub(crate) removals: Vec<String>,
}

impl PatchReport {
    /// Apply every registered fixup chain against the dump and collect the
    /// outcomes. Blobs are processed in parallel; the registry is only read.
    #[must_use]
    pub fn new(registry: &FixupRegistry, dump: &Dump, dry_run: bool) -> Self {
        let targets: Vec<&String> = registry
            .blob_entries()
            .flat_map(|(paths, _)| paths.iter())
            .collect();

        let blobs: ReportBlobs = targets
            .par_iter()
            .map(|path| {
                (
                    path.to_string(),
                    Self::patch_one(registry, dump, path, dry_run),
                )
            })
            .collect();

        let (renames, removals) = lib_renames(registry, dump);
        Self {
            device: device::DEVICE.to_string(),
            vendor: device::VENDOR.to_string(),
            dump: dump.root().to_string_lossy().to_string(),
            dry_run,
            namespace_imports: registry.namespace_imports().to_vec(),
            totals: ReportTotals::new(&blobs),
            blobs,
            renames,
            removals,
        }
    }

    fn patch_one(registry: &FixupRegistry, dump: &Dump, path: &str, dry_run: bool) -> BlobOutcome {
        let Some(on_disk) = dump.resolve(path) else {
            return BlobOutcome {
                status: BlobStatus::Missing,
                operations: Vec::new(),
            };
        };
        match registry.patch_blob(path, on_disk, dry_run) {
            Ok(operations) => BlobOutcome {
                status: status_of(&operations),
                operations,
            },
            Err(e) => BlobOutcome {
                status: BlobStatus::Failed {
                    message: error_chain(&e),
                },
                operations: Vec::new(),
            },
        }
    }
}

fn status_of(operations: &[OpOutcome]) -> BlobStatus {
    if operations.iter().any(|op| op.status == OpStatus::Applied) {
        BlobStatus::Patched
    } else if operations.iter().any(|op| op.status == OpStatus::Planned) {
        BlobStatus::Planned
    } else {
        BlobStatus::Clean
    }
}

/// Run every shared library in the dump through the partition name rules.
fn lib_renames(registry: &FixupRegistry, dump: &Dump) -> (BTreeMap<String, String>, Vec<String>) {
    let mut renames = BTreeMap::new();
    let mut removals = Vec::new();

    for relative in dump.files().keys() {
        let Some((dir, file)) = relative.rsplit_once('/') else {
            continue;
        };
        let Some(lib) = file.strip_suffix(".so") else {
            continue;
        };
        match registry.lookup_lib_fixup(lib, Dump::partition(relative)) {
            Some(LibFixupAction::Rename(renamed)) => {
                renames.insert(relative.clone(), format!("{dir}/{renamed}.so"));
            }
            Some(LibFixupAction::Remove) => removals.push(relative.clone()),
            None => {}
        }
    }
    (renames, removals)
}

/// Render an error with its full source chain, used for the report's failure
/// messages so they name both the operation and the underlying cause.
fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
