// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Validates reports and fails the run on stale or broken fixups.

use anyhow::Result;

use super::{BlobStatus, PatchReport};

/// Validate the report.
///
/// Failed blobs (stale signature patches, unpatchable files) fail the run:
/// silently skipping them would ship a broken binary. Registered blobs
/// missing from the dump only warn, since partial dumps are routine.
///
/// # Errors
/// Returns an error if any blob failed to patch.
pub fn validate_report(report: &PatchReport) -> Result<()> {
    if report.totals.blobs.missing > 0 {
        for (path, outcome) in &report.blobs {
            if matches!(outcome.status, BlobStatus::Missing) {
                eprintln!("WARNING: {path}: registered blob not present in dump");
            }
        }
    }
    if report.totals.blobs.failed > 0 {
        for (path, outcome) in &report.blobs {
            if let BlobStatus::Failed { message } = &outcome.status {
                eprintln!("ERROR: {path}: {message}");
            }
        }
        return Err(anyhow::anyhow!(
            "Failed blobs found in the report: {} blob(s) could not be patched",
            report.totals.blobs.failed
        ));
    }
    Ok(())
}
