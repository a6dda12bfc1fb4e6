// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Statistics over blob and operation outcomes.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{BlobOutcome, BlobStatus};
use crate::fixup::OpStatus;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct BlobTotals {
    pub(crate) patched: usize,
    pub(crate) clean: usize,
    pub(crate) planned: usize,
    pub(crate) missing: usize,
    pub(crate) failed: usize,
    pub(crate) total: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct OperationTotals {
    pub(crate) applied: usize,
    pub(crate) already_applied: usize,
    pub(crate) planned: usize,
    pub(crate) total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ReportTotals {
    pub(crate) blobs: BlobTotals,
    pub(crate) operations: OperationTotals,
}

impl ReportTotals {
    #[must_use]
    pub(crate) fn new(blobs: &BTreeMap<String, BlobOutcome>) -> Self {
        let mut totals = Self {
            blobs: BlobTotals::default(),
            operations: OperationTotals::default(),
        };

        for outcome in blobs.values() {
            totals.blobs.total += 1;
            match &outcome.status {
                BlobStatus::Patched => totals.blobs.patched += 1,
                BlobStatus::Clean => totals.blobs.clean += 1,
                BlobStatus::Planned => totals.blobs.planned += 1,
                BlobStatus::Missing => totals.blobs.missing += 1,
                BlobStatus::Failed { .. } => totals.blobs.failed += 1,
            }
            for op in &outcome.operations {
                totals.operations.total += 1;
                match op.status {
                    OpStatus::Applied => totals.operations.applied += 1,
                    OpStatus::AlreadyApplied => totals.operations.already_applied += 1,
                    OpStatus::Planned => totals.operations.planned += 1,
                }
            }
        }
        totals
    }
}
