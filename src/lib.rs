// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! A tool for patching proprietary vendor blobs after extraction.
//!
//! This crate provides functionality to:
//! - Declare per-device fixup registries: blob paths mapped to ordered patch
//!   chains, library name rules, and namespace imports
//! - Rewrite declared dependencies (`DT_NEEDED`) of ELF blobs, tolerate
//!   already-fixed blobs, and patch raw byte content by regex or exact
//!   hex signature
//! - Walk an extracted dump tree, apply matching fixups in parallel, and
//!   generate reports on the patch status of every registered blob

pub mod device;
pub mod dump;
pub mod fixup;
pub mod report;

// Re-export key types for convenience
pub use dump::Dump;
pub use fixup::{blob_fixup, BlobFixup, Elf, FixupRegistry, LibFixupRule};
pub use report::{summarize_report, validate_report, PatchReport};
