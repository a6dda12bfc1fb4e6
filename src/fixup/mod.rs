// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! The fixup registry: blob fixup chains, library name rules, and namespace
//! imports for one device, validated at construction.

mod apply;
mod elf;
mod lib_fixups;
mod ops;
mod patchelf;

pub use apply::{ApplyError, ApplyResult, OpOutcome, OpStatus};
pub use elf::{Elf, ElfError, ElfType};
pub use lib_fixups::{LibFixupAction, LibFixupRule};
pub use ops::{blob_fixup, BlobFixup, BlobFixupOp, OpError};
pub use patchelf::PatchError;

use path_clean::PathClean;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One registry entry: a set of blob paths sharing a fixup chain.
pub type BlobFixupEntry = (Vec<String>, BlobFixup);
/// One library rule entry: a set of library base names sharing a rule.
pub type LibFixupEntry = (Vec<String>, LibFixupRule);

/// Errors detected while building a registry. All of these are
/// misconfigurations of the patch tables and abort before any blob is
/// processed.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Blob path registered more than once: {path:?}")]
    DuplicateBlobKey { path: String },
    #[error("Library name registered more than once: {name:?}")]
    DuplicateLibKey { name: String },
    #[error("Empty fixup chain for blob: {path:?}")]
    EmptyChain { path: String },
    #[error("Invalid operation for blob {path:?}")]
    InvalidOp {
        path: String,
        #[source]
        source: OpError,
    },
}

/// Static mapping from blob paths to patch chains and from library names to
/// partition rules, plus the namespace import list.
///
/// Built once before any processing begins; afterwards all lookups are pure
/// reads, so the registry can be shared across worker threads without
/// locking.
pub struct FixupRegistry {
    blob_entries: Vec<BlobFixupEntry>,
    blob_index: HashMap<String, usize>,
    lib_index: HashMap<String, LibFixupRule>,
    namespace_imports: Vec<String>,
}

impl FixupRegistry {
    /// Build and validate a registry.
    ///
    /// # Errors
    /// Returns an error for overlapping blob or library keys, empty chains,
    /// or chains containing a malformed operation.
    pub fn new(
        blob_entries: Vec<BlobFixupEntry>,
        lib_entries: Vec<LibFixupEntry>,
        namespace_imports: Vec<String>,
    ) -> Result<Self, RegistryError> {
        let mut blob_index = HashMap::new();
        for (entry_idx, (paths, fixup)) in blob_entries.iter().enumerate() {
            for path in paths {
                if fixup.is_empty() {
                    return Err(RegistryError::EmptyChain { path: path.clone() });
                }
                fixup.validate().map_err(|e| RegistryError::InvalidOp {
                    path: path.clone(),
                    source: e,
                })?;
                if blob_index.insert(normalize_key(path), entry_idx).is_some() {
                    return Err(RegistryError::DuplicateBlobKey { path: path.clone() });
                }
            }
        }

        let mut lib_index = HashMap::new();
        for (names, rule) in lib_entries {
            for name in names {
                if lib_index.insert(name.clone(), rule).is_some() {
                    return Err(RegistryError::DuplicateLibKey { name });
                }
            }
        }

        Ok(Self {
            blob_entries,
            blob_index,
            lib_index,
            namespace_imports,
        })
    }

    /// Look up the fixup chain for an extracted blob's repository-relative
    /// path. Returns `None` when the blob needs no fixup.
    #[must_use]
    pub fn lookup_blob_fixup(&self, path: &str) -> Option<&BlobFixup> {
        self.blob_index
            .get(&normalize_key(path))
            .map(|&idx| &self.blob_entries[idx].1)
    }

    /// Look up the name rule for a shared-library base name headed for
    /// `partition`. Returns `None` when the name is unchanged.
    #[must_use]
    pub fn lookup_lib_fixup(&self, lib: &str, partition: &str) -> Option<LibFixupAction> {
        self.lib_index
            .get(lib)
            .and_then(|rule| rule.apply(lib, partition))
    }

    /// The ordered source-tree paths to resolve dependencies against,
    /// consumed once during setup.
    #[must_use]
    pub fn namespace_imports(&self) -> &[String] {
        &self.namespace_imports
    }

    /// All registered blob entries, in declaration order.
    pub fn blob_entries(&self) -> impl Iterator<Item = (&[String], &BlobFixup)> {
        self.blob_entries
            .iter()
            .map(|(paths, fixup)| (paths.as_slice(), fixup))
    }

    /// Apply the chain registered for `repo_path` to the on-disk blob at
    /// `blob`. Does nothing when the path is not registered.
    ///
    /// # Errors
    /// Returns an error when the chain fails; see [`apply's errors`](ApplyError).
    pub fn patch_blob(
        &self,
        repo_path: &str,
        blob: &Path,
        dry_run: bool,
    ) -> ApplyResult<Vec<OpOutcome>> {
        match self.lookup_blob_fixup(repo_path) {
            Some(fixup) => apply::apply_chain(fixup, blob, dry_run),
            None => Ok(Vec::new()),
        }
    }
}

/// Normalize a repository-relative path for index lookups.
fn normalize_key(path: &str) -> String {
    PathBuf::from(path).clean().to_string_lossy().into_owned()
}
