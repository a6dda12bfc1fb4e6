// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Walks an extracted vendor dump tree and indexes its regular files by
//! repository-relative path.

use path_clean::PathClean;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Result type for dump operations.
pub type DumpResult<T> = std::result::Result<T, DumpError>;

/// Errors that can occur while reading a dump tree.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("Dump root is not a directory: {path:?}")]
    NotADirectory { path: PathBuf },
    #[error("Failed to walk dump directory: {path:?}")]
    WalkDirFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// An extracted dump tree: the blobs the fixup registry is matched against.
///
/// Only regular files count as blobs; directories and symlinks are skipped
/// (symlinked library names are aliases of blobs indexed elsewhere).
pub struct Dump {
    root: PathBuf,
    files: BTreeMap<String, PathBuf>,
}

impl Dump {
    /// Index the dump tree rooted at `root`.
    ///
    /// # Errors
    /// Returns an error if `root` is not a directory or cannot be walked.
    pub fn new(root: &Path) -> DumpResult<Self> {
        if !root.is_dir() {
            return Err(DumpError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(root) {
            let e = entry.map_err(|e| DumpError::WalkDirFailed {
                path: root.to_path_buf(),
                source: e,
            })?;
            if !e.file_type().is_file() {
                continue;
            }
            // Files are keyed the way the registry keys them: relative to the
            // dump root, normalized.
            let relative = e
                .path()
                .strip_prefix(root)
                .unwrap_or(e.path())
                .clean()
                .to_string_lossy()
                .into_owned();
            files.insert(relative, e.path().to_path_buf());
        }

        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    /// Get the dump root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All indexed blobs, keyed by repository-relative path.
    #[must_use]
    pub fn files(&self) -> &BTreeMap<String, PathBuf> {
        &self.files
    }

    /// Resolve a repository-relative path to its on-disk location, if the
    /// blob is present in this dump.
    #[must_use]
    pub fn resolve(&self, relative: &str) -> Option<&Path> {
        self.files.get(relative).map(PathBuf::as_path)
    }

    /// The installation partition a blob belongs to (its first path
    /// component, e.g. `vendor` for `vendor/lib64/libuuid.so`).
    #[must_use]
    pub fn partition(relative: &str) -> &str {
        relative.split('/').next().unwrap_or(relative)
    }
}
