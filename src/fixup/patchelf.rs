// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Rewrites ELF dependency tables by invoking `patchelf`.
//!
//! Adding or replacing a `DT_NEEDED` entry may grow the dynamic string table,
//! which requires reflowing section offsets. That engineering lives in
//! `patchelf`; this module only drives it as a subprocess with a timeout.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

/// Default timeout for a single `patchelf` invocation.
pub(crate) const DEFAULT_PATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Result type for dependency-table edits.
pub type PatchResult<T> = std::result::Result<T, PatchError>;

/// Errors that can occur while rewriting a dependency table.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Command not found: {command} (blob: {path:?})")]
    CommandNotFound { command: String, path: PathBuf },
    #[error("Command failed: {command} (blob: {path:?})")]
    CommandFailed {
        command: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Command timed out after {timeout:?}: {command} (blob: {path:?})")]
    CommandTimeout {
        command: String,
        path: PathBuf,
        timeout: Duration,
    },
    #[error("Patching failed for blob {path:?}: {reason}")]
    PatchFailed { path: PathBuf, reason: String },
}

/// Replace a `DT_NEEDED` entry of the blob at `path`.
///
/// The caller is expected to have checked that `old` is actually declared;
/// `patchelf` itself treats an absent entry as a no-op as well.
///
/// # Errors
/// Returns an error if `patchelf` is missing, fails, or times out.
pub(crate) fn replace_needed(path: &Path, old: &str, new: &str) -> PatchResult<()> {
    run(path, &["--replace-needed", old, new])
}

/// Append a `DT_NEEDED` entry to the blob at `path`.
///
/// # Errors
/// Returns an error if `patchelf` is missing, fails, or times out.
pub(crate) fn add_needed(path: &Path, name: &str) -> PatchResult<()> {
    run(path, &["--add-needed", name])
}

fn run(path: &Path, args: &[&str]) -> PatchResult<()> {
    let mut child = match std::process::Command::new("patchelf")
        .args(args)
        .arg(path)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(PatchError::CommandNotFound {
                    command: "patchelf".to_string(),
                    path: path.to_path_buf(),
                });
            }
            return Err(PatchError::CommandFailed {
                command: "patchelf".to_string(),
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let exit_status = wait_with_timeout(&mut child, DEFAULT_PATCH_TIMEOUT, "patchelf", path)?;

    if exit_status.success() {
        Ok(())
    } else {
        Err(PatchError::PatchFailed {
            path: path.to_path_buf(),
            reason: format!(
                "patchelf {} exited with non-zero status: {}",
                args.join(" "),
                exit_status.code().unwrap_or(-1)
            ),
        })
    }
}

/// Wait for a child process to complete with a timeout.
///
/// Uses platform-specific APIs to wait for the process without polling. If
/// the timeout is reached, the process is killed.
///
/// # Returns
/// - `Ok(ExitStatus)` if the process completed within the timeout
/// - `Err(PatchError::CommandTimeout)` if the process timed out
/// - `Err(PatchError::CommandFailed)` if there was an error waiting for the process
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    command: &str,
    blob_path: &Path,
) -> PatchResult<std::process::ExitStatus> {
    // Returns status if the process completed within the timeout, none otherwise.
    // In the case of an error it propagates the error.
    if let Some(status) = child
        .wait_timeout(timeout)
        .map_err(|e| PatchError::CommandFailed {
            command: command.to_string(),
            path: blob_path.to_path_buf(),
            source: e,
        })?
    {
        // Check if the process completed successfully or was terminated by a signal.
        if status.code().is_some() {
            Ok(status)
        } else if let Some(signal) = status.signal() {
            Err(PatchError::CommandFailed {
                command: command.to_string(),
                path: blob_path.to_path_buf(),
                source: std::io::Error::other(format!("Process terminated by signal: {signal}")),
            })
        } else {
            Err(PatchError::CommandFailed {
                command: command.to_string(),
                path: blob_path.to_path_buf(),
                source: std::io::Error::other("Unknown process termination"),
            })
        }
    } else {
        // Timeout has been reached - kill the process
        let _ = child.kill();
        let _ = child.wait();
        Err(PatchError::CommandTimeout {
            command: command.to_string(),
            path: blob_path.to_path_buf(),
            timeout,
        })
    }
}

/// Check whether `patchelf` is available on this system.
///
/// Used by tests to skip end-to-end patching when the tool is missing.
#[cfg(test)]
pub(crate) fn is_available() -> bool {
    std::process::Command::new("patchelf")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixup::elf::Elf;
    use std::path::PathBuf;

    fn get_testdata_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
    }

    /// Copy the generated shared-object fixture into a temp dir, or skip.
    fn fixture_copy(dir: &tempfile::TempDir) -> Option<PathBuf> {
        let src = get_testdata_dir().join("libblob.so");
        if !src.exists() {
            eprintln!(
                "Skipping test: fixture '{}' not found (gcc not available at build time).",
                src.display()
            );
            return None;
        }
        let dest = dir.path().join("libblob.so");
        std::fs::copy(&src, &dest).expect("Should copy fixture");
        Some(dest)
    }

    #[test]
    fn test_add_needed_via_patchelf() {
        if !is_available() {
            eprintln!("Skipping test: patchelf not available");
            return;
        }
        let dir = tempfile::TempDir::new().unwrap();
        let Some(blob) = fixture_copy(&dir) else {
            return;
        };

        add_needed(&blob, "liblog.so").expect("patchelf should add the entry");
        let elf = Elf::from_path(&blob).expect("Should parse patched blob");
        assert!(
            elf.needed().iter().any(|dep| dep == "liblog.so"),
            "liblog.so should be declared after patching, got: {:?}",
            elf.needed()
        );
    }

    #[test]
    fn test_replace_needed_via_patchelf() {
        if !is_available() {
            eprintln!("Skipping test: patchelf not available");
            return;
        }
        let dir = tempfile::TempDir::new().unwrap();
        let Some(blob) = fixture_copy(&dir) else {
            return;
        };

        let elf = Elf::from_path(&blob).expect("Should parse fixture");
        let Some(old) = elf.needed().first().cloned() else {
            eprintln!("Skipping test: fixture has no DT_NEEDED entries");
            return;
        };

        replace_needed(&blob, &old, "libreplaced.so").expect("patchelf should replace the entry");
        let patched = Elf::from_path(&blob).expect("Should parse patched blob");
        assert!(patched.needed().iter().any(|dep| dep == "libreplaced.so"));
        assert!(!patched.needed().iter().any(|dep| dep == &old));
    }

    #[test]
    fn test_patch_missing_file_fails() {
        if !is_available() {
            eprintln!("Skipping test: patchelf not available");
            return;
        }
        let result = add_needed(Path::new("/nonexistent/libmissing.so"), "liblog.so");
        assert!(matches!(result, Err(PatchError::PatchFailed { .. })));
    }
}
