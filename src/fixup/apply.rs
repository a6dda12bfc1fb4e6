// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Applies a fixup chain to a blob on disk.
//!
//! Byte-level operations mutate an in-memory buffer. Dependency-table
//! operations compute the expected `DT_NEEDED` list up front, run `patchelf`
//! on a scratch copy next to the blob, and verify the result against the
//! computed list. The blob itself is written once, after the whole chain
//! succeeded, so a failing operation leaves it untouched.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::elf::{Elf, ElfError};
use super::ops::{self, BlobFixup, BlobFixupOp, OpError};
use super::patchelf::{self, PatchError};

/// Result type for chain application.
pub type ApplyResult<T> = std::result::Result<T, ApplyError>;

/// Errors that can occur while applying a fixup chain to a blob.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Failed to read blob: {path:?}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write blob: {path:?}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "Dependency table mismatch after patching {path:?}: expected {expected:?}, got {actual:?}"
    )]
    NeededMismatch {
        path: PathBuf,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("Elf error: {0}")]
    Elf(#[from] ElfError),
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),
    #[error("Operation error: {0}")]
    Op(#[from] OpError),
}

/// How a single operation of a chain turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OpStatus {
    /// The blob was modified.
    Applied,
    /// The operation's effect was already in place (tolerated drift).
    AlreadyApplied,
    /// Dry run: the operation would modify the blob.
    Planned,
}

/// Outcome of one operation in an applied chain.
#[derive(Debug, Clone, Serialize)]
pub struct OpOutcome {
    pub op: String,
    pub status: OpStatus,
}

/// Apply a fixup chain to the blob at `path`, in order.
///
/// With `dry_run` set, no file is written and no subprocess runs; operations
/// that would modify the blob are reported as [`OpStatus::Planned`].
///
/// # Errors
/// Returns an error when the blob cannot be read or written, a dependency
/// edit requires an ELF the blob is not, `patchelf` fails or leaves a
/// dependency table other than the computed one, or a signature patch is
/// stale (missing or ambiguous match).
pub(crate) fn apply_chain(
    fixup: &BlobFixup,
    path: &Path,
    dry_run: bool,
) -> ApplyResult<Vec<OpOutcome>> {
    let mut data = read_blob(path)?;
    let mut changed = false;
    let mut scratch: Option<NamedTempFile> = None;
    let mut outcomes = Vec::with_capacity(fixup.ops().len());

    for op in fixup.ops() {
        let status = match op {
            BlobFixupOp::ReplaceNeeded { old, new } => {
                let mut expected = Elf::from_bytes(&data, path)?.needed().to_vec();
                if !ops::replace_needed(&mut expected, old, new) {
                    OpStatus::AlreadyApplied
                } else if dry_run {
                    OpStatus::Planned
                } else {
                    let staged = stage(&mut scratch, path, &data)?;
                    patchelf::replace_needed(&staged, old, new)?;
                    data = read_blob(&staged)?;
                    verify_needed(&data, path, &expected)?;
                    changed = true;
                    OpStatus::Applied
                }
            }
            BlobFixupOp::AddNeeded { name } => {
                let mut expected = Elf::from_bytes(&data, path)?.needed().to_vec();
                if !ops::add_needed(&mut expected, name) {
                    OpStatus::AlreadyApplied
                } else if dry_run {
                    OpStatus::Planned
                } else {
                    let staged = stage(&mut scratch, path, &data)?;
                    patchelf::add_needed(&staged, name)?;
                    data = read_blob(&staged)?;
                    verify_needed(&data, path, &expected)?;
                    changed = true;
                    OpStatus::Applied
                }
            }
            BlobFixupOp::BinaryRegexReplace {
                pattern,
                replacement,
            } => {
                let regex = ops::compile_pattern(pattern)?;
                match ops::regex_replace(&data, &regex, replacement) {
                    Some(patched) => {
                        data = patched;
                        changed = true;
                        if dry_run {
                            OpStatus::Planned
                        } else {
                            OpStatus::Applied
                        }
                    }
                    None => OpStatus::AlreadyApplied,
                }
            }
            BlobFixupOp::SigReplace {
                signature,
                replacement,
            } => {
                let sig = ops::parse_hex(signature)?;
                let repl = ops::parse_hex(replacement)?;
                ops::sig_replace(&mut data, &sig, &repl, signature)?;
                changed = true;
                if dry_run {
                    OpStatus::Planned
                } else {
                    OpStatus::Applied
                }
            }
        };
        outcomes.push(OpOutcome {
            op: op.to_string(),
            status,
        });
    }

    if changed && !dry_run {
        write_blob(path, &data)?;
    }
    Ok(outcomes)
}

fn read_blob(path: &Path) -> ApplyResult<Vec<u8>> {
    fs::read(path).map_err(|e| ApplyError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_blob(path: &Path, data: &[u8]) -> ApplyResult<()> {
    fs::write(path, data).map_err(|e| ApplyError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Refresh the scratch copy with the current buffer state, creating it next
/// to the blob on first use. The scratch file is deleted on drop, so a
/// failed chain leaves no leftovers.
fn stage(
    scratch: &mut Option<NamedTempFile>,
    path: &Path,
    data: &[u8],
) -> ApplyResult<PathBuf> {
    let file = match scratch.take() {
        Some(file) => file,
        None => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            NamedTempFile::new_in(dir).map_err(|e| ApplyError::WriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?
        }
    };
    fs::write(file.path(), data).map_err(|e| ApplyError::WriteFailed {
        path: file.path().to_path_buf(),
        source: e,
    })?;
    let staged = file.path().to_path_buf();
    *scratch = Some(file);
    Ok(staged)
}

/// A dependency edit must leave exactly the computed list behind. Anything
/// else means `patchelf` handled the table differently than declared (e.g.
/// kept a duplicate entry) and the result cannot be trusted.
fn verify_needed(data: &[u8], path: &Path, expected: &[String]) -> ApplyResult<()> {
    let patched = Elf::from_bytes(data, path)?;
    if patched.needed() != expected {
        return Err(ApplyError::NeededMismatch {
            path: path.to_path_buf(),
            expected: expected.to_vec(),
            actual: patched.needed().to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixup::blob_fixup;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn blob_with(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    /// Copy the generated shared-object fixture into a temp dir, or skip.
    fn fixture_copy(dir: &tempfile::TempDir) -> Option<PathBuf> {
        let src = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("testdata")
            .join("libblob.so");
        if !src.exists() {
            eprintln!(
                "Skipping test: fixture '{}' not found (gcc not available at build time).",
                src.display()
            );
            return None;
        }
        let dest = dir.path().join("libblob.so");
        fs::copy(&src, &dest).expect("Should copy fixture");
        Some(dest)
    }

    #[test]
    fn test_regex_chain_patches_in_place() {
        let file = blob_with(b"head ro.factory.factory_binary tail");
        let fixup = blob_fixup().binary_regex_replace(
            "ro\\.factory\\.factory_binary",
            b"ro.vendor.factory_binary\x00",
        );

        let outcomes = apply_chain(&fixup, file.path(), false).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, OpStatus::Applied);

        let patched = fs::read(file.path()).unwrap();
        assert_eq!(&patched, b"head ro.vendor.factory_binary\x00 tail");
    }

    #[test]
    fn test_regex_chain_noop_when_already_patched() {
        let file = blob_with(b"head ro.vendor.factory_binary\x00 tail");
        let fixup = blob_fixup().binary_regex_replace(
            "ro\\.factory\\.factory_binary",
            b"ro.vendor.factory_binary\x00",
        );

        let outcomes = apply_chain(&fixup, file.path(), false).unwrap();
        assert_eq!(outcomes[0].status, OpStatus::AlreadyApplied);
    }

    #[test]
    fn test_dry_run_leaves_file_untouched() {
        let content: &[u8] = b"head ro.factory.factory_binary tail";
        let file = blob_with(content);
        let fixup = blob_fixup().binary_regex_replace(
            "ro\\.factory\\.factory_binary",
            b"ro.vendor.factory_binary\x00",
        );

        let outcomes = apply_chain(&fixup, file.path(), true).unwrap();
        assert_eq!(outcomes[0].status, OpStatus::Planned);
        assert_eq!(fs::read(file.path()).unwrap(), content);
    }

    #[test]
    fn test_sig_chain_applies_once() {
        let file = blob_with(&[0x00, 0x15, 0xaa, 0x08, 0x00, 0x40, 0xf9, 0xff]);
        let fixup = blob_fixup().sig_replace("15 aa 08", "03 00 80");

        let outcomes = apply_chain(&fixup, file.path(), false).unwrap();
        assert_eq!(outcomes[0].status, OpStatus::Applied);
        assert_eq!(
            fs::read(file.path()).unwrap(),
            vec![0x00, 0x03, 0x00, 0x80, 0x00, 0x40, 0xf9, 0xff]
        );
    }

    #[test]
    fn test_stale_signature_is_a_hard_failure() {
        let content: &[u8] = &[0x00, 0x01, 0x02, 0x03];
        let file = blob_with(content);
        let fixup = blob_fixup().sig_replace("15 aa", "03 00");

        let result = apply_chain(&fixup, file.path(), false);
        assert!(matches!(
            result,
            Err(ApplyError::Op(OpError::SignatureNotFound { .. }))
        ));
        // A failed chain must not leave a half-patched blob behind.
        assert_eq!(fs::read(file.path()).unwrap(), content);
    }

    #[test]
    fn test_failed_chain_discards_earlier_byte_edits() {
        let content: &[u8] = b"aaa tail";
        let file = blob_with(content);
        // The regex rewrite succeeds in the buffer; the stale signature then
        // fails the chain, and the earlier edit must not reach the disk.
        let fixup = blob_fixup()
            .binary_regex_replace("aaa", b"bbb")
            .sig_replace("15 aa", "03 00");

        let result = apply_chain(&fixup, file.path(), false);
        assert!(matches!(
            result,
            Err(ApplyError::Op(OpError::SignatureNotFound { .. }))
        ));
        assert_eq!(fs::read(file.path()).unwrap(), content);
    }

    #[test]
    fn test_needed_edit_on_non_elf_fails() {
        let file = blob_with(&[b'x'; 128]);
        let fixup = blob_fixup().add_needed("liblog.so");

        let result = apply_chain(&fixup, file.path(), false);
        assert!(matches!(result, Err(ApplyError::Elf(_))));
    }

    #[test]
    fn test_chain_order_later_ops_see_earlier_output() {
        let file = blob_with(b"aaa bbb");
        // First rewrite turns "aaa" into "ccc"; second only matches "ccc".
        let fixup = blob_fixup()
            .binary_regex_replace("aaa", b"ccc")
            .binary_regex_replace("ccc bbb", b"ddd eee");

        let outcomes = apply_chain(&fixup, file.path(), false).unwrap();
        assert!(outcomes.iter().all(|o| o.status == OpStatus::Applied));
        assert_eq!(fs::read(file.path()).unwrap(), b"ddd eee");
    }

    #[test]
    fn test_needed_chain_matches_computed_list() {
        if !patchelf::is_available() {
            eprintln!("Skipping test: patchelf not available");
            return;
        }
        let dir = tempfile::TempDir::new().unwrap();
        let Some(blob) = fixture_copy(&dir) else {
            return;
        };

        // The applied edit must land exactly where the list transform puts
        // it: appended once, with the existing entries in their old order.
        let mut expected = Elf::from_path(&blob).unwrap().needed().to_vec();
        expected.push("libadded.so".to_string());

        let fixup = blob_fixup().add_needed("libadded.so");
        let outcomes = apply_chain(&fixup, &blob, false).unwrap();
        assert_eq!(outcomes[0].status, OpStatus::Applied);
        assert_eq!(Elf::from_path(&blob).unwrap().needed(), expected);

        // A second pass finds the entry present and changes nothing.
        let outcomes = apply_chain(&fixup, &blob, false).unwrap();
        assert_eq!(outcomes[0].status, OpStatus::AlreadyApplied);
        assert_eq!(Elf::from_path(&blob).unwrap().needed(), expected);
    }

    #[test]
    fn test_failed_chain_discards_earlier_needed_edits() {
        if !patchelf::is_available() {
            eprintln!("Skipping test: patchelf not available");
            return;
        }
        let dir = tempfile::TempDir::new().unwrap();
        let Some(blob) = fixture_copy(&dir) else {
            return;
        };
        let original = fs::read(&blob).unwrap();

        // The dependency edit lands on the scratch copy; the stale signature
        // then fails the chain and the blob must be byte-identical.
        let fixup = blob_fixup()
            .add_needed("libadded.so")
            .sig_replace("de ad be ef de ad be ef de ad be ef", "00 00 00 00 00 00 00 00 00 00 00 00");

        let result = apply_chain(&fixup, &blob, false);
        assert!(matches!(
            result,
            Err(ApplyError::Op(OpError::SignatureNotFound { .. }))
        ));
        assert_eq!(fs::read(&blob).unwrap(), original);

        // The scratch copy is cleaned up with the failed chain.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, ["libblob.so"]);
    }

    #[test]
    fn test_verify_needed_rejects_unexpected_table() {
        let dir = tempfile::TempDir::new().unwrap();
        let Some(blob) = fixture_copy(&dir) else {
            return;
        };
        let data = fs::read(&blob).unwrap();
        let mut expected = Elf::from_bytes(&data, &blob).unwrap().needed().to_vec();

        assert!(verify_needed(&data, &blob, &expected).is_ok());

        expected.push("libnot_there.so".to_string());
        let result = verify_needed(&data, &blob, &expected);
        match result {
            Err(ApplyError::NeededMismatch { actual, .. }) => {
                assert!(!actual.iter().any(|dep| dep == "libnot_there.so"));
            }
            other => panic!("Expected NeededMismatch, got {:?}", other.err()),
        }
    }
}
