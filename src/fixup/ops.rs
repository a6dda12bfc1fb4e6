// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Blob fixup operations and the fluent chain builder.
//!
//! A [`BlobFixup`] is an ordered chain of patch operations applied to one
//! blob. Later operations see the result of earlier ones. The chain is
//! declared fluently and validated when the registry is built, so malformed
//! hex signatures or byte patterns are caught before any blob is touched.

use regex::bytes::{NoExpand, Regex};
use std::fmt;
use thiserror::Error;

/// Result type for fixup operations.
pub type OpResult<T> = std::result::Result<T, OpError>;

/// Errors raised by individual fixup operations.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("Invalid hex byte {byte:?} in signature {signature:?}")]
    InvalidHex { signature: String, byte: String },
    #[error(
        "Signature {signature:?} and replacement differ in length ({signature_len} vs {replacement_len} bytes)"
    )]
    LengthMismatch {
        signature: String,
        signature_len: usize,
        replacement_len: usize,
    },
    #[error("Invalid byte pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Signature not found: {signature:?}")]
    SignatureNotFound { signature: String },
    #[error("Signature is ambiguous ({matches} matches): {signature:?}")]
    AmbiguousSignature { signature: String, matches: usize },
}

/// A single binary patch operation.
///
/// Parameters are stored as declared; parsing and compilation happen when the
/// operation is validated or applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobFixupOp {
    /// Replace a `DT_NEEDED` entry. Tolerated no-op if `old` is absent.
    ReplaceNeeded { old: String, new: String },
    /// Append a `DT_NEEDED` entry. Idempotent.
    AddNeeded { name: String },
    /// Replace all regex matches in the raw byte content. The caller is
    /// responsible for a length-preserving replacement (pad with NUL bytes);
    /// offsets are not reflowed.
    BinaryRegexReplace {
        pattern: String,
        replacement: Vec<u8>,
    },
    /// Replace an exact byte sequence, given as space-separated hex bytes.
    /// Fails hard when the signature is missing or matches more than once,
    /// since either means the upstream binary changed and the patch is stale.
    SigReplace {
        signature: String,
        replacement: String,
    },
}

impl BlobFixupOp {
    /// Validate the operation's parameters without applying it.
    ///
    /// # Errors
    /// Returns an error for malformed hex, mismatched signature/replacement
    /// lengths, or a byte pattern that does not compile.
    pub(crate) fn validate(&self) -> OpResult<()> {
        match self {
            Self::ReplaceNeeded { .. } | Self::AddNeeded { .. } => Ok(()),
            Self::BinaryRegexReplace { pattern, .. } => {
                compile_pattern(pattern)?;
                Ok(())
            }
            Self::SigReplace {
                signature,
                replacement,
            } => {
                let sig = parse_hex(signature)?;
                let repl = parse_hex(replacement)?;
                if sig.len() == repl.len() {
                    Ok(())
                } else {
                    Err(OpError::LengthMismatch {
                        signature: signature.clone(),
                        signature_len: sig.len(),
                        replacement_len: repl.len(),
                    })
                }
            }
        }
    }
}

impl fmt::Display for BlobFixupOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplaceNeeded { old, new } => write!(f, "replace-needed({old} -> {new})"),
            Self::AddNeeded { name } => write!(f, "add-needed({name})"),
            Self::BinaryRegexReplace { pattern, .. } => write!(f, "binary-regex-replace({pattern})"),
            Self::SigReplace { signature, .. } => write!(f, "sig-replace({signature})"),
        }
    }
}

/// An ordered chain of patch operations for one blob (or one set of blobs
/// sharing identical treatment).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobFixup {
    ops: Vec<BlobFixupOp>,
}

/// Start an empty fixup chain.
#[must_use]
pub fn blob_fixup() -> BlobFixup {
    BlobFixup::default()
}

impl BlobFixup {
    /// Replace a declared shared-library dependency.
    #[must_use]
    pub fn replace_needed(mut self, old: &str, new: &str) -> Self {
        self.ops.push(BlobFixupOp::ReplaceNeeded {
            old: old.to_string(),
            new: new.to_string(),
        });
        self
    }

    /// Add a declared shared-library dependency.
    #[must_use]
    pub fn add_needed(mut self, name: &str) -> Self {
        self.ops.push(BlobFixupOp::AddNeeded {
            name: name.to_string(),
        });
        self
    }

    /// Replace all matches of a byte-pattern regex in the blob's content.
    #[must_use]
    pub fn binary_regex_replace(mut self, pattern: &str, replacement: &[u8]) -> Self {
        self.ops.push(BlobFixupOp::BinaryRegexReplace {
            pattern: pattern.to_string(),
            replacement: replacement.to_vec(),
        });
        self
    }

    /// Replace an exact byte signature (space-separated hex) in the blob.
    #[must_use]
    pub fn sig_replace(mut self, signature: &str, replacement: &str) -> Self {
        self.ops.push(BlobFixupOp::SigReplace {
            signature: signature.to_string(),
            replacement: replacement.to_string(),
        });
        self
    }

    /// Get the ordered operations of the chain.
    #[must_use]
    pub fn ops(&self) -> &[BlobFixupOp] {
        &self.ops
    }

    /// Check whether the chain has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Validate every operation in the chain.
    ///
    /// # Errors
    /// Returns the first operation error encountered.
    pub(crate) fn validate(&self) -> OpResult<()> {
        for op in &self.ops {
            op.validate()?;
        }
        Ok(())
    }
}

/// Parse a space-separated hex byte signature like `"15 aa 08 00"`.
///
/// # Errors
/// Returns an error for tokens that are not exactly one hex byte.
pub(crate) fn parse_hex(signature: &str) -> OpResult<Vec<u8>> {
    signature
        .split_whitespace()
        .map(|token| {
            if token.len() == 2 {
                u8::from_str_radix(token, 16).ok()
            } else {
                None
            }
            .ok_or_else(|| OpError::InvalidHex {
                signature: signature.to_string(),
                byte: token.to_string(),
            })
        })
        .collect()
}

/// Compile a byte-pattern regex.
///
/// # Errors
/// Returns an error if the pattern does not compile.
pub(crate) fn compile_pattern(pattern: &str) -> OpResult<Regex> {
    Regex::new(pattern).map_err(|e| OpError::InvalidPattern {
        pattern: pattern.to_string(),
        source: e,
    })
}

/// Replace every exact match of `old` in a dependency list with `new`.
///
/// The first occurrence is replaced in place, preserving the order of all
/// other entries; further occurrences of `old` are dropped so `new` ends up
/// present exactly once. An absent `old` is a tolerated no-op (the dependency
/// may already have been fixed upstream).
///
/// Returns `true` if the list changed.
pub(crate) fn replace_needed(needed: &mut Vec<String>, old: &str, new: &str) -> bool {
    if !needed.iter().any(|entry| entry == old) {
        return false;
    }
    let mut replaced = false;
    needed.retain_mut(|entry| {
        if entry == old {
            if replaced {
                return false;
            }
            new.clone_into(entry);
            replaced = true;
        }
        true
    });
    true
}

/// Append `name` to a dependency list if not already present.
///
/// Returns `true` if the list changed.
pub(crate) fn add_needed(needed: &mut Vec<String>, name: &str) -> bool {
    if needed.iter().any(|entry| entry == name) {
        return false;
    }
    needed.push(name.to_string());
    true
}

/// Replace all matches of `pattern` in `data` with `replacement` (taken
/// literally, no capture-group expansion).
///
/// Returns the patched buffer, or `None` when nothing matched.
pub(crate) fn regex_replace(data: &[u8], pattern: &Regex, replacement: &[u8]) -> Option<Vec<u8>> {
    if !pattern.is_match(data) {
        return None;
    }
    Some(pattern.replace_all(data, NoExpand(replacement)).into_owned())
}

/// Replace the single occurrence of `signature` in `data` with `replacement`.
///
/// `display` is the human-readable hex form used in error messages.
///
/// # Errors
/// Returns an error when the signature matches zero times (stale patch) or
/// more than once (ambiguous patch). Both indicate the upstream binary
/// changed and the patch table needs updating.
pub(crate) fn sig_replace(
    data: &mut [u8],
    signature: &[u8],
    replacement: &[u8],
    display: &str,
) -> OpResult<()> {
    debug_assert_eq!(signature.len(), replacement.len());
    let mut offsets = data
        .windows(signature.len())
        .enumerate()
        .filter(|(_, window)| *window == signature)
        .map(|(offset, _)| offset);

    let Some(offset) = offsets.next() else {
        return Err(OpError::SignatureNotFound {
            signature: display.to_string(),
        });
    };
    let extra = offsets.count();
    if extra > 0 {
        return Err(OpError::AmbiguousSignature {
            signature: display.to_string(),
            matches: extra + 1,
        });
    }

    data[offset..offset + replacement.len()].copy_from_slice(replacement);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| (*e).to_string()).collect()
    }

    #[test]
    fn test_parse_hex() {
        let bytes = parse_hex("15 aa 08 00 40 f9").unwrap();
        assert_eq!(bytes, vec![0x15, 0xaa, 0x08, 0x00, 0x40, 0xf9]);
    }

    #[test]
    fn test_parse_hex_invalid_token() {
        let result = parse_hex("15 aa zz");
        match result {
            Err(OpError::InvalidHex { byte, .. }) => assert_eq!(byte, "zz"),
            other => panic!("Expected InvalidHex, got {:?}", other),
        }

        // A token longer than one byte is rejected rather than truncated.
        assert!(parse_hex("15aa 08").is_err());
    }

    #[test]
    fn test_replace_needed_preserves_order() {
        let mut needed = deps(&["liba.so", "libOpenCL.so", "libb.so"]);
        let changed = replace_needed(&mut needed, "libOpenCL.so", "libGLES_mali.so");
        assert!(changed);
        assert_eq!(needed, deps(&["liba.so", "libGLES_mali.so", "libb.so"]));
    }

    #[test]
    fn test_replace_needed_absent_is_noop() {
        let mut needed = deps(&["liba.so", "libb.so"]);
        let changed = replace_needed(&mut needed, "libOpenCL.so", "libGLES_mali.so");
        assert!(!changed);
        assert_eq!(needed, deps(&["liba.so", "libb.so"]));
    }

    #[test]
    fn test_replace_needed_new_present_exactly_once() {
        let mut needed = deps(&["libOpenCL.so", "liba.so", "libOpenCL.so"]);
        let changed = replace_needed(&mut needed, "libOpenCL.so", "libGLES_mali.so");
        assert!(changed);
        assert_eq!(
            needed.iter().filter(|e| *e == "libGLES_mali.so").count(),
            1
        );
        assert!(!needed.iter().any(|e| e == "libOpenCL.so"));
        assert_eq!(needed, deps(&["libGLES_mali.so", "liba.so"]));
    }

    #[test]
    fn test_add_needed_is_idempotent() {
        let mut needed = deps(&["liba.so"]);
        assert!(add_needed(&mut needed, "liblog.so"));
        let once = needed.clone();
        assert!(!add_needed(&mut needed, "liblog.so"));
        assert_eq!(needed, once);
        assert_eq!(needed, deps(&["liba.so", "liblog.so"]));
    }

    #[test]
    fn test_regex_replace_is_literal() {
        // The replacement must not be treated as a capture-group template.
        let pattern = compile_pattern("ro\\.factory\\.factory_binary").unwrap();
        let data = b"xx ro.factory.factory_binary yy";
        let patched = regex_replace(data, &pattern, b"ro.vendor.factory_binary\x00").unwrap();
        assert_eq!(&patched, b"xx ro.vendor.factory_binary\x00 yy");
        // NUL padding keeps the overall length unchanged.
        assert_eq!(patched.len(), data.len());
    }

    #[test]
    fn test_regex_replace_no_match() {
        let pattern = compile_pattern("ro\\.factory\\.factory_binary").unwrap();
        assert!(regex_replace(b"nothing here", &pattern, b"x").is_none());
    }

    #[test]
    fn test_regex_replace_all_matches() {
        let pattern = compile_pattern("ab").unwrap();
        let patched = regex_replace(b"ab cd ab", &pattern, b"xy").unwrap();
        assert_eq!(&patched, b"xy cd xy");
    }

    #[test]
    fn test_sig_replace() {
        let mut data = vec![0x00, 0x15, 0xaa, 0x08, 0x00];
        sig_replace(&mut data, &[0x15, 0xaa], &[0xe3, 0x03], "15 aa").unwrap();
        assert_eq!(data, vec![0x00, 0xe3, 0x03, 0x08, 0x00]);
    }

    #[test]
    fn test_sig_replace_not_found() {
        let mut data = vec![0x00, 0x01, 0x02];
        let result = sig_replace(&mut data, &[0x15, 0xaa], &[0xe3, 0x03], "15 aa");
        match result {
            Err(OpError::SignatureNotFound { signature }) => assert_eq!(signature, "15 aa"),
            other => panic!("Expected SignatureNotFound, got {:?}", other),
        }
        // The buffer must be left untouched.
        assert_eq!(data, vec![0x00, 0x01, 0x02]);
    }

    #[test]
    fn test_sig_replace_ambiguous() {
        let mut data = vec![0x15, 0xaa, 0x00, 0x15, 0xaa];
        let result = sig_replace(&mut data, &[0x15, 0xaa], &[0xe3, 0x03], "15 aa");
        match result {
            Err(OpError::AmbiguousSignature { matches, .. }) => assert_eq!(matches, 2),
            other => panic!("Expected AmbiguousSignature, got {:?}", other),
        }
        assert_eq!(data, vec![0x15, 0xaa, 0x00, 0x15, 0xaa]);
    }

    #[test]
    fn test_builder_preserves_operation_order() {
        let fixup = blob_fixup()
            .replace_needed("libOpenCL.so", "libGLES_mali.so")
            .add_needed("libeden_ud_cpu.so");
        assert_eq!(fixup.ops().len(), 2);
        assert!(matches!(fixup.ops()[0], BlobFixupOp::ReplaceNeeded { .. }));
        assert!(matches!(fixup.ops()[1], BlobFixupOp::AddNeeded { .. }));
    }

    #[test]
    fn test_validate_sig_length_mismatch() {
        let op = BlobFixupOp::SigReplace {
            signature: "15 aa 08".to_string(),
            replacement: "15 aa".to_string(),
        };
        match op.validate() {
            Err(OpError::LengthMismatch {
                signature_len,
                replacement_len,
                ..
            }) => {
                assert_eq!(signature_len, 3);
                assert_eq!(replacement_len, 2);
            }
            other => panic!("Expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_invalid_pattern() {
        let op = BlobFixupOp::BinaryRegexReplace {
            pattern: "(".to_string(),
            replacement: b"x".to_vec(),
        };
        assert!(matches!(op.validate(), Err(OpError::InvalidPattern { .. })));
    }

    #[test]
    fn test_op_display() {
        let op = BlobFixupOp::ReplaceNeeded {
            old: "libcrypto.so".to_string(),
            new: "libcrypto-v33.so".to_string(),
        };
        assert_eq!(
            op.to_string(),
            "replace-needed(libcrypto.so -> libcrypto-v33.so)"
        );
        let op = BlobFixupOp::AddNeeded {
            name: "liblog.so".to_string(),
        };
        assert_eq!(op.to_string(), "add-needed(liblog.so)");
    }
}
