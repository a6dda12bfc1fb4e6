// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Library name fixup rules for cross-partition name collisions.

use serde::Serialize;

/// A rule deciding how a library name is adjusted for a target partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibFixupRule {
    /// Suffix the name with `_{partition}` when installed to the vendor
    /// partition (e.g. `libuuid` -> `libuuid_vendor`), so it does not collide
    /// with the system copy of the same library. A no-op elsewhere.
    VendorSuffix,
    /// Exclude the library entirely; a platform replacement is used instead.
    Remove,
}

/// The outcome of applying a [`LibFixupRule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LibFixupAction {
    /// Install the library under a different name.
    Rename(String),
    /// Do not install the library at all.
    Remove,
}

impl LibFixupRule {
    /// Apply the rule to a library base name headed for `partition`.
    ///
    /// Returns `None` when the name is unchanged.
    #[must_use]
    pub fn apply(&self, lib: &str, partition: &str) -> Option<LibFixupAction> {
        match self {
            Self::VendorSuffix => {
                if partition == "vendor" {
                    Some(LibFixupAction::Rename(format!("{lib}_{partition}")))
                } else {
                    None
                }
            }
            Self::Remove => Some(LibFixupAction::Remove),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_suffix_on_vendor_partition() {
        let action = LibFixupRule::VendorSuffix.apply("libuuid", "vendor");
        assert_eq!(
            action,
            Some(LibFixupAction::Rename("libuuid_vendor".to_string()))
        );
    }

    #[test]
    fn test_vendor_suffix_elsewhere_is_noop() {
        assert_eq!(LibFixupRule::VendorSuffix.apply("libuuid", "system"), None);
        assert_eq!(LibFixupRule::VendorSuffix.apply("libuuid", "odm"), None);
    }

    #[test]
    fn test_remove_applies_everywhere() {
        assert_eq!(
            LibFixupRule::Remove.apply("libhidltransport", "vendor"),
            Some(LibFixupAction::Remove)
        );
        assert_eq!(
            LibFixupRule::Remove.apply("libhidltransport", "system"),
            Some(LibFixupAction::Remove)
        );
    }
}
