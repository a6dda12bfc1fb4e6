// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Fixup registry for the `universal9830-common` device family.

use crate::fixup::{
    blob_fixup, BlobFixupEntry, FixupRegistry, LibFixupEntry, LibFixupRule, RegistryError,
};

/// Device tree this registry belongs to.
pub const DEVICE: &str = "universal9830-common";
/// Device vendor.
pub const VENDOR: &str = "samsung";

/// Build the validated fixup registry for the device.
///
/// # Errors
/// Returns an error if the patch tables are misconfigured (overlapping keys,
/// malformed signatures). This aborts the run before any blob is touched.
pub fn registry() -> Result<FixupRegistry, RegistryError> {
    FixupRegistry::new(blob_fixups(), lib_fixups(), namespace_imports())
}

fn namespace_imports() -> Vec<String> {
    [
        "device/samsung/universal9830-common",
        "hardware/samsung",
        "hardware/samsung_slsi-linaro/exynos",
        "hardware/samsung_slsi-linaro/graphics",
        "vendor/samsung/universal9830-common",
    ]
    .map(str::to_string)
    .to_vec()
}

fn lib_fixups() -> Vec<LibFixupEntry> {
    vec![(
        vec!["libuuid".to_string(), "libsecril-client".to_string()],
        LibFixupRule::VendorSuffix,
    )]
}

fn blob_fixups() -> Vec<BlobFixupEntry> {
    let entry = |paths: &[&str], fixup| -> BlobFixupEntry {
        (paths.iter().map(|p| (*p).to_string()).collect(), fixup)
    };

    vec![
        entry(
            &["vendor/bin/vaultkeeperd", "vendor/lib64/libvkservice.so"],
            blob_fixup().binary_regex_replace(
                "ro\\.factory\\.factory_binary",
                b"ro.vendor.factory_binary\x00",
            ),
        ),
        entry(
            &["vendor/lib64/libbayergdccore.so"],
            blob_fixup().replace_needed("libOpenCL.so", "libGLES_mali.so"),
        ),
        entry(
            &["vendor/lib64/libkeymaster_helper.so"],
            blob_fixup().replace_needed("libcrypto.so", "libcrypto-v33.so"),
        ),
        entry(
            &["vendor/lib64/libnpuc_backend.so"],
            blob_fixup()
                .add_needed("liblog.so")
                .add_needed("libnpuc_cmdq.so"),
        ),
        entry(
            &["vendor/lib64/libnpuc_graph.so"],
            blob_fixup().add_needed("libnpuc_common.so"),
        ),
        entry(
            &[
                "vendor/lib64/libnpuc_common.so",
                "vendor/lib64/libnpuc_controller.so",
                "vendor/lib64/libnpuc_frontend.so",
                "vendor/lib64/libnpuc_template.so",
            ],
            blob_fixup().add_needed("liblog.so"),
        ),
        entry(
            &["vendor/lib64/libeden_ud_gpu.so"],
            blob_fixup()
                .replace_needed("libOpenCL.so", "libGLES_mali.so")
                .add_needed("libeden_ud_cpu.so"),
        ),
        entry(
            &["vendor/lib64/libsec-ril.so"],
            // Patches out a conditional branch in the RIL request handler.
            blob_fixup().sig_replace(
                "15 aa 08 00 40 f9 e3 03 14 aa",
                "15 aa 08 00 40 f9 03 00 80 d2",
            ),
        ),
        entry(
            &["vendor/lib64/libsensorlistener.so"],
            blob_fixup().add_needed("libsensorndkbridge_shim.so"),
        ),
        entry(
            &["vendor/lib64/libskeymaster4device.so"],
            blob_fixup()
                .replace_needed("libcrypto.so", "libcrypto-v33.so")
                .add_needed("libshim_crypto.so"),
        ),
        entry(
            &["vendor/lib/libwvhidl.so"],
            blob_fixup()
                .replace_needed(
                    "libprotobuf-cpp-lite-3.9.1.so",
                    "libprotobuf-cpp-full-3.9.1.so",
                )
                .add_needed("libcrypto_shim.so"),
        ),
    ]
}
