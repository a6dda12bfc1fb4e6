// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Build script to generate test fixtures for the `blob_patcher` crate.
//!
//! Generates a small shared object with real `DT_NEEDED` entries (requires
//! gcc). If gcc is not available, the script skips the fixture and emits a
//! warning; tests gracefully skip when the fixture is missing.

use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

/// Check if a command is available in PATH.
fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let testdata_dir = Path::new(&manifest_dir).join("testdata");

    fs::create_dir_all(&testdata_dir).expect("Failed to create testdata directory");

    if command_exists("gcc") {
        generate_shared_object(&testdata_dir);
    } else {
        println!(
            "cargo:warning=gcc not available; ELF test fixtures will not be generated and some tests will skip"
        );
    }

    // Re-run build script if testdata directory changes
    println!("cargo:rerun-if-changed=testdata/");
}

/// Generate a small shared object fixture with a libc dependency.
fn generate_shared_object(testdata_dir: &Path) {
    let so_path = testdata_dir.join("libblob.so");
    if so_path.exists() {
        return; // Skip if already exists
    }

    let temp_dir = env::temp_dir().join("blob_patcher_build");
    let _ = fs::remove_dir_all(&temp_dir);
    fs::create_dir_all(&temp_dir).expect("Failed to create temp directory");

    let source_path = temp_dir.join("libblob.c");
    let source_code = r#"#include <stdio.h>

void hello_from_blob() {
    printf("Hello from blob!\n");
}
"#;
    fs::write(&source_path, source_code).expect("Failed to write test source");

    let compile_status = Command::new("gcc")
        .args([
            "-shared",
            "-fPIC",
            "-o",
            so_path.to_str().unwrap(),
            source_path.to_str().unwrap(),
        ])
        .status();

    if compile_status.map(|s| !s.success()).unwrap_or(true) {
        println!("cargo:warning=Failed to compile shared object fixture, skipping");
        let _ = fs::remove_file(&so_path);
    }

    // Cleanup temp directory
    let _ = fs::remove_dir_all(&temp_dir);
}
