// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blob_patcher")]
#[command(version)]
#[command(about = "Applies post-extraction fixups to proprietary vendor blobs")]
pub(crate) struct Args {
    /// Path to the extracted vendor dump directory to patch.
    pub dump: PathBuf,

    /// Path to the file to write the patch results in JSON format.
    pub report: PathBuf,

    #[arg(
        long,
        long_help = "Do not modify any blob.\n\
                Operations that would change a blob are reported as planned;\n\
                stale signature patches still fail the run."
    )]
    pub dry_run: bool,
}
