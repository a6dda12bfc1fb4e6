// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Parses ELF blobs to extract their declared dependencies (`DT_NEEDED`
//! entries). Uses the `goblin` crate for ELF parsing.

use goblin::elf::Elf as GoblinElf;
use serde::Serialize;
use std::fs;
use std::io;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use thiserror::Error;

type Result<T> = std::result::Result<T, ElfError>;

/// Errors that can occur when parsing ELF blobs.
#[derive(Debug, Error)]
pub enum ElfError {
    #[error("File is too small to be an ELF file: {path:?}")]
    FileTooSmall { path: PathBuf },
    #[error("File is not an ELF file: {path:?}")]
    NotElfFile { path: PathBuf },
    #[error("Failed to open file: {path:?}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read file: {path:?}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse ELF file: {path:?}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: goblin::error::Error,
    },
    #[error("Unknown ELF type in file: {path:?}")]
    UnknownElfType { path: PathBuf },
}

/// ELF file type (wrapper around `goblin::elf::header::e_type`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ElfType {
    None,
    Relocatable,
    Executable,
    SharedObject,
    Core,
}

/// Declared-dependency view of an ELF blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Elf {
    kind: ElfType,
    needed: Vec<String>,
}

impl Elf {
    /// Parse an ELF blob from a path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not an ELF file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = Self::read(path)?;
        Self::from_bytes(&bytes, path)
    }

    /// Parse an ELF blob from an in-memory buffer.
    ///
    /// `path` is only used for error messages.
    ///
    /// # Errors
    /// Returns an error if the buffer is not a parsable ELF image.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self> {
        let elf = GoblinElf::parse(bytes).map_err(|e| ElfError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut needed = Vec::new();
        if let Some(dynamic) = &elf.dynamic {
            for dyn_entry in &dynamic.dyns {
                if dyn_entry.d_tag == goblin::elf::dynamic::DT_NEEDED {
                    if let Ok(strtab_idx) = usize::try_from(dyn_entry.d_val) {
                        if let Some(dep_name) = elf.dynstrtab.get_at(strtab_idx) {
                            needed.push(dep_name.to_string());
                        }
                    }
                }
            }
        }

        Ok(Self {
            kind: match elf.header.e_type {
                goblin::elf::header::ET_NONE => ElfType::None,
                goblin::elf::header::ET_REL => ElfType::Relocatable,
                goblin::elf::header::ET_EXEC => ElfType::Executable,
                goblin::elf::header::ET_DYN => ElfType::SharedObject,
                goblin::elf::header::ET_CORE => ElfType::Core,
                _ => {
                    return Err(ElfError::UnknownElfType {
                        path: path.to_path_buf(),
                    });
                }
            },
            needed,
        })
    }

    /// Get the ELF file type (executable, shared object, etc.).
    #[must_use]
    pub fn kind(&self) -> &ElfType {
        &self.kind
    }

    /// Get the list of declared dependencies (`DT_NEEDED` entries), in
    /// declaration order.
    #[must_use]
    pub fn needed(&self) -> &[String] {
        &self.needed
    }

    /// Reads the entire file at path into bytes if the file is an ELF file.
    ///
    /// # Errors
    /// Returns an error if the file is not an ELF file or cannot be read.
    fn read(path: &Path) -> Result<Vec<u8>> {
        // ELF magic bytes: 0x7f followed by ASCII "ELF"
        // Defined in the ELF specification: e_ident[EI_MAG0..EI_MAG3]
        const ELF_MAGIC: [u8; 4] = [0x7f, 0x45, 0x4c, 0x46];

        let metadata = fs::metadata(path).map_err(|e| ElfError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        // Skip files that are too small to be ELF (must be at least ELF header size)
        if metadata.len() < 64 {
            return Err(ElfError::FileTooSmall {
                path: path.to_path_buf(),
            });
        }

        // Open file once and check magic bytes
        let mut file = fs::File::open(path).map_err(|e| ElfError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut magic = [0u8; 4];
        match file.read_exact(&mut magic) {
            Ok(()) => {
                if magic != ELF_MAGIC {
                    return Err(ElfError::NotElfFile {
                        path: path.to_path_buf(),
                    });
                }
            }
            Err(e) => {
                return Err(ElfError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }

        // Reset to beginning and read entire file
        file.seek(std::io::SeekFrom::Start(0))
            .map_err(|e| ElfError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| ElfError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(bytes)
    }
}
