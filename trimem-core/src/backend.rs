// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Backend identity and static per-backend parameters.
//!
//! A closed enumeration of the three storage targets. Each carries the
//! erase/program alignment and auto-format behavior the FS facade and the
//! copy engine need without touching a real device.

use crate::error::Error;

/// One of the three storage backends this system persists artifacts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum BackendId {
    Flash,
    Nand,
    Psram,
}

/// Static, device-independent parameters for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendParams {
    pub erase_align: u32,
    pub program_align: u32,
    pub requires_auto_format_on_empty_mount: bool,
}

impl BackendId {
    /// Default parameters for this backend.
    ///
    /// Flash and NAND figures mirror common NOR (4 KiB sector) and NAND
    /// (2 KiB block) geometries; real hardware builds read block geometry
    /// off the device and override these at mount time.
    pub const fn params(self) -> BackendParams {
        match self {
            BackendId::Flash => BackendParams {
                erase_align: 4096,
                program_align: 256,
                requires_auto_format_on_empty_mount: true,
            },
            BackendId::Nand => BackendParams {
                erase_align: 2048,
                program_align: 2048,
                requires_auto_format_on_empty_mount: true,
            },
            BackendId::Psram => BackendParams {
                erase_align: 1,
                program_align: 1,
                requires_auto_format_on_empty_mount: false,
            },
        }
    }

    /// Parse the backend name used in a `<backend>:<path>` spec string.
    pub fn parse(name: &str) -> Result<Self, Error> {
        match name {
            "flash" => Ok(BackendId::Flash),
            "nand" => Ok(BackendId::Nand),
            "psram" => Ok(BackendId::Psram),
            _ => Err(Error::InvalidArgument),
        }
    }

    /// The spec-string prefix for this backend.
    pub const fn as_str(self) -> &'static str {
        match self {
            BackendId::Flash => "flash",
            BackendId::Nand => "nand",
            BackendId::Psram => "psram",
        }
    }
}

/// Replacement strategy a backend selects when a write cannot fit in place
/// Carried as a `u32` across the `FsBackend` trait-object boundary and
/// converted back at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum ReplaceMode {
    /// Overwrite the existing slot; capacity must already be sufficient.
    InPlace,
    /// Allocate a new slot elsewhere and abandon the old one.
    Relocate,
    /// Erase the existing slot's region and rewrite within it.
    EraseRewrite,
}

impl ReplaceMode {
    pub const fn as_u32(self) -> u32 {
        match self {
            ReplaceMode::InPlace => 0,
            ReplaceMode::Relocate => 1,
            ReplaceMode::EraseRewrite => 2,
        }
    }
}

impl TryFrom<u32> for ReplaceMode {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Error> {
        match value {
            0 => Ok(ReplaceMode::InPlace),
            1 => Ok(ReplaceMode::Relocate),
            2 => Ok(ReplaceMode::EraseRewrite),
            _ => Err(Error::InvalidArgument),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psram_is_byte_addressable() {
        assert_eq!(BackendId::Psram.params().erase_align, 1);
        assert!(!BackendId::Psram.params().requires_auto_format_on_empty_mount);
    }

    #[test]
    fn flash_and_nand_require_auto_format() {
        assert!(BackendId::Flash.params().requires_auto_format_on_empty_mount);
        assert!(BackendId::Nand.params().requires_auto_format_on_empty_mount);
    }

    #[test]
    fn parse_accepts_known_prefixes() {
        assert_eq!(BackendId::parse("flash"), Ok(BackendId::Flash));
        assert_eq!(BackendId::parse("nand"), Ok(BackendId::Nand));
        assert_eq!(BackendId::parse("psram"), Ok(BackendId::Psram));
    }

    #[test]
    fn parse_rejects_unknown_prefix() {
        assert_eq!(BackendId::parse("sdcard"), Err(Error::InvalidArgument));
    }

    #[test]
    fn replace_mode_round_trips_through_u32() {
        for m in [
            ReplaceMode::InPlace,
            ReplaceMode::Relocate,
            ReplaceMode::EraseRewrite,
        ] {
            assert_eq!(ReplaceMode::try_from(m.as_u32()), Ok(m));
        }
    }

    #[test]
    fn replace_mode_rejects_out_of_range() {
        assert_eq!(ReplaceMode::try_from(99), Err(Error::InvalidArgument));
    }
}
